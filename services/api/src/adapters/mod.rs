pub mod db;
pub mod render;

pub use db::DbAdapter;
