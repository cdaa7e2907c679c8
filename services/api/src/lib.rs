//! services/api/src/lib.rs
//!
//! Library surface of the API service. The binaries under `bin/` pull the
//! router, adapters, and configuration from here.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
