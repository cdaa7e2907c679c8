pub mod attendance;
pub mod auth;
pub mod invoices;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod students;
pub mod tutors;

// Re-export the pieces the binary needs to build the router.
pub use middleware::require_auth;
pub use rest::ApiDoc;

use axum::http::StatusCode;
use tuition_center_core::ports::PortError;

/// Map a port error onto an HTTP response, logging the ones the caller
/// shouldn't see the details of.
pub(crate) fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authorized".to_string()),
        PortError::Unexpected(msg) => {
            tracing::error!("Failed to {}: {}", context, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {}", context),
            )
        }
    }
}
