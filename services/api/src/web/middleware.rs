//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::web::state::AppState;
use tuition_center_core::permissions::{Permission, PermissionSet, Role};

/// The authenticated caller, resolved once per request and handed to
/// handlers through request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl AuthContext {
    /// Rejects the request with 403 unless the caller holds `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), (StatusCode, String)> {
        if self.permissions.contains(permission) {
            Ok(())
        } else {
            Err((
                StatusCode::FORBIDDEN,
                format!("Missing permission: {}", permission.as_str()),
            ))
        }
    }
}

/// Middleware that validates the auth session cookie and resolves the caller.
///
/// If valid, inserts an `AuthContext` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract cookie header
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse session ID from cookie
    let auth_session_id = cookie_header
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("session=")
        })
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Validate auth session in database, get user_id
    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // 4. Resolve the account; a deactivated account is as good as no session
    let account = state.db.get_user_account(user_id).await.map_err(|e| {
        error!("Failed to load account for session: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;
    if !account.is_active {
        return Err(StatusCode::UNAUTHORIZED);
    }

    // 5. Insert the auth context into request extensions
    req.extensions_mut().insert(AuthContext {
        user_id,
        role: account.role,
        permissions: account.role.permissions(),
    });

    // 6. Continue to the handler
    Ok(next.run(req).await)
}
