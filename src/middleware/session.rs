//! Session resolution middleware.
//!
//! This middleware intercepts every session-scoped request to:
//! 1. Extract the session id from the `X-Session-Id` header
//! 2. Verify the session exists in the registry
//! 3. Inject the session context into the request
//! 4. Reject unknown sessions with HTTP 404

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

/// Header carrying the session id returned by `POST /api/v1/sessions`.
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Session context attached to session-scoped requests.
///
/// Route handlers extract this with `Extension<SessionContext>`.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub session_id: Uuid,
}

/// Session resolution middleware function.
///
/// # Flow
///
/// 1. Read `X-Session-Id: <uuid>` from the request
/// 2. Look the session up (refreshing its idle timer)
/// 3. If found: inject `SessionContext`, call next handler
/// 4. If missing, malformed or unknown: return 404 Not Found
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or(AppError::SessionNotFound)?;

    let session = state.sessions.get(session_id).await?;

    request.extensions_mut().insert(SessionContext {
        session_id: session.id,
    });

    Ok(next.run(request).await)
}
