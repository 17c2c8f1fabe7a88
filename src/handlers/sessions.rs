//! Session HTTP handlers.
//!
//! This module implements the submission flow endpoints:
//! - POST /api/v1/sessions - Start a new session
//! - GET /api/v1/session - Current state and last result
//! - POST /api/v1/session/validate - Submit a key
//! - POST /api/v1/session/download - Trigger the download
//!
//! Validation and download steps run on their own task: once started they complete even if the client goes away.

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{
    error::AppError,
    middleware::session::SessionContext,
    models::{
        session::{DownloadResponse, SessionResponse},
        validation::{ValidateKeyRequest, ValidationOutcome, Verdict},
    },
    state::AppState,
};

/// Acknowledgement returned until real resource delivery exists.
const DOWNLOAD_PLACEHOLDER: &str = "Download would start here. This is a demo version.";

/// Create a new session.
///
/// # Response (201 Created)
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "state": "idle",
///   "downloading": false,
///   "result": null,
///   "created_at": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// Pass `id` as the `X-Session-Id` header on the session routes.
pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.create().await;
    tracing::debug!(session_id = %session.id, "Session created");

    (StatusCode::CREATED, Json(SessionResponse::from(&session)))
}

/// Get the current session state.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.sessions.get(ctx.session_id).await?;

    Ok(Json(SessionResponse::from(&session)))
}

/// Submit a key for validation.
///
/// # Flow
///
/// 1. Blank input (after trimming): the result is set to "Please enter a valid UDG key." immediately
/// 2. Otherwise the session enters `validating` and its previous result is cleared
/// 3. After the validation delay the validator runs
/// 4. The session ends `valid` or `invalid` with the result attached
///
/// # Response
///
/// - **Success (200 OK)**: The session after validation
/// - **Error (409)**: A validation or download is already running for this session
/// - **Error (404)**: Unknown session
pub async fn submit_key(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Json(request): Json<ValidateKeyRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session_id = ctx.session_id;
    let key = request.key.trim().to_string();

    if key.is_empty() {
        let session = state
            .sessions
            .reject_submission(session_id, ValidationOutcome::rejected(Verdict::EmptyKey))
            .await?;
        return Ok(Json(SessionResponse::from(&session)));
    }

    state.sessions.begin_validation(session_id).await?;

    let task_state = state.clone();
    let session = tokio::spawn(async move {
        tokio::time::sleep(task_state.delays.validation).await;
        let outcome = task_state.validator.validate(&key).await;
        task_state
            .sessions
            .complete_validation(session_id, outcome)
            .await
    })
    .await??;

    Ok(Json(SessionResponse::from(&session)))
}

/// Trigger the download for a validated session.
///
/// # Response
///
/// - **Success (200 OK)**: Placeholder acknowledgement
/// - **Error (403)**: The session has not validated a key
/// - **Error (409)**: A download is already running for this session
///
/// ```json
/// {
///   "message": "Download would start here. This is a demo version."
/// }
/// ```
pub async fn trigger_download(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Json<DownloadResponse>, AppError> {
    let session_id = ctx.session_id;
    state.sessions.begin_download(session_id).await?;

    let task_state = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(task_state.delays.download).await;
        task_state.sessions.finish_download(session_id).await
    })
    .await??;

    tracing::info!(session_id = %session_id, "Download acknowledged");

    Ok(Json(DownloadResponse {
        message: DOWNLOAD_PLACEHOLDER.to_string(),
    }))
}
