//! Stateless key validation endpoint.

use axum::{Json, extract::State};

use crate::{
    models::validation::{ValidateKeyRequest, ValidationResponse},
    state::AppState,
};

/// Validate a key directly, without a session.
///
/// # Endpoint
///
/// `POST /api/v1/keys/validate`
///
/// # Request Body
///
/// ```json
/// {
///   "key": "UDG-XXXX-XXXX-XXXX"
/// }
/// ```
///
/// # Response (200 OK)
///
/// Always 200: rejected keys are reported in the body.
///
/// ```json
/// {
///   "valid": false,
///   "verdict": "expired",
///   "message": "This key has expired. Please contact support for a new key."
/// }
/// ```
///
/// A successful validation records one use of the key.
pub async fn validate_key(
    State(state): State<AppState>,
    Json(request): Json<ValidateKeyRequest>,
) -> Json<ValidationResponse> {
    let outcome = state.validator.validate_submission(&request.key).await;

    Json(ValidationResponse::from(&outcome))
}
