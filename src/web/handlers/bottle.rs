//! Bottle submission and confirmation handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use tracing::debug;

use super::AppState;
use crate::bottle::ConfirmOutcome;
use crate::web::dto::{ConfirmQuery, SubmitBottleRequest};
use crate::web::error::{ApiError, INVALID_ARGUMENTS};

/// Acknowledgement for a stored bottle.
pub const BOTTLE_CREATED: &str = "Bottle created!";
/// Acknowledgement for a followed confirmation link.
pub const BOTTLE_CONFIRMED: &str = "Bottle confirmed!";

/// POST /newBottle - Store a bottle and mail its confirmation link.
#[utoipa::path(
    post,
    path = "/newBottle",
    tag = "bottle",
    request_body = SubmitBottleRequest,
    responses(
        (status = 200, description = "Bottle stored, confirmation mailed", body = String),
        (status = 400, description = "Time is not in the future", body = crate::web::error::ErrorBody),
        (status = 422, description = "Missing or invalid arguments", body = crate::web::error::ErrorBody),
        (status = 429, description = "Too many requests from this client"),
        (status = 451, description = "Too many unconfirmed bottles for this address", body = crate::web::error::ErrorBody),
        (status = 500, description = "Confirmation mail could not be sent", body = crate::web::error::ErrorBody)
    )
)]
pub async fn new_bottle(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitBottleRequest>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(req) = payload.map_err(|e| {
        debug!("Rejected bottle body: {}", e);
        ApiError::unprocessable(INVALID_ARGUMENTS)
    })?;

    state
        .bottles
        .submit(
            req.email.as_deref().unwrap_or_default(),
            req.text.as_deref().unwrap_or_default(),
            req.time.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(BOTTLE_CREATED)
}

/// GET or POST /confirmBottle?id=... - Follow a confirmation link.
#[utoipa::path(
    get,
    path = "/confirmBottle",
    tag = "bottle",
    params(ConfirmQuery),
    responses(
        (status = 200, description = "Bottle confirmed (or already confirmed)", body = String),
        (status = 400, description = "No bottle with this id", body = crate::web::error::ErrorBody),
        (status = 422, description = "Missing id", body = crate::web::error::ErrorBody)
    )
)]
pub async fn confirm_bottle(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ConfirmQuery>, QueryRejection>,
) -> Result<&'static str, ApiError> {
    let Query(query) = query.map_err(|e| {
        debug!("Rejected confirmation query: {}", e);
        ApiError::unprocessable(INVALID_ARGUMENTS)
    })?;

    match state
        .bottles
        .confirm(query.id.as_deref().unwrap_or_default())
        .await?
    {
        ConfirmOutcome::Confirmed(_) | ConfirmOutcome::AlreadyConfirmed(_) => Ok(BOTTLE_CONFIRMED),
    }
}
