//! OpenAPI document for the bottle endpoints.

use utoipa::OpenApi;

use super::dto::SubmitBottleRequest;
use super::error::{ErrorBody, ErrorCode, ErrorDetail};
use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(title = "bottlemail", description = "Mail to your future self"),
    paths(handlers::bottle::new_bottle, handlers::bottle::confirm_bottle),
    components(schemas(SubmitBottleRequest, ErrorBody, ErrorDetail, ErrorCode)),
    tags((name = "bottle", description = "Bottle submission and confirmation"))
)]
pub struct ApiDoc;
