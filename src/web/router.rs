//! Router configuration for the web API.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{confirm_bottle, new_bottle, AppState};
use super::middleware::{create_cors_layer, security_headers, submit_rate_limit, SubmitRateLimit};
use super::openapi::ApiDoc;

/// Create the full application router.
pub fn create_router(
    app_state: Arc<AppState>,
    cors_origins: &[String],
    throttle: SubmitRateLimit,
) -> Router {
    let bottle_routes = Router::new()
        .route(
            "/newBottle",
            post(new_bottle)
                .route_layer(middleware::from_fn_with_state(throttle, submit_rate_limit)),
        )
        .route("/confirmBottle", get(confirm_bottle).post(confirm_bottle))
        .with_state(app_state);

    Router::new()
        .merge(bottle_routes)
        .merge(create_health_router())
        .merge(create_swagger_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers)),
        )
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Create the Swagger UI router serving the OpenAPI document.
pub fn create_swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
