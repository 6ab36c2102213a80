//! Security headers middleware.

use axum::{
    extract::Request,
    http::header::{HeaderName, HeaderValue, CACHE_CONTROL},
    middleware::Next,
    response::Response,
};

/// Headers set on every response.
///
/// HSTS belongs to the TLS-terminating proxy and is not set here.
const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("x-xss-protection", "0"),
];

/// Add security headers, and `no-store` caching unless a handler chose otherwise.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}
