//! Per-client throttle for bottle submissions.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use tokio::task::JoinHandle;

use crate::web::error::ApiError;

/// Rate limiter keyed by client IP.
pub type KeyedRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// How often idle client entries are dropped.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Submission throttle state.
#[derive(Clone)]
pub struct SubmitRateLimit {
    limiter: Arc<KeyedRateLimiter>,
    per_minute: u32,
}

impl SubmitRateLimit {
    /// Allow `per_minute` submissions per client IP (at least one).
    pub fn new(per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            per_minute,
        }
    }

    /// Configured submissions per minute.
    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Record a request from `ip`; false once its quota is used up.
    pub fn check(&self, ip: &str) -> bool {
        self.limiter.check_key(&ip.to_string()).is_ok()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Forget clients whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Periodically forget idle clients.
    pub fn start_cleanup_task(&self) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(CLEANUP_INTERVAL);
            timer.tick().await;
            loop {
                timer.tick().await;
                state.cleanup();
            }
        })
    }
}

/// Extract the client IP, preferring proxy headers.
fn client_ip(req: &Request) -> String {
    let headers = req.headers();

    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    if let Some(ip) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
        return ip.trim().to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Reject submissions beyond the per-client quota with 429.
pub async fn submit_rate_limit(
    State(state): State<SubmitRateLimit>,
    req: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&req);

    if !state.check(&ip) {
        tracing::warn!(ip = %ip, "Submission rate limit exceeded");
        return ApiError::too_many_requests("Too many requests. Please try again later.")
            .into_response();
    }

    next.run(req).await
}
