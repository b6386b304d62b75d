use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::engine::rate_limiter::RateLimiter;

/// Per-IP rate limiters for different endpoint tiers.
pub struct ApiRateLimiters {
    /// All API endpoints.
    /// Burst of 60, refill 1 per second (~60/minute sustained).
    pub api: RateLimiter,
    /// Writes (create, join/leave, post, vote, delete) on top of `api`.
    /// Burst of 20, refill 1 per 2 seconds.
    pub write: RateLimiter,
    /// WebSocket connections: prevent connection storms.
    /// Burst of 5, refill 1 per 12 seconds (~5/minute).
    pub ws: RateLimiter,
}

impl Default for ApiRateLimiters {
    fn default() -> Self {
        Self {
            api: RateLimiter::new(60, 1.0),
            write: RateLimiter::new(20, 2.0),
            ws: RateLimiter::new(5, 12.0),
        }
    }
}

impl ApiRateLimiters {
    pub fn cleanup(&self, older_than: Duration) {
        self.api.cleanup(older_than);
        self.write.cleanup(older_than);
        self.ws.cleanup(older_than);
    }
}

/// Extract client IP from request, only trusting proxy headers from loopback.
///
/// When the direct peer is a loopback address the connection is coming
/// through a local reverse proxy and X-Forwarded-For / X-Real-IP are trusted.
/// Otherwise the actual peer IP is used so headers can't be spoofed to
/// dodge rate limits.
pub fn client_ip(req: &Request<Body>) -> String {
    let peer_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.ip());
    let from_loopback = peer_ip.is_some_and(|ip| ip.is_loopback());

    if from_loopback {
        if let Some(forwarded) = req.headers().get("x-forwarded-for")
            && let Ok(val) = forwarded.to_str()
            && let Some(first) = val.split(',').next()
        {
            return first.trim().to_string();
        }

        if let Some(real_ip) = req.headers().get("x-real-ip")
            && let Ok(val) = real_ip.to_str()
        {
            return val.trim().to_string();
        }
    }

    peer_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn reject_if_limited(
    limiter: &RateLimiter,
    req: &Request<Body>,
    message: &'static str,
) -> Option<Response> {
    let ip = client_ip(req);
    if limiter.check(&ip) {
        None
    } else {
        debug!(%ip, path = %req.uri().path(), "rate limited");
        Some((StatusCode::TOO_MANY_REQUESTS, message).into_response())
    }
}

/// Middleware for general API rate limiting, with a tighter budget for writes.
pub async fn api_rate_limit(req: Request<Body>, next: Next) -> Response {
    if let Some(limiters) = req.extensions().get::<Arc<ApiRateLimiters>>() {
        const MESSAGE: &str = "Rate limit exceeded. Please try again later.";
        if let Some(rejection) = reject_if_limited(&limiters.api, &req, MESSAGE) {
            return rejection;
        }
        let is_write = !matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
        if is_write && let Some(rejection) = reject_if_limited(&limiters.write, &req, MESSAGE) {
            return rejection;
        }
    }
    next.run(req).await
}

/// Middleware for WebSocket connection rate limiting.
pub async fn ws_rate_limit(req: Request<Body>, next: Next) -> Response {
    if let Some(limiters) = req.extensions().get::<Arc<ApiRateLimiters>>()
        && let Some(rejection) = reject_if_limited(
            &limiters.ws,
            &req,
            "Too many connections. Please try again later.",
        )
    {
        return rejection;
    }
    next.run(req).await
}
