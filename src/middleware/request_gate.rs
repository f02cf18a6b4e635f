//! Pre-handler gates for the browser-facing checkout route.
//!
//! Layered onto the route so the gates run before the body is so much as
//! parsed: a refused origin learns nothing about the request schema, and a
//! rate-limited client spends quota even on malformed submissions. Order is
//! fixed: origin, then CSRF, then rate limit.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::security::csrf;

pub async fn checkout_gate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response> {
    let headers = request.headers();

    if !state.origins.is_allowed(headers) {
        return Err(AppError::ForbiddenOrigin);
    }

    let from_cookie = jar
        .get(csrf::CSRF_COOKIE)
        .map(|c| c.value().to_owned())
        .unwrap_or_default();
    let from_header = headers
        .get(csrf::CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !csrf::verify_double_submit(&from_cookie, from_header) {
        return Err(AppError::InvalidCsrf);
    }

    let key = format!("checkout:{}", client_identity(headers, peer));
    let decision = state.limiter.check(&key).await;
    if !decision.allowed {
        return Err(AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        });
    }

    Ok(next.run(request).await)
}

/// Client identity for rate limiting: first forwarded-for entry, else the
/// transport peer address.
fn client_identity(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}
