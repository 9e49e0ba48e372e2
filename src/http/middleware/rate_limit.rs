use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::app::rate_limiter::RateLimiter;
use crate::config::rate_limits::{RateAction, RateWindow};
use crate::http::{AppError, AuthUser};
use crate::AppState;

fn user_action(method: &Method, path: &str) -> Option<RateAction> {
    match (method.as_str(), path) {
        ("GET", p) if p.starts_with("/items/match/") => Some(RateAction::Match),
        ("POST", "/messages") => Some(RateAction::Message),
        ("POST", "/messages/report") => Some(RateAction::Report),
        _ => None,
    }
}

/// Per-user limits for the costly or abusable actions. Limiter failures are
/// logged and the request goes through.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (Some(action), Some(auth_user)) = (user_action(request.method(), request.uri().path()), auth)
    else {
        return Ok(next.run(request).await);
    };

    let rate_limiter = RateLimiter::new(state.cache.clone());
    match rate_limiter.check(auth_user.user_id, action).await {
        Ok(info) if info.limited => {
            return Err(AppError::rate_limited(format!(
                "rate limit exceeded for {} ({} allowed), try again later",
                action.as_str(),
                info.limit
            )));
        }
        Ok(_) => {
            if let Err(err) = rate_limiter.increment(auth_user.user_id, action).await {
                tracing::warn!(error = ?err, "failed to increment rate limit counter");
            }
        }
        Err(err) => {
            tracing::warn!(error = ?err, action = action.as_str(), "rate limiter unavailable");
        }
    }

    Ok(next.run(request).await)
}

/// IP-based rate limiting for the unauthenticated credential endpoints.
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let action = match (request.method().as_str(), request.uri().path()) {
        ("POST", "/auth/login") => "login",
        ("POST", "/auth/register") => "register",
        _ => return Ok(next.run(request).await),
    };
    let limit = state.auth_ip_rate_limit_per_hour;
    let window = RateWindow::Hour;

    let ip = addr.ip().to_string();
    let rate_limiter = RateLimiter::new(state.cache.clone());

    match rate_limiter.check_ip(&ip, action, limit, window).await {
        Ok(true) => {
            tracing::warn!(ip = ip, action = action, "IP rate limit exceeded");
            return Err(AppError::rate_limited(
                "too many attempts from your IP address, try again later",
            ));
        }
        Ok(false) => {
            if let Err(err) = rate_limiter.increment_ip(&ip, action, window).await {
                tracing::warn!(error = ?err, "failed to increment IP rate limit counter");
            }
        }
        Err(err) => {
            tracing::warn!(error = ?err, action = action, "rate limiter unavailable");
        }
    }

    Ok(next.run(request).await)
}
