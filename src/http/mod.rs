use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod middleware;
mod routes;

pub use auth::{AdminUser, AuthUser};
pub use error::AppError;

use middleware::rate_limit::{ip_rate_limit_middleware, rate_limit_middleware};

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::items())
        .merge(routes::messages())
        .merge(routes::admin())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), ip_rate_limit_middleware))
        .with_state(state)
}
