use axum::{routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn items() -> Router<AppState> {
    Router::new()
        .route(
            "/items/lost",
            post(handlers::create_lost_item).get(handlers::list_lost_items),
        )
        .route(
            "/items/found",
            post(handlers::create_found_item).get(handlers::list_found_items),
        )
        .route("/items/match/:item_id", get(handlers::match_item))
        .route(
            "/items/:id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
}

pub fn messages() -> Router<AppState> {
    Router::new()
        .route("/messages", post(handlers::send_message))
        .route("/messages/conversations", get(handlers::list_conversations))
        .route("/messages/block", post(handlers::block_user))
        .route("/messages/report", post(handlers::report_user))
        .route("/messages/read/:message_id", put(handlers::mark_message_read))
        .route("/messages/:match_id", get(handlers::get_thread))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/analytics", get(handlers::analytics))
        .route("/admin/reports", get(handlers::list_reports))
        .route("/admin/reports/:id/resolve", post(handlers::resolve_report))
}
