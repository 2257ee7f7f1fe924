//! Notification API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/notifications", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/{key}", get(handler::list).post(handler::post_one))
        .route("/{key}/read", post(handler::mark_read))
}
