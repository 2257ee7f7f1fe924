//! QR Code API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/qr", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/{restaurant_id}", get(handler::list).post(handler::create))
        .route("/{restaurant_id}/bulk", post(handler::create_bulk))
        .route("/{restaurant_id}/scan", post(handler::scan))
        .route(
            "/{restaurant_id}/{id}",
            get(handler::get_by_id).delete(handler::remove),
        )
        .route("/{restaurant_id}/{id}/active", put(handler::set_active))
        .route("/{restaurant_id}/{id}/refresh", post(handler::refresh_token))
}
