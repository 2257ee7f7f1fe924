//! Mailbox API 模块
//!
//! 面板轮询和写入信箱的主通道。

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/mailbox", routes())
}

fn routes() -> Router<ServerState> {
    Router::new().route("/", get(handler::list_keys)).route(
        "/{key}",
        get(handler::read)
            .post(handler::append)
            .put(handler::replace),
    )
}
