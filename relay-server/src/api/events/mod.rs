//! SSE 事件流模块
//!
//! 面板通过 `/api/events` 订阅全部中继事件，`/api/events/orders`
//! 只推送订单相关事件。断线重连时浏览器会带上 `Last-Event-ID`，
//! 在回放窗口内补发错过的事件，超窗则先发 `resync`。

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/events", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::all_events))
        .route("/orders", get(handler::order_events))
}
