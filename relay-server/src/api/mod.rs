//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查接口
//! - [`mailbox`] - 信箱读写接口 (面板轮询的主通道)
//! - [`calls`] - 服务员呼叫接口
//! - [`orders`] - 订单看板接口
//! - [`notifications`] - 通知接口
//! - [`qr`] - 桌台二维码接口
//! - [`events`] - SSE 事件流接口

pub mod health;
pub mod router_ext;

pub mod calls;
pub mod events;
pub mod mailbox;
pub mod notifications;
pub mod orders;
pub mod qr;

use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppError, AppResult};

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();

    tracing::info!(target: "http_access", "{} {} {}", method, uri, status);

    response
}

/// Build the Axum router (without state)
pub fn build_app() -> Router<ServerState> {
    Router::<ServerState>::new()
        // Core APIs
        .merge(health::router())
        .merge(events::router())
        // Mailbox + panel APIs
        .merge(mailbox::router())
        .merge(calls::router())
        .merge(orders::router())
        .merge(notifications::router())
        .merge(qr::router())
}

/// Assemble the full application with state and middleware
pub fn routes(state: ServerState) -> Router {
    build_app()
        .with_state(state)
        // Tower HTTP 中间件
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        // HTTP 请求日志中间件
        .layer(middleware::from_fn(log_request))
}
