//! Router oneshot 扩展
//!
//! 让测试直接调用 Router 处理请求，不经过网络栈。

use http::Response;
use tower::Service;

use crate::core::ServerState;
use anyhow::Result;
use axum::Router;
use axum::body::Body;
use http::Request;

/// oneshot 调用的结果类型
pub type OneshotResult = Result<Response<Body>>;

/// Router 的 oneshot 扩展 trait
///
/// # Example
///
/// ```ignore
/// use http::Request;
///
/// let state = ServerState::initialize(&config)?;
/// let request = Request::builder()
///     .uri("/health")
///     .body(Body::empty())?;
///
/// let response = build_app().oneshot(&state, request).await?;
/// ```
#[async_trait::async_trait]
pub trait OneshotRouter {
    /// 用 oneshot 模式处理一个请求
    async fn oneshot(&mut self, state: &ServerState, request: Request<Body>) -> OneshotResult;
}

#[async_trait::async_trait]
impl OneshotRouter for Router<ServerState> {
    async fn oneshot(&mut self, state: &ServerState, request: Request<Body>) -> OneshotResult {
        // 克隆路由、装上状态，然后作为 Service 调用
        let mut svc = self.clone().with_state(state.clone());
        let response = svc.call(request).await?;
        Ok(response)
    }
}
