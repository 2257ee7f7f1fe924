//! Server Implementation
//!
//! HTTP 服务器启动和管理

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{Config, Result, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (for sharing with tests)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> Result<()> {
        // Create application state if not provided
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config)?,
        };

        // Start background tasks
        let tasks = state.start_background_tasks();

        let app = crate::api::routes(state.clone());

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("🛎️ Relay server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(state.hub.shutdown_token().clone()))
            .await?;

        // Stop event fan-out first so pollers drain, then the workers
        state.hub.shutdown();
        let timeout = Duration::from_millis(self.config.shutdown_timeout_ms);
        if tokio::time::timeout(timeout, tasks.shutdown()).await.is_err() {
            tracing::warn!("Background tasks did not stop within {:?}", timeout);
        }

        tracing::info!("Relay server stopped");
        Ok(())
    }
}

/// 等待 Ctrl-C 或程序内部的关闭信号
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayHub;

    #[tokio::test]
    async fn test_shutdown_signal_honors_hub_token() {
        let hub = RelayHub::new();
        let signal = shutdown_signal(hub.shutdown_token().clone());
        hub.shutdown();
        signal.await;
    }
}
