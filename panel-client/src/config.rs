//! Client configuration

use std::time::Duration;

/// 轮询间隔下限（毫秒）
pub const MIN_POLL_INTERVAL_MS: u64 = 500;

/// 轮询间隔上限（毫秒）
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

/// Client configuration for connecting to the relay server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:3000")
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// 轮询间隔（毫秒），限制在 500..=10000
    pub poll_interval_ms: u64,

    /// 首次重连延迟
    pub reconnect_delay: Duration,

    /// 最大重连延迟 (指数退避上限)
    pub max_reconnect_delay: Duration,

    /// 最大重连尝试次数 (0 表示无限重试)
    pub max_reconnect_attempts: u32,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: 30,
            poll_interval_ms: 2000,
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(30),
            max_reconnect_attempts: 0,
        }
    }

    /// 从环境变量读取配置
    ///
    /// | 环境变量 | 说明 | 默认值 |
    /// |----------|------|--------|
    /// | `RELAY_BASE_URL` | 中继服务器地址 | `http://localhost:3000` |
    /// | `POLL_INTERVAL_MS` | 轮询间隔（毫秒） | `2000` |
    pub fn from_env() -> Self {
        let base_url = std::env::var("RELAY_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let poll_interval_ms = std::env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(2000);

        Self::new(base_url).with_poll_interval(poll_interval_ms)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// 设置轮询间隔（毫秒），超出范围会被收紧
    pub fn with_poll_interval(mut self, millis: u64) -> Self {
        self.poll_interval_ms = millis.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        self
    }

    /// 设置首次重连延迟
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// 设置最大重连延迟
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// 设置最大重连尝试次数 (0 表示无限重试)
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// 轮询间隔
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Create an HTTP client from this configuration
    pub fn build_http_client(&self) -> super::PanelHttp {
        super::PanelHttp::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
