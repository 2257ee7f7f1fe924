use std::path::PathBuf;

/// 服务器配置 - 中继节点的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/relay | 工作目录 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | CHANNEL_CAPACITY | 1024 | 事件广播通道容量 |
/// | REPLAY_WINDOW | 1024 | 事件回放窗口大小 |
/// | MENU_BASE_URL | https://menu.example.com | 顾客菜单地址 (二维码指向) |
/// | SEED_DEMO_DATA | false | 启动时写入演示订单 |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时(毫秒) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/relay HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 事件广播通道容量
    pub channel_capacity: usize,
    /// 断线重连时可回放的事件条数
    pub replay_window: usize,
    /// 顾客菜单的基础地址，二维码编码的 URL 指向这里
    pub menu_base_url: String,
    /// 启动时是否写入演示订单 (仅当看板为空)
    ///
    /// Seeding is an explicit opt-in, never triggered by an empty poll.
    pub seed_demo_data: bool,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/relay".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            channel_capacity: std::env::var("CHANNEL_CAPACITY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1024),
            replay_window: std::env::var("REPLAY_WINDOW")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1024),
            menu_base_url: std::env::var("MENU_BASE_URL")
                .unwrap_or_else(|_| "https://menu.example.com".into()),
            seed_demo_data: std::env::var("SEED_DEMO_DATA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            shutdown_timeout_ms: std::env::var("SHUTDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config.seed_demo_data = false;
        config
    }

    /// 数据库文件路径 (work_dir/database/relay.redb)
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
            .join("database")
            .join("relay.redb")
    }

    /// 日志目录 (work_dir/logs)
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(PathBuf::from(&self.work_dir).join("database"))?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
