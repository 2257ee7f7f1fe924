//! Relay Server - 餐厅面板事件中继节点
//!
//! # 架构概述
//!
//! 本模块是中继服务器的主入口，提供以下核心功能：
//!
//! - **信箱存储** (`store`): 按 key 存放面板共享记录的嵌入式 redb 存储
//! - **事件中继** (`relay`): 带全局序号和回放窗口的广播枢纽
//! - **订单看板** (`orders`): 活跃订单的唯一事实来源
//! - **业务服务** (`services`): 呼叫、通知、桌台二维码
//! - **HTTP API** (`api`): RESTful + SSE 接口
//!
//! # 模块结构
//!
//! ```text
//! relay-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── store/         # 信箱存储 (redb)
//! ├── relay/         # 事件中继枢纽
//! ├── orders/        # 中央订单看板
//! ├── services/      # 呼叫、通知、二维码
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志、验证
//! ```

pub mod api;
pub mod core;
pub mod orders;
pub mod relay;
pub mod services;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use orders::OrderBoard;
pub use relay::RelayHub;
pub use store::MailboxStore;
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}

pub fn print_banner() {
    println!(
        r#"
    ____       __
   / __ \___  / /___ ___  __
  / /_/ / _ \/ / __ `/ / / /
 / _, _/  __/ / /_/ / /_/ /
/_/ |_|\___/_/\__,_/\__, /
                   /____/
    "#
    );
}
