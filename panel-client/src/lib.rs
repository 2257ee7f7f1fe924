//! Panel Client - 面板侧中继客户端
//!
//! 餐厅的各个面板（服务员、收银、后厨、顾客、商家）通过这个 crate
//! 与中继服务器交互：
//!
//! - [`PanelHttp`] - REST API 调用
//! - [`Poller`] - 信箱增量轮询
//! - [`LocalBus`] - 同进程事件分发
//! - [`EventStream`] - SSE 推送订阅（自动重连 + 断点续传）
//! - [`WaiterPanel`] - 服务员面板的内存视图

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod panel;
pub mod poller;

pub use bus::{LocalBus, Subscription};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use events::{EventChannel, EventStream, StreamItem};
pub use http::{MailboxSnapshot, PanelHttp, PaymentSummary, ScanReceipt};
pub use panel::WaiterPanel;
pub use poller::{Poller, PollerHandle};

// Re-export shared types for convenience
pub use shared::records::{Record, StoredRecord};
pub use shared::relay::{RelayEvent, RelayEventKind};
pub use shared::response::ApiResponse;
