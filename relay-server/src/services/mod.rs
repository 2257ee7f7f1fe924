//! 面板之间共享的业务服务
//!
//! | 服务 | 职责 |
//! |------|------|
//! | `CallService` | 服务员呼叫的发起 / 解决 / 历史 |
//! | `NotificationService` | 面板通知的投递与已读标记 |
//! | `QrService` | 桌台二维码的生成 / 令牌轮换 / 扫码 |

pub mod calls;
pub mod notifications;
pub mod qr;

pub use calls::CallService;
pub use notifications::NotificationService;
pub use qr::QrService;
