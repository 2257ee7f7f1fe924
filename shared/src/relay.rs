//! 中继事件类型定义
//!
//! These types are shared between the relay server and panel clients.
//! The server assigns every published event a global sequence; clients
//! use it to detect gaps and to resume a dropped stream.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayEventKind {
    /// 新订单
    NewOrder,
    /// 订单状态变化
    OrderStatusChanged,
    /// 菜品状态变化
    ItemStatusChanged,
    /// 服务员呼叫
    WaiterCall,
    /// 呼叫已解决
    CallResolved,
    /// 新通知
    NotificationPosted,
    /// 收到付款
    PaymentRecorded,
    /// 信箱内容变化
    MailboxChanged,
    /// 重放窗口覆盖不到，客户端需要全量拉取
    Resync,
}

impl fmt::Display for RelayEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEventKind::NewOrder => write!(f, "new_order"),
            RelayEventKind::OrderStatusChanged => write!(f, "order_status_changed"),
            RelayEventKind::ItemStatusChanged => write!(f, "item_status_changed"),
            RelayEventKind::WaiterCall => write!(f, "waiter_call"),
            RelayEventKind::CallResolved => write!(f, "call_resolved"),
            RelayEventKind::NotificationPosted => write!(f, "notification_posted"),
            RelayEventKind::PaymentRecorded => write!(f, "payment_recorded"),
            RelayEventKind::MailboxChanged => write!(f, "mailbox_changed"),
            RelayEventKind::Resync => write!(f, "resync"),
        }
    }
}

/// One event on the relay stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEvent {
    /// Stable identity, survives redelivery
    pub event_id: String,
    /// Position in the server's publish order (assigned by the hub)
    pub sequence: u64,
    /// Publish time (Unix milliseconds)
    pub timestamp: i64,
    pub kind: RelayEventKind,
    pub payload: serde_json::Value,
}

impl RelayEvent {
    /// 创建新事件（sequence 由 hub 在发布时填入）
    pub fn new(kind: RelayEventKind, payload: serde_json::Value) -> Self {
        Self {
            event_id: util::new_id(),
            sequence: 0,
            timestamp: util::now_millis(),
            kind,
            payload,
        }
    }

    /// Build an event from any serializable payload
    pub fn from_payload<T: Serialize>(
        kind: RelayEventKind,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// 解析业务数据
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
