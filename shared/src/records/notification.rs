//! Notification Model
//!
//! Notifications are append-only. Panels mark them read through the
//! relay server so concurrent readers cannot lose each other's writes.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::util;

/// Notification category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 顾客请求结账
    BillRequest,
    /// 收银台确认付款
    PaymentConfirmed,
    /// 订单已出餐
    OrderReady,
    /// 订单内容变化（加菜、退菜）
    OrderChange,
    /// 桌台状态变化
    TableChange,
    /// 普通提示
    Info,
}

/// Notification entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Amount in currency unit, when the notification carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub message: String,
    /// Creation time (Unix milliseconds)
    pub created_at: i64,
    pub read: bool,
}

impl Notification {
    /// Build a new unread notification
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: util::new_id(),
            kind,
            table_number: None,
            order_id: None,
            amount: None,
            message: message.into(),
            created_at: util::now_millis(),
            read: false,
        }
    }

    pub fn with_table(mut self, table_number: i32) -> Self {
        self.table_number = Some(table_number);
        self
    }

    pub fn with_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Post notification payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationCreate {
    pub kind: NotificationKind,
    #[validate(range(min = 1))]
    pub table_number: Option<i32>,
    pub order_id: Option<String>,
    pub amount: Option<f64>,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

/// Mark-read payload: ids to flip, or all unread when omitted
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarkRead {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

/// Mark-read result: how many notifications actually flipped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResult {
    pub marked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(NotificationKind::BillRequest, "Table 7 requests the bill")
            .with_table(7)
            .with_amount(54.5);
        assert!(!n.read);
        assert_eq!(n.table_number, Some(7));
        assert_eq!(n.amount, Some(54.5));
        assert!(n.order_id.is_none());
    }

    #[test]
    fn test_kind_wire_format() {
        let json = serde_json::to_string(&NotificationKind::BillRequest).unwrap();
        assert_eq!(json, "\"bill_request\"");
    }

    #[test]
    fn test_mark_read_payload_omits_empty_ids() {
        let body = MarkRead::default();
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, "{}");

        let body = MarkRead {
            ids: Some(vec!["a".to_string()]),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"ids\""));
    }
}
