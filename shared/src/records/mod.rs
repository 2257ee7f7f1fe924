//! Record Model
//!
//! 信箱里的一条记录。Every mailbox value is one of these variants,
//! tagged by `kind` on the wire:
//!
//! ```json
//! {"record_kind": "CALL", "id": "...", "table_number": 7, ...}
//! ```
//!
//! Validation happens at the storage boundary so a malformed record can
//! never be appended, while reads stay tolerant of whatever is on disk.

pub mod call;
pub mod notification;
pub mod order;
pub mod payment;
pub mod qr;
pub mod table_update;

pub use call::{Call, CallCreate, CallKind, CallResolve, CallStatus};
pub use notification::{
    MarkRead, MarkReadResult, Notification, NotificationCreate, NotificationKind,
};
pub use order::{
    ItemStatus, ItemStatusUpdate, Order, OrderCreate, OrderItem, OrderItemCreate, OrderStatus,
    OrderStatusUpdate,
};
pub use payment::{
    AMOUNT_EPSILON, PaymentCreate, PaymentMethod, PaymentRecord, fits_within_total, settles_total,
};
pub use qr::{
    QrCodeBulkCreate, QrCodeCreate, QrCodeEntry, QrCodeScan, QrCodeSetActive, ScanOutcome,
    TOKEN_TTL_MILLIS,
};
pub use table_update::{TableState, TableUpdate, TableUpdateCreate};

use serde::{Deserialize, Serialize};

// ========== Text limits ==========

/// Free text fields (messages, notes)
pub const MAX_TEXT_LEN: usize = 500;

/// Short identifiers (names, resolver tags)
pub const MAX_SHORT_TEXT_LEN: usize = 200;

// ========== Record ==========

/// Record category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Call,
    Notification,
    Payment,
    TableUpdate,
    QrCode,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Call => write!(f, "CALL"),
            RecordKind::Notification => write!(f, "NOTIFICATION"),
            RecordKind::Payment => write!(f, "PAYMENT"),
            RecordKind::TableUpdate => write!(f, "TABLE_UPDATE"),
            RecordKind::QrCode => write!(f, "QR_CODE"),
        }
    }
}

/// One mailbox record
#[derive(Debug, Clone, Serialize, Deserialize)]
// 判别字段叫 record_kind：Call/Notification 自己还带一个 kind 字段，
// 标签不能与之撞名
#[serde(tag = "record_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Record {
    Call(Call),
    Notification(Notification),
    Payment(PaymentRecord),
    TableUpdate(TableUpdate),
    QrCode(QrCodeEntry),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Call(_) => RecordKind::Call,
            Record::Notification(_) => RecordKind::Notification,
            Record::Payment(_) => RecordKind::Payment,
            Record::TableUpdate(_) => RecordKind::TableUpdate,
            Record::QrCode(_) => RecordKind::QrCode,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Call(c) => &c.id,
            Record::Notification(n) => &n.id,
            Record::Payment(p) => &p.id,
            Record::TableUpdate(t) => &t.id,
            Record::QrCode(q) => &q.id,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            Record::Call(c) => c.created_at,
            Record::Notification(n) => n.created_at,
            Record::Payment(p) => p.created_at,
            Record::TableUpdate(t) => t.created_at,
            Record::QrCode(q) => q.created_at,
        }
    }

    /// Check the record before it is accepted into a mailbox.
    ///
    /// 写入前检查，读出时不检查。
    pub fn validate(&self) -> Result<(), String> {
        if self.id().trim().is_empty() {
            return Err("record id must not be empty".to_string());
        }
        if self.created_at() <= 0 {
            return Err("record created_at must be a positive timestamp".to_string());
        }
        match self {
            Record::Call(c) => {
                validate_table_number(c.table_number)?;
                validate_optional_len(&c.message, "message", MAX_TEXT_LEN)?;
                validate_optional_len(&c.resolved_by, "resolved_by", MAX_SHORT_TEXT_LEN)?;
            }
            Record::Notification(n) => {
                if n.message.trim().is_empty() {
                    return Err("notification message must not be empty".to_string());
                }
                if n.message.len() > MAX_TEXT_LEN {
                    return Err(format!(
                        "notification message is too long ({} chars, max {MAX_TEXT_LEN})",
                        n.message.len()
                    ));
                }
                if let Some(table) = n.table_number {
                    validate_table_number(table)?;
                }
                if let Some(amount) = n.amount
                    && amount < 0.0
                {
                    return Err("notification amount must not be negative".to_string());
                }
            }
            Record::Payment(p) => {
                validate_table_number(p.table_number)?;
                if p.order_id.trim().is_empty() {
                    return Err("payment order_id must not be empty".to_string());
                }
                if p.amount <= 0.0 {
                    return Err("payment amount must be positive".to_string());
                }
                validate_optional_len(&p.cashier, "cashier", MAX_SHORT_TEXT_LEN)?;
                if p.is_split && (p.split_index.is_none() || p.split_total.is_none()) {
                    return Err("split payment needs split_index and split_total".to_string());
                }
            }
            Record::TableUpdate(t) => {
                validate_table_number(t.table_number)?;
                validate_optional_len(&t.note, "note", MAX_TEXT_LEN)?;
            }
            Record::QrCode(q) => {
                validate_table_number(q.table_number)?;
                if q.restaurant_id.trim().is_empty() {
                    return Err("qr code restaurant_id must not be empty".to_string());
                }
                if q.token.trim().is_empty() {
                    return Err("qr code token must not be empty".to_string());
                }
            }
        }
        Ok(())
    }
}

fn validate_table_number(table_number: i32) -> Result<(), String> {
    if table_number < 1 {
        return Err(format!("table_number must be >= 1, got {table_number}"));
    }
    Ok(())
}

fn validate_optional_len(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), String> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        ));
    }
    Ok(())
}

// ========== StoredRecord ==========

/// A record plus the mailbox sequence it was appended at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Position in the store's global append sequence
    pub seq: u64,
    pub record: Record,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_tag_on_wire() {
        let record = Record::Call(Call::new(7, CallKind::Bill, None));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"record_kind\":\"CALL\""));
        // 呼叫自己的 kind 字段照常保留
        assert!(json.contains("\"kind\":\"BILL\""));

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), RecordKind::Call);
    }

    #[test]
    fn test_validate_accepts_well_formed_records() {
        let call = Record::Call(Call::new(3, CallKind::Water, Some("ice please".to_string())));
        assert!(call.validate().is_ok());

        let payment = Record::Payment(PaymentRecord::new("o1", 4, 12.5, PaymentMethod::Cash));
        assert!(payment.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_table_number() {
        let record = Record::Call(Call::new(0, CallKind::Waiter, None));
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_notification_message() {
        let record = Record::Notification(Notification::new(NotificationKind::Info, "   "));
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_incomplete_split() {
        let mut payment = PaymentRecord::new("o1", 2, 10.0, PaymentMethod::Card);
        payment.is_split = true;
        payment.split_index = Some(1);
        let record = Record::Payment(payment);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        let mut payment = PaymentRecord::new("o1", 2, 10.0, PaymentMethod::Card);
        payment.amount = 0.0;
        assert!(Record::Payment(payment).validate().is_err());
    }

    #[test]
    fn test_stored_record_keeps_seq_alongside_payload() {
        let stored = StoredRecord {
            seq: 42,
            record: Record::TableUpdate(TableUpdate::new(9, TableState::Occupied)),
        };
        let json = serde_json::to_string(&stored).unwrap();
        assert!(json.contains("\"seq\":42"));
        assert!(json.contains("\"record_kind\":\"TABLE_UPDATE\""));
    }
}
