//! Waiter Call Model
//!
//! 顾客面板发起呼叫，服务员面板解决呼叫。已解决的呼叫归档到历史。

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::util;

/// What the table is asking for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallKind {
    Waiter,
    Water,
    Bill,
    Clean,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Waiter => write!(f, "WAITER"),
            CallKind::Water => write!(f, "WATER"),
            CallKind::Bill => write!(f, "BILL"),
            CallKind::Clean => write!(f, "CLEAN"),
        }
    }
}

/// Call lifecycle (ACTIVE → RESOLVED only)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    #[default]
    Active,
    Resolved,
}

/// Waiter call entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub table_number: i32,
    pub kind: CallKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: CallStatus,
    /// Creation time (Unix milliseconds)
    pub created_at: i64,
    /// Resolution time (Unix milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
    /// Who resolved the call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl Call {
    /// Build a new active call
    pub fn new(table_number: i32, kind: CallKind, message: Option<String>) -> Self {
        Self {
            id: util::new_id(),
            table_number,
            kind,
            message,
            status: CallStatus::Active,
            created_at: util::now_millis(),
            resolved_at: None,
            resolved_by: None,
        }
    }

    /// Mark the call resolved; returns false when already resolved
    pub fn resolve(&mut self, resolved_by: Option<String>) -> bool {
        if self.status == CallStatus::Resolved {
            return false;
        }
        self.status = CallStatus::Resolved;
        self.resolved_at = Some(util::now_millis());
        self.resolved_by = resolved_by;
        true
    }
}

/// Open call payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CallCreate {
    #[validate(range(min = 1))]
    pub table_number: i32,
    pub kind: CallKind,
    #[validate(length(max = 500))]
    pub message: Option<String>,
}

/// Resolve call payload
#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct CallResolve {
    #[validate(length(max = 200))]
    pub resolved_by: Option<String>,
}
