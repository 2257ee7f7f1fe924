//! Table Update Model

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::util;

/// Table occupancy state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableState {
    Available,
    Occupied,
    Reserved,
    Cleaning,
}

/// Table state change entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableUpdate {
    pub id: String,
    pub table_number: i32,
    pub state: TableState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Creation time (Unix milliseconds)
    pub created_at: i64,
}

impl TableUpdate {
    pub fn new(table_number: i32, state: TableState) -> Self {
        Self {
            id: util::new_id(),
            table_number,
            state,
            note: None,
            created_at: util::now_millis(),
        }
    }
}

/// Post table update payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TableUpdateCreate {
    #[validate(range(min = 1))]
    pub table_number: i32,
    pub state: TableState,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}
