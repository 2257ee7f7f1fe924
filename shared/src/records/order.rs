//! Order Model
//!
//! Orders are owned by the relay server's order board. Items live inside
//! their parent order and are never stored separately.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Order lifecycle status
///
/// Transitions only move forward: PREPARING → READY → SERVED → PAID.
/// CANCELLED is reachable from any non-terminal status. PAID and
/// CANCELLED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Preparing,
    Ready,
    Served,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// Whether the order can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Position in the forward chain (terminal statuses excluded)
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Preparing => Some(0),
            OrderStatus::Ready => Some(1),
            OrderStatus::Served => Some(2),
            OrderStatus::Paid | OrderStatus::Cancelled => None,
        }
    }

    /// Whether a transition to `next` is legal
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            OrderStatus::Paid => true,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Preparing => write!(f, "PREPARING"),
            OrderStatus::Ready => write!(f, "READY"),
            OrderStatus::Served => write!(f, "SERVED"),
            OrderStatus::Paid => write!(f, "PAID"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Item preparation status (forward-only: PREPARING → READY → SERVED)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Preparing,
    Ready,
    Served,
}

impl ItemStatus {
    fn rank(&self) -> u8 {
        match self {
            ItemStatus::Preparing => 0,
            ItemStatus::Ready => 1,
            ItemStatus::Served => 2,
        }
    }

    /// Whether a transition to `next` is legal (backward moves rejected)
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Preparing => write!(f, "PREPARING"),
            ItemStatus::Ready => write!(f, "READY"),
            ItemStatus::Served => write!(f, "SERVED"),
        }
    }
}

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    /// Price in currency unit
    pub price: f64,
    pub quantity: i32,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub table_number: i32,
    pub items: Vec<OrderItem>,
    /// Total amount in currency unit (Σ price × quantity)
    pub total_amount: f64,
    pub status: OrderStatus,
    /// Creation time (Unix milliseconds)
    pub created_at: i64,
    /// Last modification time (Unix milliseconds)
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Order {
    /// Recompute the total from the item lines
    pub fn computed_total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * item.quantity as f64)
            .sum()
    }

    /// Whether every item has reached at least READY
    pub fn all_items_ready(&self) -> bool {
        !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|item| item.status != ItemStatus::Preparing)
    }
}

/// Create order line item payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemCreate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Price in currency unit
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderCreate {
    #[validate(range(min = 1))]
    pub table_number: i32,
    #[validate(nested)]
    #[validate(length(min = 1))]
    pub items: Vec<OrderItemCreate>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Update order status payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

/// Update item status payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStatusUpdate {
    pub status: ItemStatus,
}
