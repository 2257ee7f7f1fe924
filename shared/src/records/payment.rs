//! Payment Model
//!
//! Payment records describe settled amounts against an order. The order
//! board enforces that recorded payments never exceed the order total.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::util;

/// Tolerance for floating point money comparison
pub const AMOUNT_EPSILON: f64 = 0.005;

/// How the payment was made
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "CASH"),
            PaymentMethod::Card => write!(f, "CARD"),
            PaymentMethod::Mobile => write!(f, "MOBILE"),
        }
    }
}

/// Payment record entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub order_id: String,
    pub table_number: i32,
    /// Amount paid in currency unit
    pub amount: f64,
    pub method: PaymentMethod,
    /// Cashier who took the payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashier: Option<String>,
    /// Creation time (Unix milliseconds)
    pub created_at: i64,
    /// True when the bill was split across several payments
    pub is_split: bool,
    /// 1-based position within the split
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_index: Option<u32>,
    /// Total number of parts in the split
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_total: Option<u32>,
}

impl PaymentRecord {
    /// Build a whole-bill payment
    pub fn new(
        order_id: impl Into<String>,
        table_number: i32,
        amount: f64,
        method: PaymentMethod,
    ) -> Self {
        Self {
            id: util::new_id(),
            order_id: order_id.into(),
            table_number,
            amount,
            method,
            cashier: None,
            created_at: util::now_millis(),
            is_split: false,
            split_index: None,
            split_total: None,
        }
    }
}

/// Record payment payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentCreate {
    /// Amount paid in currency unit
    #[validate(range(min = 0.01))]
    pub amount: f64,
    pub method: PaymentMethod,
    #[validate(length(max = 200))]
    pub cashier: Option<String>,
    #[serde(default)]
    pub is_split: bool,
    #[validate(range(min = 1))]
    pub split_index: Option<u32>,
    #[validate(range(min = 1))]
    pub split_total: Option<u32>,
}

/// Whether `paid + amount` stays within the order total
pub fn fits_within_total(paid: f64, amount: f64, total: f64) -> bool {
    paid + amount <= total + AMOUNT_EPSILON
}

/// Whether `paid` settles the order total
pub fn settles_total(paid: f64, total: f64) -> bool {
    (total - paid) <= AMOUNT_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_within_total() {
        assert!(fits_within_total(0.0, 10.0, 10.0));
        assert!(fits_within_total(5.0, 5.0, 10.0));
        assert!(!fits_within_total(5.0, 5.01, 10.0));
        // float noise the size of a rounding error is forgiven
        assert!(fits_within_total(3.33, 6.67, 9.999999999));
    }

    #[test]
    fn test_settles_total() {
        assert!(settles_total(10.0, 10.0));
        assert!(settles_total(9.996, 10.0));
        assert!(!settles_total(9.99, 10.0));
    }

    #[test]
    fn test_split_fields_omitted_for_whole_payment() {
        let p = PaymentRecord::new("o1", 4, 25.0, PaymentMethod::Card);
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("split_index"));
        assert!(json.contains("\"is_split\":false"));
    }
}
