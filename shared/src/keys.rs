//! Well-known mailbox keys
//!
//! Every panel reads and writes the same fixed set of keys. A key holds a
//! JSON array of records; missing keys read as empty arrays.
//!
//! | Key | Producer | Consumer | Content |
//! |-----|----------|----------|---------|
//! | `waiter_calls` | customer panel | waiter panel | active service calls |
//! | `call_history` | relay server | waiter/business panel | resolved calls |
//! | `payments` | cashier panel | business panel | payment records |
//! | `cashier_notifications` | waiter/customer panel | cashier panel | bill requests |
//! | `customer_notifications` | cashier panel | customer panel | payment confirmations |
//! | `kitchen_change_notifications` | waiter panel | kitchen panel | order changes |
//! | `table_updates` | waiter panel | cashier panel | table state changes |

/// Active service calls raised from customer/table QR pages
pub const WAITER_CALLS: &str = "waiter_calls";

/// Resolved calls, newest first
pub const CALL_HISTORY: &str = "call_history";

/// Append-only payment records
pub const PAYMENTS: &str = "payments";

/// Notifications targeted at the cashier panel
pub const CASHIER_NOTIFICATIONS: &str = "cashier_notifications";

/// Notifications targeted at customer-facing panels
pub const CUSTOMER_NOTIFICATIONS: &str = "customer_notifications";

/// Order-change notices for the kitchen panel
pub const KITCHEN_CHANGE_NOTIFICATIONS: &str = "kitchen_change_notifications";

/// Table state changes (seated, cleared, moved)
pub const TABLE_UPDATES: &str = "table_updates";

/// All well-known keys, in documentation order
pub const WELL_KNOWN: &[&str] = &[
    WAITER_CALLS,
    CALL_HISTORY,
    PAYMENTS,
    CASHIER_NOTIFICATIONS,
    CUSTOMER_NOTIFICATIONS,
    KITCHEN_CHANGE_NOTIFICATIONS,
    TABLE_UPDATES,
];

/// Keys that hold [`crate::records::Notification`] records
pub const NOTIFICATION_KEYS: &[&str] = &[
    CASHIER_NOTIFICATIONS,
    CUSTOMER_NOTIFICATIONS,
    KITCHEN_CHANGE_NOTIFICATIONS,
];

const MAX_KEY_LEN: usize = 128;

/// Mailbox key for a restaurant's QR code entries
pub fn qr_codes_key(restaurant_id: &str) -> String {
    format!("qr-codes-{}", restaurant_id)
}

/// Validate a mailbox key name.
///
/// Keys must be non-empty, at most 128 bytes, and contain no control
/// characters. Arbitrary keys beyond the well-known set are allowed.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN && !key.chars().any(|c| c.is_control())
}
