//! QR Code Model
//!
//! 每张桌台一个 QR 码。Tokens rotate and expire; scanning an expired
//! token must fail even when the code itself is still active.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::util;

/// How long a token stays valid (2 hours, in milliseconds)
pub const TOKEN_TTL_MILLIS: i64 = 2 * 60 * 60 * 1000;

/// QR code entry entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCodeEntry {
    pub id: String,
    pub restaurant_id: String,
    pub table_number: i32,
    /// Access token embedded in the encoded URL
    pub token: String,
    /// Rendered QR image URL
    pub qr_image_url: String,
    pub active: bool,
    /// Creation time (Unix milliseconds)
    pub created_at: i64,
    /// When the current token was issued (Unix milliseconds)
    pub token_created_at: i64,
    pub scan_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scanned_at: Option<i64>,
}

impl QrCodeEntry {
    /// Whether the token is still inside its lifetime at `now`.
    ///
    /// A token aged exactly the full lifetime is already invalid.
    pub fn token_valid_at(&self, now: i64) -> bool {
        now - self.token_created_at < TOKEN_TTL_MILLIS
    }

    /// Issue a fresh token, resetting its clock
    pub fn rotate_token(&mut self) {
        self.token = util::random_token();
        self.token_created_at = util::now_millis();
    }
}

/// Result of scanning a code's token
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    /// Token accepted, scan counted
    Valid,
    /// Token aged out
    Expired,
    /// Code disabled by the restaurant
    Inactive,
}

/// Create QR code payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QrCodeCreate {
    #[validate(range(min = 1))]
    pub table_number: i32,
}

/// Bulk create payload (tables 1..=count)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QrCodeBulkCreate {
    #[validate(range(min = 1, max = 500))]
    pub count: i32,
}

/// Enable / disable payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCodeSetActive {
    pub active: bool,
}

/// Scan payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QrCodeScan {
    #[validate(length(min = 1, max = 64))]
    pub token: String,
}
