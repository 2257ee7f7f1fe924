//! Shared types for the panel relay system
//!
//! Common types used across the relay server and panel clients:
//! record models, relay event types, the API response envelope,
//! mailbox key constants, and utility functions.

pub mod keys;
pub mod records;
pub mod relay;
pub mod response;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Record re-exports (for convenient access)
pub use records::{Record, RecordKind, StoredRecord};
pub use relay::{RelayEvent, RelayEventKind};
pub use response::ApiResponse;
