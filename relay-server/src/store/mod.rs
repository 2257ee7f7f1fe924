//! Persistence layer

pub mod mailbox;

pub use mailbox::{MailboxStore, StorageError, StorageResult, StoreStats};
