//! Cross-panel event distribution

pub mod hub;

pub use hub::{HubConfig, RelayHub};
