//! Order board and demo seeding

pub mod board;
pub mod seed;

pub use board::{OrderBoard, OrderError, OrderResult};
pub use seed::seed_demo_data;
