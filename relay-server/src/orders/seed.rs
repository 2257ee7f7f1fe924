//! Demo data seeding
//!
//! 仅用于演示和本地联调。Seeding is opt-in (SEED_DEMO_DATA=true) and
//! only fills an empty board, so it can never clobber live data.

use shared::records::{OrderCreate, OrderItemCreate};

use super::board::{OrderBoard, OrderResult};

fn item(name: &str, price: f64, quantity: i32) -> OrderItemCreate {
    OrderItemCreate {
        name: name.to_string(),
        price,
        quantity,
        notes: None,
    }
}

/// Seed a handful of demo orders onto an empty board.
///
/// Returns how many orders were placed (0 when the board already has
/// orders).
pub fn seed_demo_data(board: &OrderBoard) -> OrderResult<usize> {
    if board.order_count() > 0 {
        tracing::debug!("board not empty, skipping demo seed");
        return Ok(0);
    }

    let demo_orders = vec![
        OrderCreate {
            table_number: 3,
            items: vec![
                item("Margherita Pizza", 9.5, 1),
                item("Caesar Salad", 6.0, 1),
                item("Sparkling Water", 2.5, 2),
            ],
            notes: None,
        },
        OrderCreate {
            table_number: 7,
            items: vec![
                item("Ribeye Steak", 24.0, 1),
                item("House Red (Glass)", 5.5, 2),
            ],
            notes: Some("medium rare".to_string()),
        },
        OrderCreate {
            table_number: 12,
            items: vec![item("Pasta Carbonara", 11.0, 2), item("Tiramisu", 5.0, 2)],
            notes: None,
        },
    ];

    let count = demo_orders.len();
    for create in demo_orders {
        board.place(create)?;
    }

    tracing::info!(count, "demo orders seeded");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayHub;
    use crate::store::MailboxStore;

    #[test]
    fn test_seed_fills_empty_board() {
        let board = OrderBoard::new(MailboxStore::open_in_memory().unwrap(), RelayHub::new());
        let seeded = seed_demo_data(&board).unwrap();
        assert_eq!(seeded, 3);
        assert_eq!(board.active_orders().len(), 3);
    }

    #[test]
    fn test_seed_skips_non_empty_board() {
        let board = OrderBoard::new(MailboxStore::open_in_memory().unwrap(), RelayHub::new());
        seed_demo_data(&board).unwrap();

        let seeded_again = seed_demo_data(&board).unwrap();
        assert_eq!(seeded_again, 0);
        assert_eq!(board.active_orders().len(), 3);
    }
}
