//! 中央订单看板
//!
//! The board is the single source of truth for live orders. Panels never
//! exchange orders directly; they read the board and react to the events
//! it publishes.
//!
//! # 职责
//!
//! - 下单 (place)
//! - 状态流转 (update_status / update_item_status)
//! - 收款对账 (record_payment / paid_total)
//!
//! Payment records are also appended to the payments mailbox so the
//! cashier panel's poller sees them without asking the board.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use shared::keys;
use shared::records::{
    ItemStatus, Order, OrderCreate, OrderItem, OrderStatus, PaymentCreate, PaymentRecord, Record,
    payment,
};
use shared::relay::{RelayEvent, RelayEventKind};
use shared::util;
use thiserror::Error;

use crate::relay::RelayHub;
use crate::store::{MailboxStore, StorageError};
use crate::utils::AppError;

/// Order board errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid item status transition: {from} -> {to}")]
    InvalidItemTransition { from: ItemStatus, to: ItemStatus },

    #[error("Item index {index} out of range (order has {count} items)")]
    ItemIndexOutOfRange { index: usize, count: usize },

    #[error("Payment of {amount} exceeds remaining balance {remaining}")]
    PaymentExceedsTotal { amount: f64, remaining: f64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotFound(_) => AppError::NotFound(e.to_string()),
            OrderError::ItemIndexOutOfRange { .. } => AppError::NotFound(e.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::InvalidItemTransition { .. } => {
                AppError::BusinessRule(e.to_string())
            }
            OrderError::PaymentExceedsTotal { .. } => AppError::BusinessRule(e.to_string()),
            OrderError::Validation(msg) => AppError::Validation(msg),
            OrderError::Storage(storage) => storage.into(),
            OrderError::Serialization(err) => AppError::Internal(err.to_string()),
        }
    }
}

/// Item status change event payload
#[derive(Debug, Clone, Serialize)]
struct ItemStatusPayload<'a> {
    order_id: &'a str,
    item_index: usize,
    status: ItemStatus,
    order: &'a Order,
}

/// 订单看板
#[derive(Clone)]
pub struct OrderBoard {
    orders: Arc<DashMap<String, Order>>,
    store: MailboxStore,
    hub: RelayHub,
    /// Serializes the read-check-append section of record_payment
    payment_guard: Arc<Mutex<()>>,
}

impl OrderBoard {
    pub fn new(store: MailboxStore, hub: RelayHub) -> Self {
        Self {
            orders: Arc::new(DashMap::new()),
            store,
            hub,
            payment_guard: Arc::new(Mutex::new(())),
        }
    }

    // ========== Placing ==========

    /// 下单
    ///
    /// Builds the order, stores it, and publishes `new_order`.
    pub fn place(&self, create: OrderCreate) -> OrderResult<Order> {
        if create.items.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        if create.table_number < 1 {
            return Err(OrderError::Validation(format!(
                "table_number must be >= 1, got {}",
                create.table_number
            )));
        }
        for item in &create.items {
            if item.quantity < 1 {
                return Err(OrderError::Validation(format!(
                    "item quantity must be >= 1, got {} for {}",
                    item.quantity, item.name
                )));
            }
            if item.price < 0.0 {
                return Err(OrderError::Validation(format!(
                    "item price must not be negative, got {} for {}",
                    item.price, item.name
                )));
            }
        }

        let now = util::now_millis();
        let items: Vec<OrderItem> = create
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: util::new_id(),
                name: item.name,
                price: item.price,
                quantity: item.quantity,
                status: ItemStatus::Preparing,
                notes: item.notes,
            })
            .collect();

        let mut order = Order {
            id: util::new_id(),
            table_number: create.table_number,
            items,
            total_amount: 0.0,
            status: OrderStatus::Preparing,
            created_at: now,
            updated_at: now,
            notes: create.notes,
        };
        order.total_amount = order.computed_total();

        self.orders.insert(order.id.clone(), order.clone());
        self.publish_order(RelayEventKind::NewOrder, &order)?;

        tracing::info!(order_id = %order.id, table = order.table_number, "order placed");
        Ok(order)
    }

    // ========== Reading ==========

    /// 活动订单快照 (按下单时间排序)
    ///
    /// Returns clones; mutating the result never touches the board.
    pub fn active_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| !entry.value().status.is_terminal())
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|order| order.created_at);
        orders
    }

    /// 查询单个订单
    pub fn get(&self, order_id: &str) -> OrderResult<Order> {
        self.orders
            .get(order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    // ========== Status transitions ==========

    /// 更新订单状态
    ///
    /// Only the status and `updated_at` change; items and totals stay
    /// as they were.
    pub fn update_status(&self, order_id: &str, new_status: OrderStatus) -> OrderResult<Order> {
        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

        let order = entry.value_mut();
        if !order.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: new_status,
            });
        }

        order.status = new_status;
        order.updated_at = util::now_millis();
        let updated = order.clone();
        drop(entry);

        self.publish_order(RelayEventKind::OrderStatusChanged, &updated)?;
        tracing::info!(order_id = %updated.id, status = %updated.status, "order status updated");
        Ok(updated)
    }

    /// 更新菜品状态
    ///
    /// When the last item leaves PREPARING the whole order advances to
    /// READY automatically.
    pub fn update_item_status(
        &self,
        order_id: &str,
        item_index: usize,
        new_status: ItemStatus,
    ) -> OrderResult<Order> {
        let mut entry = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

        let order = entry.value_mut();
        if order.status.is_terminal() {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: order.status,
            });
        }

        let count = order.items.len();
        let item = order
            .items
            .get_mut(item_index)
            .ok_or(OrderError::ItemIndexOutOfRange {
                index: item_index,
                count,
            })?;

        if !item.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidItemTransition {
                from: item.status,
                to: new_status,
            });
        }

        item.status = new_status;
        order.updated_at = util::now_millis();

        let promoted = order.status == OrderStatus::Preparing && order.all_items_ready();
        if promoted {
            order.status = OrderStatus::Ready;
        }
        let updated = order.clone();
        drop(entry);

        let payload = ItemStatusPayload {
            order_id,
            item_index,
            status: new_status,
            order: &updated,
        };
        self.publish(RelayEventKind::ItemStatusChanged, &payload)?;
        if promoted {
            self.publish_order(RelayEventKind::OrderStatusChanged, &updated)?;
            tracing::info!(order_id = %updated.id, "all items ready, order promoted to READY");
        }
        Ok(updated)
    }

    // ========== Payments ==========

    /// 记录收款
    ///
    /// The sum of recorded payments can never exceed the order total
    /// (within a small float tolerance). A payment that settles the
    /// total moves the order to PAID. Returns the order as it stands
    /// after the payment, together with the record.
    pub fn record_payment(
        &self,
        order_id: &str,
        create: PaymentCreate,
    ) -> OrderResult<(Order, PaymentRecord)> {
        if create.amount <= 0.0 {
            return Err(OrderError::Validation(
                "payment amount must be positive".to_string(),
            ));
        }
        if create.is_split && (create.split_index.is_none() || create.split_total.is_none()) {
            return Err(OrderError::Validation(
                "split payment needs split_index and split_total".to_string(),
            ));
        }

        let order = self.get(order_id)?;
        if order.status.is_terminal() {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Paid,
            });
        }

        // Concurrent cashiers race on the remaining balance; one guard
        // covers the read-check-append window.
        let guard = self.payment_guard.lock();

        let paid = self.paid_total(order_id)?;
        if !payment::fits_within_total(paid, create.amount, order.total_amount) {
            return Err(OrderError::PaymentExceedsTotal {
                amount: create.amount,
                remaining: (order.total_amount - paid).max(0.0),
            });
        }

        let record = PaymentRecord {
            id: util::new_id(),
            order_id: order_id.to_string(),
            table_number: order.table_number,
            amount: create.amount,
            method: create.method,
            cashier: create.cashier,
            created_at: util::now_millis(),
            is_split: create.is_split,
            split_index: create.split_index,
            split_total: create.split_total,
        };
        self.store
            .append(keys::PAYMENTS, Record::Payment(record.clone()))?;
        let settled = payment::settles_total(paid + create.amount, order.total_amount);
        drop(guard);

        self.publish(RelayEventKind::PaymentRecorded, &record)?;
        tracing::info!(
            order_id = %order_id,
            amount = record.amount,
            method = %record.method,
            "payment recorded"
        );

        if settled {
            // Refetch inside update_status; the order may have moved
            // (e.g. READY -> SERVED) while the payment was recorded.
            match self.update_status(order_id, OrderStatus::Paid) {
                Ok(paid_order) => {
                    tracing::info!(order_id = %paid_order.id, "order fully paid");
                }
                Err(OrderError::InvalidTransition { from, .. }) => {
                    // The order went terminal under us; the payment stands.
                    tracing::warn!(order_id = %order_id, %from, "settled order no longer payable");
                }
                Err(e) => return Err(e),
            }
        }

        let order = self.get(order_id)?;
        Ok((order, record))
    }

    /// 已收款总额
    pub fn paid_total(&self, order_id: &str) -> OrderResult<f64> {
        let records = self.store.read(keys::PAYMENTS)?;
        Ok(records
            .iter()
            .filter_map(|stored| match &stored.record {
                Record::Payment(p) if p.order_id == order_id => Some(p.amount),
                _ => None,
            })
            .sum())
    }

    /// 订单的收款记录
    pub fn payments_for(&self, order_id: &str) -> OrderResult<Vec<PaymentRecord>> {
        let records = self.store.read(keys::PAYMENTS)?;
        Ok(records
            .into_iter()
            .filter_map(|stored| match stored.record {
                Record::Payment(p) if p.order_id == order_id => Some(p),
                _ => None,
            })
            .collect())
    }

    // ========== Events ==========

    fn publish_order(&self, kind: RelayEventKind, order: &Order) -> OrderResult<RelayEvent> {
        self.publish(kind, order)
    }

    fn publish<T: Serialize>(&self, kind: RelayEventKind, payload: &T) -> OrderResult<RelayEvent> {
        let event = RelayEvent::from_payload(kind, payload)?;
        Ok(self.hub.publish(event))
    }
}
