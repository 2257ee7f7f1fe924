//! 服务员面板视图
//!
//! 面板内存里的呼叫/订单状态。数据从两条通道进来：信箱轮询吐出的记录
//! 和 SSE 推送的事件。两条通道都可能重复投递同一件事，应用前按 id
//! 去重，重复到达是无害的空操作。

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use shared::records::{Call, CallStatus, Order, Record};
use shared::relay::{RelayEvent, RelayEventKind};

/// ItemStatusChanged 事件的载荷，只取嵌入的订单全量
#[derive(Deserialize)]
struct ItemStatusEvent {
    order: Order,
}

/// 服务员面板的内存视图
#[derive(Debug, Default)]
pub struct WaiterPanel {
    active_calls: Vec<Call>,
    call_history: Vec<Call>,
    orders: HashMap<String, Order>,
    applied_events: HashSet<String>,
}

impl WaiterPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// 吸收一条信箱记录（轮询路径）
    pub fn absorb_record(&mut self, record: &Record) {
        if let Record::Call(call) = record {
            self.upsert_call(call.clone());
        }
    }

    /// 应用一条推送事件（SSE 路径）
    ///
    /// 返回视图是否因此变化；重复的 `event_id` 直接忽略。
    pub fn apply_event(&mut self, event: &RelayEvent) -> bool {
        if self.applied_events.contains(&event.event_id) {
            return false;
        }

        let applied = match event.kind {
            RelayEventKind::WaiterCall | RelayEventKind::CallResolved => {
                match event.payload_as::<Call>() {
                    Ok(call) => {
                        self.upsert_call(call);
                        true
                    }
                    Err(e) => {
                        tracing::warn!(kind = %event.kind, error = %e, "bad call payload");
                        false
                    }
                }
            }
            RelayEventKind::NewOrder | RelayEventKind::OrderStatusChanged => {
                match event.payload_as::<Order>() {
                    Ok(order) => {
                        self.upsert_order(order);
                        true
                    }
                    Err(e) => {
                        tracing::warn!(kind = %event.kind, error = %e, "bad order payload");
                        false
                    }
                }
            }
            RelayEventKind::ItemStatusChanged => match event.payload_as::<ItemStatusEvent>() {
                Ok(payload) => {
                    self.upsert_order(payload.order);
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, "bad item status payload");
                    false
                }
            },
            // 通知、信箱变更走轮询路径；resync 由事件流层面处理
            _ => false,
        };

        if applied {
            self.applied_events.insert(event.event_id.clone());
        }
        applied
    }

    /// 活跃呼叫快照
    pub fn active_calls(&self) -> Vec<Call> {
        self.active_calls.clone()
    }

    /// 已解决呼叫快照，新的在前
    pub fn call_history(&self) -> Vec<Call> {
        self.call_history.clone()
    }

    /// 未进入终态的订单快照，按下单时间排序
    pub fn active_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.values().cloned().collect();
        orders.sort_by_key(|order| order.created_at);
        orders
    }

    /// 全量替换呼叫状态（resync 后）
    pub fn reset_calls(&mut self, active: Vec<Call>, history: Vec<Call>) {
        self.active_calls = active;
        self.call_history = history;
    }

    /// 全量替换订单状态（resync 后）
    pub fn reset_orders(&mut self, orders: Vec<Order>) {
        self.orders = orders
            .into_iter()
            .filter(|order| !order.status.is_terminal())
            .map(|order| (order.id.clone(), order))
            .collect();
    }

    fn upsert_call(&mut self, call: Call) {
        match call.status {
            CallStatus::Active => {
                // 已归档的呼叫不会因为重放回到活跃列表
                if self.call_history.iter().any(|c| c.id == call.id) {
                    return;
                }
                match self.active_calls.iter_mut().find(|c| c.id == call.id) {
                    Some(existing) => *existing = call,
                    None => self.active_calls.push(call),
                }
            }
            CallStatus::Resolved => {
                self.active_calls.retain(|c| c.id != call.id);
                if let Some(existing) = self.call_history.iter_mut().find(|c| c.id == call.id) {
                    *existing = call;
                } else {
                    self.call_history.insert(0, call);
                }
            }
        }
    }

    fn upsert_order(&mut self, order: Order) {
        if order.status.is_terminal() {
            self.orders.remove(&order.id);
        } else {
            self.orders.insert(order.id.clone(), order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::records::{CallKind, ItemStatus, OrderItem, OrderStatus};

    fn bill_call(table: i32) -> Call {
        Call::new(table, CallKind::Bill, None)
    }

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            table_number: 4,
            items: vec![OrderItem {
                id: "i1".to_string(),
                name: "soup".to_string(),
                price: 6.5,
                quantity: 1,
                status: ItemStatus::Preparing,
                notes: None,
            }],
            total_amount: 6.5,
            status,
            created_at: 1,
            updated_at: 1,
            notes: None,
        }
    }

    fn call_event(kind: RelayEventKind, call: &Call, sequence: u64) -> RelayEvent {
        RelayEvent::from_payload(kind, call)
            .unwrap()
            .with_sequence(sequence)
    }

    #[test]
    fn test_apply_event_is_idempotent() {
        let mut panel = WaiterPanel::new();
        let event = call_event(RelayEventKind::WaiterCall, &bill_call(7), 1);

        assert!(panel.apply_event(&event));
        assert!(!panel.apply_event(&event));
        assert_eq!(panel.active_calls().len(), 1);
    }

    #[test]
    fn test_call_lifecycle_moves_to_history() {
        let mut panel = WaiterPanel::new();
        let mut call = bill_call(7);

        panel.apply_event(&call_event(RelayEventKind::WaiterCall, &call, 1));
        assert_eq!(panel.active_calls().len(), 1);
        assert_eq!(panel.active_calls()[0].table_number, 7);

        call.resolve(Some("anna".to_string()));
        panel.apply_event(&call_event(RelayEventKind::CallResolved, &call, 2));

        assert!(panel.active_calls().is_empty());
        let history = panel.call_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, CallStatus::Resolved);
        assert_eq!(history[0].resolved_by.as_deref(), Some("anna"));
    }

    #[test]
    fn test_resolved_call_does_not_resurrect() {
        let mut panel = WaiterPanel::new();
        let mut call = bill_call(3);
        let open_event = call_event(RelayEventKind::WaiterCall, &call, 1);

        call.resolve(None);
        panel.apply_event(&call_event(RelayEventKind::CallResolved, &call, 2));

        // 迟到的开呼事件不能把已归档的呼叫拉回活跃列表
        panel.apply_event(&open_event);
        assert!(panel.active_calls().is_empty());
        assert_eq!(panel.call_history().len(), 1);
    }

    #[test]
    fn test_absorb_record_mirrors_event_path() {
        let mut panel = WaiterPanel::new();
        let mut call = bill_call(5);

        panel.absorb_record(&Record::Call(call.clone()));
        assert_eq!(panel.active_calls().len(), 1);

        call.resolve(None);
        panel.absorb_record(&Record::Call(call));
        assert!(panel.active_calls().is_empty());
        assert_eq!(panel.call_history().len(), 1);
    }

    #[test]
    fn test_order_events_upsert_and_drop_terminal() {
        let mut panel = WaiterPanel::new();

        let event = RelayEvent::from_payload(
            RelayEventKind::NewOrder,
            &order("o1", OrderStatus::Preparing),
        )
        .unwrap()
        .with_sequence(1);
        panel.apply_event(&event);
        assert_eq!(panel.active_orders().len(), 1);

        let event = RelayEvent::from_payload(
            RelayEventKind::OrderStatusChanged,
            &order("o1", OrderStatus::Paid),
        )
        .unwrap()
        .with_sequence(2);
        panel.apply_event(&event);
        assert!(panel.active_orders().is_empty());
    }

    #[test]
    fn test_item_status_event_replaces_order() {
        let mut panel = WaiterPanel::new();
        let mut updated = order("o1", OrderStatus::Preparing);
        updated.items[0].status = ItemStatus::Ready;

        let event = RelayEvent::new(
            RelayEventKind::ItemStatusChanged,
            json!({
                "order_id": "o1",
                "item_index": 0,
                "status": "READY",
                "order": updated,
            }),
        )
        .with_sequence(3);

        assert!(panel.apply_event(&event));
        assert_eq!(panel.active_orders()[0].items[0].status, ItemStatus::Ready);
    }

    #[test]
    fn test_reset_replaces_state() {
        let mut panel = WaiterPanel::new();
        panel.apply_event(&call_event(RelayEventKind::WaiterCall, &bill_call(1), 1));

        let mut resolved = bill_call(2);
        resolved.resolve(None);
        panel.reset_calls(vec![bill_call(9)], vec![resolved]);

        assert_eq!(panel.active_calls().len(), 1);
        assert_eq!(panel.active_calls()[0].table_number, 9);
        assert_eq!(panel.call_history().len(), 1);

        panel.reset_orders(vec![
            order("alive", OrderStatus::Ready),
            order("done", OrderStatus::Paid),
        ]);
        assert_eq!(panel.active_orders().len(), 1);
        assert_eq!(panel.active_orders()[0].id, "alive");
    }
}
