//! 本地事件总线
//!
//! 同进程内的同步发布/订阅：`publish` 按注册顺序依次调用当前主题下的所有
//! 处理器，调用结束才返回。跨进程的投递走信箱轮询或 SSE，总线只负责
//! 面板内部组件之间的即时分发。
//!
//! [`Subscription`] 在 drop 时自动退订，组件卸载不会留下悬挂的处理器。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Handler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

struct Registration {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    topics: Mutex<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

/// 同步事件总线
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Arc<Inner>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅一个主题
    ///
    /// 返回的 [`Subscription`] 被 drop 后处理器不再被调用。
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut topics = self.inner.topics.lock().expect("bus lock poisoned");
        topics.entry(topic.clone()).or_default().push(Registration {
            id,
            handler: Arc::new(handler),
        });

        Subscription {
            inner: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    /// 发布一条事件，返回投递到的处理器数量
    ///
    /// 先在锁内拍下处理器快照再逐个调用，处理器里订阅/退订同一总线
    /// 不会死锁；发布中途加入的处理器收不到本条事件。
    pub fn publish(&self, topic: &str, payload: &serde_json::Value) -> usize {
        let handlers: Vec<Handler> = {
            let topics = self.inner.topics.lock().expect("bus lock poisoned");
            match topics.get(topic) {
                Some(registrations) => registrations.iter().map(|r| r.handler.clone()).collect(),
                None => Vec::new(),
            }
        };

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// 当前主题下注册的处理器数量
    pub fn handler_count(&self, topic: &str) -> usize {
        let topics = self.inner.topics.lock().expect("bus lock poisoned");
        topics.get(topic).map(|r| r.len()).unwrap_or(0)
    }
}

/// 订阅凭据，drop 即退订
pub struct Subscription {
    inner: Weak<Inner>,
    topic: String,
    id: u64,
}

impl Subscription {
    /// 显式退订
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut topics = inner.topics.lock().expect("bus lock poisoned");
        if let Some(registrations) = topics.get_mut(&self.topic) {
            registrations.retain(|r| r.id != self.id);
            if registrations.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = LocalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            bus.subscribe("waiter_calls", move |_| seen.lock().unwrap().push(1))
        };
        let second = {
            let seen = seen.clone();
            bus.subscribe("waiter_calls", move |_| seen.lock().unwrap().push(2))
        };

        let delivered = bus.publish("waiter_calls", &json!({"table_number": 7}));
        assert_eq!(delivered, 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);

        drop(first);
        drop(second);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = LocalBus::new();
        let seen = Arc::new(Mutex::new(0u32));

        let subscription = {
            let seen = seen.clone();
            bus.subscribe("payments", move |_| *seen.lock().unwrap() += 1)
        };

        bus.publish("payments", &json!({}));
        assert_eq!(*seen.lock().unwrap(), 1);

        drop(subscription);
        let delivered = bus.publish("payments", &json!({}));
        assert_eq!(delivered, 0);
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(bus.handler_count("payments"), 0);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = LocalBus::new();
        assert_eq!(bus.publish("nobody_home", &json!(null)), 0);
    }

    #[test]
    fn test_subscribe_inside_handler_does_not_deadlock() {
        let bus = LocalBus::new();
        let late = Arc::new(Mutex::new(None));

        let _outer = {
            let bus = bus.clone();
            let late = late.clone();
            bus.clone().subscribe("orders", move |_| {
                let sub = bus.subscribe("orders", |_| {});
                *late.lock().unwrap() = Some(sub);
            })
        };

        // 发布快照里只有 outer 一个处理器
        assert_eq!(bus.publish("orders", &json!({})), 1);
        // 新处理器从下一次发布开始生效
        assert_eq!(bus.publish("orders", &json!({})), 2);
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = LocalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _a = {
            let seen = seen.clone();
            bus.subscribe("cashier_notifications", move |v| {
                seen.lock().unwrap().push(v.clone())
            })
        };

        bus.publish("customer_notifications", &json!("other panel"));
        assert!(seen.lock().unwrap().is_empty());

        bus.publish("cashier_notifications", &json!("bill please"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
