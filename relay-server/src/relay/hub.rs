//! 中继事件枢纽
//!
//! # 架构
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      RelayHub                           │
//! │  ┌──────────────────────────┐  ┌─────────────────────┐  │
//! │  │ broadcast::Sender        │  │ replay log          │  │
//! │  │ <RelayEvent>             │  │ (bounded VecDeque)  │  │
//! │  └──────────────────────────┘  └─────────────────────┘  │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//!         ┌────────────────┼────────────────┐
//!         ▼                ▼                ▼
//!    SSE stream       SSE stream       SSE stream
//!    (waiter)         (cashier)        (kitchen)
//! ```
//!
//! Every published event gets the next global sequence and lands in the
//! replay log before any subscriber sees it, so a reconnecting client
//! can be caught up from `Last-Event-ID` without a full refetch as long
//! as the gap fits the window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use shared::relay::{RelayEvent, RelayEventKind};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Configuration for the event hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the broadcast channel (default: 1024)
    pub channel_capacity: usize,
    /// How many published events are kept for replay (default: 1024)
    pub replay_window: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            replay_window: 1024,
        }
    }
}

/// 事件枢纽 - 负责跨面板事件分发
///
/// # 职责
///
/// - 事件编号 (publish 时分配全局 sequence)
/// - 实时广播 (subscribe)
/// - 断线重放 (events_since)
#[derive(Debug, Clone)]
pub struct RelayHub {
    /// 广播通道
    event_tx: broadcast::Sender<RelayEvent>,
    /// 重放窗口
    replay: Arc<RwLock<VecDeque<RelayEvent>>>,
    /// 全局事件序号
    sequence: Arc<AtomicU64>,
    config: HubConfig,
    /// 关闭信号令牌
    shutdown_token: CancellationToken,
}

impl RelayHub {
    /// 创建默认配置的事件枢纽
    pub fn new() -> Self {
        Self::from_config(HubConfig::default())
    }

    /// 从配置创建事件枢纽
    pub fn from_config(config: HubConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.channel_capacity);
        Self {
            event_tx,
            replay: Arc::new(RwLock::new(VecDeque::with_capacity(
                config.replay_window.min(1024),
            ))),
            sequence: Arc::new(AtomicU64::new(0)),
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 发布事件 (分配序号 → 入重放窗口 → 广播)
    ///
    /// Publishing succeeds with zero subscribers; the event still lands
    /// in the replay window.
    pub fn publish(&self, event: RelayEvent) -> RelayEvent {
        // Sequence assignment and log insertion stay under one lock so
        // subscribers never observe events out of order.
        let mut log = self.replay.write();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = event.with_sequence(sequence);

        log.push_back(event.clone());
        while log.len() > self.config.replay_window {
            log.pop_front();
        }

        let _ = self.event_tx.send(event.clone());
        drop(log);

        tracing::debug!(kind = %event.kind, sequence, "event published");
        event
    }

    /// 订阅实时事件流
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.event_tx.subscribe()
    }

    /// 重放 `since` 之后的事件
    ///
    /// Returns `None` when the replay window no longer covers the gap;
    /// the caller should tell the client to refetch state instead. A
    /// `since` beyond the current sequence means the client carries a
    /// watermark from a previous server life, which is the same
    /// situation: resync.
    pub fn events_since(&self, since: u64) -> Option<Vec<RelayEvent>> {
        let log = self.replay.read();
        let current = self.sequence.load(Ordering::SeqCst);

        if since > current {
            return None;
        }
        if since == current {
            return Some(Vec::new());
        }

        match log.front() {
            Some(oldest) if oldest.sequence <= since + 1 => Some(
                log.iter()
                    .filter(|event| event.sequence > since)
                    .cloned()
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Build the event a client gets when its gap outgrew the window
    pub fn resync_event(&self) -> RelayEvent {
        RelayEvent::new(
            RelayEventKind::Resync,
            serde_json::json!({ "reason": "replay window exceeded" }),
        )
        .with_sequence(self.current_sequence())
    }

    /// 当前序号 (最后发布事件的 sequence)
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }

    /// 获取关闭令牌 (SSE 流监听此令牌结束响应)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// 优雅关闭事件枢纽
    pub fn shutdown(&self) {
        tracing::info!("Shutting down relay hub");
        self.shutdown_token.cancel();
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}
