//! 信箱轮询器
//!
//! 每个面板盯住自己关心的信箱键，按固定间隔增量拉取：
//!
//! 1. 带上次见过的最大序号请求 `since_seq` 之后的记录
//! 2. 按记录 id 去重（整箱替换会用新序号重放旧记录）
//! 3. 把没见过的记录交给回调
//! 4. 可选地把消费掉的未读通知标记为已读
//!
//! 拉取失败只记日志，序号和已见集合原样保留，下个周期重试。

use std::collections::HashSet;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use shared::records::{MarkRead, Record, StoredRecord};

use crate::{ClientConfig, LocalBus, PanelHttp};

/// 单个信箱的轮询进度
#[derive(Debug, Default)]
struct PollState {
    since_seq: u64,
    seen: HashSet<String>,
}

impl PollState {
    /// 过滤出没见过的记录并推进序号
    fn absorb(&mut self, records: Vec<StoredRecord>) -> Vec<StoredRecord> {
        let mut fresh = Vec::new();
        for stored in records {
            self.since_seq = self.since_seq.max(stored.seq);
            if self.seen.insert(stored.record.id().to_string()) {
                fresh.push(stored);
            }
        }
        fresh
    }
}

/// 信箱轮询器
pub struct Poller {
    http: PanelHttp,
    key: String,
    interval: Duration,
    mark_read: bool,
}

impl Poller {
    /// 创建轮询器，间隔取自配置
    pub fn new(http: PanelHttp, key: impl Into<String>, config: &ClientConfig) -> Self {
        Self {
            http,
            key: key.into(),
            interval: config.poll_interval(),
            mark_read: false,
        }
    }

    /// 消费后把未读通知标记为已读（收银/顾客通知箱用）
    pub fn with_mark_read(mut self, enabled: bool) -> Self {
        self.mark_read = enabled;
        self
    }

    /// 启动轮询任务
    ///
    /// 回调按追加顺序收到每条新记录。返回的 [`PollerHandle`] drop 或
    /// `stop` 时任务退出。
    pub fn start<F>(self, mut on_record: F) -> PollerHandle
    where
        F: FnMut(StoredRecord) + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            let mut state = PollState::default();

            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        tracing::debug!(mailbox = %self.key, "poller stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                match self.http.read_mailbox_since(&self.key, state.since_seq).await {
                    Ok(snapshot) => {
                        let fresh = state.absorb(snapshot.records);
                        if fresh.is_empty() {
                            continue;
                        }

                        let mut consumed = Vec::new();
                        for stored in fresh {
                            if self.mark_read
                                && let Record::Notification(n) = &stored.record
                                && !n.read
                            {
                                consumed.push(n.id.clone());
                            }
                            on_record(stored);
                        }

                        if !consumed.is_empty() {
                            let mark = MarkRead { ids: Some(consumed) };
                            if let Err(e) = self.http.mark_read(&self.key, &mark).await {
                                tracing::warn!(mailbox = %self.key, error = %e, "mark-read failed");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(mailbox = %self.key, error = %e, "poll tick failed");
                    }
                }
            }
        });

        PollerHandle { token, handle }
    }

    /// 把新记录转发到本地总线，主题即信箱键名
    pub fn start_into_bus(self, bus: LocalBus) -> PollerHandle {
        let topic = self.key.clone();
        self.start(move |stored| match serde_json::to_value(&stored) {
            Ok(value) => {
                bus.publish(&topic, &value);
            }
            Err(e) => tracing::warn!(topic = %topic, error = %e, "record serialization failed"),
        })
    }
}

/// 运行中的轮询任务
///
/// drop 时取消（不等待退出），`stop` 取消并等待。
pub struct PollerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// 停止轮询并等待任务退出
    pub async fn stop(mut self) {
        self.token.cancel();
        // JoinHandle: Unpin，按可变引用 await，self 留给 Drop 收尾
        let _ = (&mut self.handle).await;
    }

    /// 任务是否已经退出
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
