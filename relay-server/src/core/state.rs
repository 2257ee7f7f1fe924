use std::time::Duration;

use shared::keys;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::orders::{OrderBoard, seed_demo_data};
use crate::relay::{HubConfig, RelayHub};
use crate::services::{CallService, NotificationService, QrService};
use crate::store::MailboxStore;

/// 通知类信箱的保留上限，超出部分由后台压缩任务丢弃
const MAX_MAILBOX_RECORDS: usize = 500;

/// 信箱压缩间隔 (秒)
const COMPACT_INTERVAL_SECS: u64 = 300;

/// 服务器状态 - 持有所有服务的单例引用
///
/// ServerState 是中继节点的核心数据结构，持有所有服务的共享引用。
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | MailboxStore | 信箱存储 (redb) |
/// | hub | RelayHub | 事件中继 |
/// | board | OrderBoard | 中央订单看板 |
/// | calls | CallService | 呼叫服务 |
/// | notifications | NotificationService | 通知服务 |
/// | qr | QrService | 二维码服务 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 信箱存储
    pub store: MailboxStore,
    /// 事件中继
    pub hub: RelayHub,
    /// 中央订单看板
    pub board: OrderBoard,
    /// 呼叫服务
    pub calls: CallService,
    /// 通知服务
    pub notifications: NotificationService,
    /// 二维码服务
    pub qr: QrService,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构 (确保目录存在)
    /// 2. 信箱存储 (work_dir/database/relay.redb)
    /// 3. 事件中继
    /// 4. 各服务 (OrderBoard, Calls, Notifications, Qr)
    pub fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let store = MailboxStore::open(config.db_path())?;

        let hub = RelayHub::from_config(HubConfig {
            channel_capacity: config.channel_capacity,
            replay_window: config.replay_window,
        });

        let board = OrderBoard::new(store.clone(), hub.clone());
        let calls = CallService::new(store.clone(), hub.clone());
        let notifications = NotificationService::new(store.clone(), hub.clone());
        let qr = QrService::new(store.clone(), hub.clone(), config.menu_base_url.clone());

        Ok(Self {
            config: config.clone(),
            store,
            hub,
            board,
            calls,
            notifications,
            qr,
        })
    }

    /// 测试用状态，落在临时工作目录里
    #[cfg(test)]
    pub fn for_tests(work_dir: &std::path::Path) -> Self {
        let config = Config::with_overrides(work_dir.to_string_lossy().into_owned(), 0);
        Self::initialize(&config).expect("test state")
    }

    /// 启动后台任务
    ///
    /// 必须在 `Server::run()` 之前调用
    ///
    /// 启动的任务：
    /// - 演示数据预热 (仅当 SEED_DEMO_DATA=true)
    /// - 信箱压缩器 (定时丢弃过旧的通知记录)
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        if self.config.seed_demo_data {
            let board = self.board.clone();
            tasks.spawn("demo_seed", TaskKind::Warmup, async move {
                match seed_demo_data(&board) {
                    Ok(0) => tracing::info!("Demo seed skipped, board already has orders"),
                    Ok(count) => tracing::info!(orders = count, "Demo orders seeded"),
                    Err(e) => tracing::error!(error = %e, "Demo seeding failed"),
                }
            });
        }

        let store = self.store.clone();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("mailbox_compactor", TaskKind::Periodic, async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(COMPACT_INTERVAL_SECS));
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        compact_bounded_mailboxes(&store);
                    }
                }
            }
        });

        tasks.log_summary();
        tasks
    }

    /// 获取信箱存储
    pub fn store(&self) -> &MailboxStore {
        &self.store
    }

    /// 获取事件中继
    pub fn hub(&self) -> &RelayHub {
        &self.hub
    }
}

/// 压缩有界信箱
///
/// 通知 / 桌台状态信箱只保留最近 [`MAX_MAILBOX_RECORDS`] 条。
/// 支付信箱是对账依据，永不压缩；呼叫历史由呼叫服务自行压缩。
fn compact_bounded_mailboxes(store: &MailboxStore) {
    let mut keys: Vec<&str> = keys::NOTIFICATION_KEYS.to_vec();
    keys.push(keys::TABLE_UPDATES);

    for key in keys {
        match store.compact(key, MAX_MAILBOX_RECORDS) {
            Ok(0) => {}
            Ok(removed) => {
                tracing::debug!(mailbox = %key, removed, "Compacted mailbox");
            }
            Err(e) => {
                tracing::error!(mailbox = %key, error = %e, "Mailbox compaction failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::records::{Notification, NotificationKind, Record};

    #[test]
    fn test_initialize_creates_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = ServerState::for_tests(dir.path());

        assert!(dir.path().join("database").exists());
        assert_eq!(state.board.order_count(), 0);
    }

    #[test]
    fn test_compact_bounded_mailboxes_keeps_cap() {
        let dir = tempfile::tempdir().unwrap();
        let state = ServerState::for_tests(dir.path());

        for i in 0..MAX_MAILBOX_RECORDS + 20 {
            let notification =
                Notification::new(NotificationKind::Info, format!("notice {i}"));
            state
                .store
                .append(keys::CASHIER_NOTIFICATIONS, Record::Notification(notification))
                .unwrap();
        }

        compact_bounded_mailboxes(&state.store);

        let remaining = state.store.read(keys::CASHIER_NOTIFICATIONS).unwrap();
        assert_eq!(remaining.len(), MAX_MAILBOX_RECORDS);
    }
}
