//! 通知服务
//!
//! Notifications are append-only per mailbox. Marking as read happens
//! server-side inside one store transaction, so two panels marking the
//! same mailbox concurrently both count only the flips they actually
//! performed and neither loses appended notifications.

use serde_json::json;
use shared::keys;
use shared::records::{MarkRead, MarkReadResult, Notification, NotificationCreate, Record};
use shared::relay::{RelayEvent, RelayEventKind};

use crate::relay::RelayHub;
use crate::store::MailboxStore;
use crate::utils::AppError;

/// 通知服务
#[derive(Clone)]
pub struct NotificationService {
    store: MailboxStore,
    hub: RelayHub,
}

impl NotificationService {
    pub fn new(store: MailboxStore, hub: RelayHub) -> Self {
        Self { store, hub }
    }

    fn check_notification_key(key: &str) -> Result<(), AppError> {
        if !keys::NOTIFICATION_KEYS.contains(&key) {
            return Err(AppError::validation(format!(
                "not a notification mailbox: {key}"
            )));
        }
        Ok(())
    }

    /// 发布通知
    pub fn post(&self, key: &str, create: NotificationCreate) -> Result<Notification, AppError> {
        Self::check_notification_key(key)?;

        let mut notification = Notification::new(create.kind, create.message);
        notification.table_number = create.table_number;
        notification.order_id = create.order_id;
        notification.amount = create.amount;

        self.store
            .append(key, Record::Notification(notification.clone()))?;

        let event = RelayEvent::from_payload(
            RelayEventKind::NotificationPosted,
            &json!({ "key": key, "notification": notification }),
        )?;
        self.hub.publish(event);

        tracing::info!(mailbox = %key, kind = ?notification.kind, "notification posted");
        Ok(notification)
    }

    /// 全部通知
    pub fn all(&self, key: &str) -> Result<Vec<Notification>, AppError> {
        Self::check_notification_key(key)?;
        let records = self.store.read(key)?;
        Ok(records
            .into_iter()
            .filter_map(|stored| match stored.record {
                Record::Notification(n) => Some(n),
                _ => None,
            })
            .collect())
    }

    /// 未读通知
    pub fn unread(&self, key: &str) -> Result<Vec<Notification>, AppError> {
        Ok(self.all(key)?.into_iter().filter(|n| !n.read).collect())
    }

    /// 标记已读
    ///
    /// `ids: None` marks every unread notification. Returns how many
    /// actually flipped, which is how racing panels discover the work
    /// another panel already did.
    pub fn mark_read(&self, key: &str, mark: MarkRead) -> Result<MarkReadResult, AppError> {
        Self::check_notification_key(key)?;

        let (marked, _revision) = self.store.update(key, |records| {
            let mut marked = 0usize;
            for stored in records.iter_mut() {
                if let Record::Notification(n) = &mut stored.record
                    && !n.read
                {
                    let wanted = match &mark.ids {
                        Some(ids) => ids.iter().any(|id| id == &n.id),
                        None => true,
                    };
                    if wanted {
                        n.read = true;
                        marked += 1;
                    }
                }
            }
            marked
        })?;

        if marked > 0 {
            let event = RelayEvent::from_payload(
                RelayEventKind::MailboxChanged,
                &json!({ "key": key, "marked_read": marked }),
            )?;
            self.hub.publish(event);
        }

        tracing::debug!(mailbox = %key, marked, "notifications marked read");
        Ok(MarkReadResult { marked })
    }
}
