//! 桌台二维码服务
//!
//! One QR entry per table, stored in the per-restaurant
//! `qr-codes-{restaurant_id}` mailbox. The encoded URL carries a token
//! that ages out after two hours; stale printouts scan as EXPIRED until
//! the business panel refreshes them.

use serde_json::json;
use shared::keys;
use shared::records::{
    QrCodeBulkCreate, QrCodeCreate, QrCodeEntry, QrCodeScan, Record, ScanOutcome,
};
use shared::relay::{RelayEvent, RelayEventKind};
use shared::util;

use crate::relay::RelayHub;
use crate::store::MailboxStore;
use crate::utils::AppError;
use crate::utils::validation::{MAX_NAME_LEN, validate_required_text};

/// Upper bound for bulk generation
pub const MAX_BULK_COUNT: i32 = 500;

/// Result of recording a scan
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScanReceipt {
    pub outcome: ScanOutcome,
    /// Where a valid scan should land
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu_url: Option<String>,
}

/// 二维码服务
#[derive(Clone)]
pub struct QrService {
    store: MailboxStore,
    hub: RelayHub,
    /// Base URL of the customer menu the codes point at
    menu_base_url: String,
}

impl QrService {
    pub fn new(store: MailboxStore, hub: RelayHub, menu_base_url: impl Into<String>) -> Self {
        Self {
            store,
            hub,
            menu_base_url: menu_base_url.into(),
        }
    }

    /// 顾客扫码后落地的菜单地址
    fn target_url(&self, restaurant_id: &str, table_number: i32, token: &str) -> String {
        format!(
            "{}/m/{}/{}?token={}",
            self.menu_base_url.trim_end_matches('/'),
            urlencoding::encode(restaurant_id),
            table_number,
            token
        )
    }

    /// 渲染二维码图片的地址
    fn image_url(&self, target: &str) -> String {
        format!(
            "https://api.qrserver.com/v1/create-qr-code/?size=200x200&data={}",
            urlencoding::encode(target)
        )
    }

    fn build_entry(&self, restaurant_id: &str, table_number: i32) -> QrCodeEntry {
        let token = util::random_token();
        let now = util::now_millis();
        let target = self.target_url(restaurant_id, table_number, &token);
        QrCodeEntry {
            id: util::new_id(),
            restaurant_id: restaurant_id.to_string(),
            table_number,
            token,
            qr_image_url: self.image_url(&target),
            active: true,
            created_at: now,
            token_created_at: now,
            scan_count: 0,
            last_scanned_at: None,
        }
    }

    /// 为一张桌台生成二维码
    pub fn create(
        &self,
        restaurant_id: &str,
        create: QrCodeCreate,
    ) -> Result<QrCodeEntry, AppError> {
        validate_required_text(restaurant_id, "restaurant_id", MAX_NAME_LEN)?;
        if create.table_number < 1 {
            return Err(AppError::validation("table_number must be >= 1"));
        }

        let entry = self.build_entry(restaurant_id, create.table_number);
        let key = keys::qr_codes_key(restaurant_id);
        self.store.append(&key, Record::QrCode(entry.clone()))?;
        self.publish_changed(&key)?;

        tracing::info!(restaurant = %restaurant_id, table = entry.table_number, "qr code created");
        Ok(entry)
    }

    /// 批量生成 (桌台 1..=count)，覆盖餐厅原有列表
    pub fn create_bulk(
        &self,
        restaurant_id: &str,
        bulk: QrCodeBulkCreate,
    ) -> Result<Vec<QrCodeEntry>, AppError> {
        validate_required_text(restaurant_id, "restaurant_id", MAX_NAME_LEN)?;
        if bulk.count < 1 || bulk.count > MAX_BULK_COUNT {
            return Err(AppError::validation(format!(
                "count must be between 1 and {MAX_BULK_COUNT}, got {}",
                bulk.count
            )));
        }

        let entries: Vec<QrCodeEntry> = (1..=bulk.count)
            .map(|table_number| self.build_entry(restaurant_id, table_number))
            .collect();

        let key = keys::qr_codes_key(restaurant_id);
        let records = entries.iter().cloned().map(Record::QrCode).collect();
        self.store.replace(&key, records, None)?;
        self.publish_changed(&key)?;

        tracing::info!(restaurant = %restaurant_id, count = entries.len(), "qr codes generated");
        Ok(entries)
    }

    /// 餐厅的全部二维码
    pub fn list(&self, restaurant_id: &str) -> Result<Vec<QrCodeEntry>, AppError> {
        validate_required_text(restaurant_id, "restaurant_id", MAX_NAME_LEN)?;
        let records = self.store.read(&keys::qr_codes_key(restaurant_id))?;
        Ok(records
            .into_iter()
            .filter_map(|stored| match stored.record {
                Record::QrCode(entry) => Some(entry),
                _ => None,
            })
            .collect())
    }

    /// 查询单个二维码
    pub fn get(&self, restaurant_id: &str, qr_id: &str) -> Result<QrCodeEntry, AppError> {
        self.list(restaurant_id)?
            .into_iter()
            .find(|entry| entry.id == qr_id)
            .ok_or_else(|| AppError::not_found(format!("QR code not found: {qr_id}")))
    }

    /// 启用 / 停用
    pub fn set_active(
        &self,
        restaurant_id: &str,
        qr_id: &str,
        active: bool,
    ) -> Result<QrCodeEntry, AppError> {
        self.mutate_entry(restaurant_id, qr_id, |entry| {
            entry.active = active;
        })
    }

    /// 刷新令牌
    ///
    /// Issues a fresh token and rebuilds the encoded URL; the printed
    /// code must be reprinted afterwards.
    pub fn refresh_token(&self, restaurant_id: &str, qr_id: &str) -> Result<QrCodeEntry, AppError> {
        self.mutate_entry(restaurant_id, qr_id, |entry| {
            entry.rotate_token();
            let target = self.target_url(&entry.restaurant_id, entry.table_number, &entry.token);
            entry.qr_image_url = self.image_url(&target);
        })
    }

    /// 删除二维码
    pub fn remove(&self, restaurant_id: &str, qr_id: &str) -> Result<(), AppError> {
        validate_required_text(restaurant_id, "restaurant_id", MAX_NAME_LEN)?;
        let key = keys::qr_codes_key(restaurant_id);

        let (removed, _revision) = self.store.update(&key, |records| {
            let before = records.len();
            records.retain(|stored| match &stored.record {
                Record::QrCode(entry) => entry.id != qr_id,
                _ => true,
            });
            before != records.len()
        })?;

        if !removed {
            return Err(AppError::not_found(format!("QR code not found: {qr_id}")));
        }
        self.publish_changed(&key)?;
        Ok(())
    }

    /// 记录一次扫码
    ///
    /// A disabled code scans as INACTIVE, an aged-out token as EXPIRED;
    /// only VALID scans count and carry a menu URL.
    pub fn record_scan(
        &self,
        restaurant_id: &str,
        scan: QrCodeScan,
    ) -> Result<ScanReceipt, AppError> {
        validate_required_text(restaurant_id, "restaurant_id", MAX_NAME_LEN)?;
        let key = keys::qr_codes_key(restaurant_id);
        let now = util::now_millis();

        let (scanned, _revision) = self.store.update(&key, |records| {
            for stored in records.iter_mut() {
                if let Record::QrCode(entry) = &mut stored.record
                    && entry.token == scan.token
                {
                    if !entry.active {
                        return Some((ScanOutcome::Inactive, entry.clone()));
                    }
                    if !entry.token_valid_at(now) {
                        return Some((ScanOutcome::Expired, entry.clone()));
                    }
                    entry.scan_count += 1;
                    entry.last_scanned_at = Some(now);
                    return Some((ScanOutcome::Valid, entry.clone()));
                }
            }
            None
        })?;

        match scanned {
            Some((outcome, entry)) => {
                let menu_url = if outcome == ScanOutcome::Valid {
                    self.publish_changed(&key)?;
                    Some(self.target_url(&entry.restaurant_id, entry.table_number, &entry.token))
                } else {
                    None
                };
                tracing::debug!(restaurant = %restaurant_id, ?outcome, "qr scan recorded");
                Ok(ScanReceipt { outcome, menu_url })
            }
            None => Err(AppError::not_found("QR token not found".to_string())),
        }
    }

    fn mutate_entry<F>(
        &self,
        restaurant_id: &str,
        qr_id: &str,
        mutate: F,
    ) -> Result<QrCodeEntry, AppError>
    where
        F: FnOnce(&mut QrCodeEntry),
    {
        validate_required_text(restaurant_id, "restaurant_id", MAX_NAME_LEN)?;
        let key = keys::qr_codes_key(restaurant_id);

        let (updated, _revision) = self.store.update(&key, |records| {
            for stored in records.iter_mut() {
                if let Record::QrCode(entry) = &mut stored.record
                    && entry.id == qr_id
                {
                    mutate(entry);
                    return Some(entry.clone());
                }
            }
            None
        })?;

        match updated {
            Some(entry) => {
                self.publish_changed(&key)?;
                Ok(entry)
            }
            None => Err(AppError::not_found(format!("QR code not found: {qr_id}"))),
        }
    }

    fn publish_changed(&self, key: &str) -> Result<(), AppError> {
        let event =
            RelayEvent::from_payload(RelayEventKind::MailboxChanged, &json!({ "key": key }))?;
        self.hub.publish(event);
        Ok(())
    }
}
