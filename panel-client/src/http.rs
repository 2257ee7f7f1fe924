//! HTTP client for relay server API calls

use crate::{ClientConfig, ClientError, ClientResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use shared::records::{
    Call, CallCreate, CallResolve, ItemStatus, ItemStatusUpdate, MarkRead, MarkReadResult,
    Notification, NotificationCreate, Order, OrderCreate, OrderStatus, OrderStatusUpdate,
    PaymentCreate, PaymentRecord, QrCodeBulkCreate, QrCodeCreate, QrCodeEntry, QrCodeScan,
    QrCodeSetActive, Record, ScanOutcome, StoredRecord,
};
use shared::response::ApiResponse;

// ========== Response shapes ==========

/// 信箱快照
///
/// `revision` 是后续 CAS 写入要回传的版本号。
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxSnapshot {
    pub key: String,
    pub revision: u64,
    pub records: Vec<StoredRecord>,
}

/// CAS 替换结果
#[derive(Debug, Clone, Deserialize)]
struct ReplaceResponse {
    revision: u64,
}

/// 对账视图
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSummary {
    pub order_id: String,
    pub order_total: f64,
    pub paid_total: f64,
    pub remaining: f64,
    pub settled: bool,
    pub payments: Vec<PaymentRecord>,
}

/// 扫码结果
#[derive(Debug, Clone, Deserialize)]
pub struct ScanReceipt {
    pub outcome: ScanOutcome,
    /// 仅在 outcome 为 VALID 时返回
    #[serde(default)]
    pub menu_url: Option<String>,
}

// ========== Client ==========

/// HTTP client for making network requests to the relay server
#[derive(Debug, Clone)]
pub struct PanelHttp {
    client: Client,
    base_url: String,
}

impl PanelHttp {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    /// Server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request without body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.put(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Make a DELETE request
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.delete(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    ///
    /// 错误状态下服务器同样返回统一信封，把 `message` 提出来作为错误文本。
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            let message = serde_json::from_str::<ApiResponse<()>>(&text)
                .map(|envelope| envelope.message)
                .unwrap_or(text);
            return match status {
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(message)),
                StatusCode::CONFLICT => Err(ClientError::Conflict(message)),
                StatusCode::BAD_REQUEST => Err(ClientError::Validation(message)),
                StatusCode::UNPROCESSABLE_ENTITY => Err(ClientError::BusinessRule(message)),
                _ => Err(ClientError::Internal(message)),
            };
        }

        response.json().await.map_err(Into::into)
    }

    fn unwrap_data<T>(envelope: ApiResponse<T>) -> ClientResult<T> {
        envelope.into_data().map_err(ClientError::InvalidResponse)
    }

    // ========== Mailbox API ==========

    /// List all mailbox keys that have been written to
    pub async fn mailbox_keys(&self) -> ClientResult<Vec<String>> {
        let envelope = self.get::<ApiResponse<Vec<String>>>("/api/mailbox").await?;
        Self::unwrap_data(envelope)
    }

    /// Read a full mailbox
    pub async fn read_mailbox(&self, key: &str) -> ClientResult<MailboxSnapshot> {
        let envelope = self
            .get::<ApiResponse<MailboxSnapshot>>(&format!("/api/mailbox/{key}"))
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Read records appended after `since_seq` (incremental poll)
    pub async fn read_mailbox_since(
        &self,
        key: &str,
        since_seq: u64,
    ) -> ClientResult<MailboxSnapshot> {
        let envelope = self
            .get::<ApiResponse<MailboxSnapshot>>(&format!(
                "/api/mailbox/{key}?since_seq={since_seq}"
            ))
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Append one record to a mailbox
    pub async fn append_record(&self, key: &str, record: &Record) -> ClientResult<StoredRecord> {
        let envelope = self
            .post::<ApiResponse<StoredRecord>, _>(&format!("/api/mailbox/{key}"), record)
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Replace a whole mailbox, guarded by the expected revision
    ///
    /// `expected_revision` 为 None 时无条件覆盖。版本不匹配返回
    /// [`ClientError::Conflict`]，调用方应重读后重试。
    pub async fn replace_mailbox(
        &self,
        key: &str,
        records: Vec<Record>,
        expected_revision: Option<u64>,
    ) -> ClientResult<u64> {
        #[derive(serde::Serialize)]
        struct ReplaceRequest {
            expected_revision: Option<u64>,
            records: Vec<Record>,
        }

        let request = ReplaceRequest {
            expected_revision,
            records,
        };

        let envelope = self
            .put::<ApiResponse<ReplaceResponse>, _>(&format!("/api/mailbox/{key}"), &request)
            .await?;
        Ok(Self::unwrap_data(envelope)?.revision)
    }

    // ========== Call API ==========

    /// Active service calls
    pub async fn active_calls(&self) -> ClientResult<Vec<Call>> {
        let envelope = self.get::<ApiResponse<Vec<Call>>>("/api/calls").await?;
        Self::unwrap_data(envelope)
    }

    /// Open a new call (bill, water, waiter, cleaning)
    pub async fn open_call(&self, create: &CallCreate) -> ClientResult<Call> {
        let envelope = self
            .post::<ApiResponse<Call>, _>("/api/calls", create)
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Resolved calls, newest first
    pub async fn call_history(&self) -> ClientResult<Vec<Call>> {
        let envelope = self
            .get::<ApiResponse<Vec<Call>>>("/api/calls/history")
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Resolve an active call
    pub async fn resolve_call(&self, call_id: &str, resolve: &CallResolve) -> ClientResult<Call> {
        let envelope = self
            .post::<ApiResponse<Call>, _>(&format!("/api/calls/{call_id}/resolve"), resolve)
            .await?;
        Self::unwrap_data(envelope)
    }

    // ========== Order API ==========

    /// Snapshot of orders not yet in a terminal status
    pub async fn active_orders(&self) -> ClientResult<Vec<Order>> {
        let envelope = self.get::<ApiResponse<Vec<Order>>>("/api/orders").await?;
        Self::unwrap_data(envelope)
    }

    /// Place a new order
    pub async fn place_order(&self, create: &OrderCreate) -> ClientResult<Order> {
        let envelope = self
            .post::<ApiResponse<Order>, _>("/api/orders", create)
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Fetch one order by id
    pub async fn get_order(&self, order_id: &str) -> ClientResult<Order> {
        let envelope = self
            .get::<ApiResponse<Order>>(&format!("/api/orders/{order_id}"))
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Update an order's status
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> ClientResult<Order> {
        let body = OrderStatusUpdate { status };
        let envelope = self
            .put::<ApiResponse<Order>, _>(&format!("/api/orders/{order_id}/status"), &body)
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Update one item's status inside an order
    pub async fn update_item_status(
        &self,
        order_id: &str,
        item_index: usize,
        status: ItemStatus,
    ) -> ClientResult<Order> {
        let body = ItemStatusUpdate { status };
        let envelope = self
            .put::<ApiResponse<Order>, _>(
                &format!("/api/orders/{order_id}/items/{item_index}/status"),
                &body,
            )
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Reconciliation view: payments against the order total
    pub async fn order_payments(&self, order_id: &str) -> ClientResult<PaymentSummary> {
        let envelope = self
            .get::<ApiResponse<PaymentSummary>>(&format!("/api/orders/{order_id}/payments"))
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Record a payment against an order
    pub async fn record_payment(
        &self,
        order_id: &str,
        create: &PaymentCreate,
    ) -> ClientResult<PaymentRecord> {
        let envelope = self
            .post::<ApiResponse<PaymentRecord>, _>(
                &format!("/api/orders/{order_id}/payments"),
                create,
            )
            .await?;
        Self::unwrap_data(envelope)
    }

    // ========== Notification API ==========

    /// Notifications in a mailbox; `unread_only` filters out read ones
    pub async fn notifications(
        &self,
        key: &str,
        unread_only: bool,
    ) -> ClientResult<Vec<Notification>> {
        let path = if unread_only {
            format!("/api/notifications/{key}?unread=true")
        } else {
            format!("/api/notifications/{key}")
        };
        let envelope = self.get::<ApiResponse<Vec<Notification>>>(&path).await?;
        Self::unwrap_data(envelope)
    }

    /// Post a notification into a mailbox
    pub async fn post_notification(
        &self,
        key: &str,
        create: &NotificationCreate,
    ) -> ClientResult<Notification> {
        let envelope = self
            .post::<ApiResponse<Notification>, _>(&format!("/api/notifications/{key}"), create)
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Mark notifications read; the result counts only real flips
    pub async fn mark_read(&self, key: &str, mark: &MarkRead) -> ClientResult<MarkReadResult> {
        let envelope = self
            .post::<ApiResponse<MarkReadResult>, _>(&format!("/api/notifications/{key}/read"), mark)
            .await?;
        Self::unwrap_data(envelope)
    }

    // ========== QR API ==========

    /// All QR codes of a restaurant
    pub async fn qr_codes(&self, restaurant_id: &str) -> ClientResult<Vec<QrCodeEntry>> {
        let envelope = self
            .get::<ApiResponse<Vec<QrCodeEntry>>>(&format!("/api/qr/{restaurant_id}"))
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Create one QR code for a table
    pub async fn create_qr_code(
        &self,
        restaurant_id: &str,
        table_number: i32,
    ) -> ClientResult<QrCodeEntry> {
        let body = QrCodeCreate { table_number };
        let envelope = self
            .post::<ApiResponse<QrCodeEntry>, _>(&format!("/api/qr/{restaurant_id}"), &body)
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Bulk mode: regenerate codes for tables 1..=count
    pub async fn create_qr_codes_bulk(
        &self,
        restaurant_id: &str,
        count: i32,
    ) -> ClientResult<Vec<QrCodeEntry>> {
        let body = QrCodeBulkCreate { count };
        let envelope = self
            .post::<ApiResponse<Vec<QrCodeEntry>>, _>(
                &format!("/api/qr/{restaurant_id}/bulk"),
                &body,
            )
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Validate a scanned token and count the visit
    pub async fn scan_qr(&self, restaurant_id: &str, token: &str) -> ClientResult<ScanReceipt> {
        let body = QrCodeScan {
            token: token.to_string(),
        };
        let envelope = self
            .post::<ApiResponse<ScanReceipt>, _>(&format!("/api/qr/{restaurant_id}/scan"), &body)
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Enable or disable a QR code
    pub async fn set_qr_active(
        &self,
        restaurant_id: &str,
        id: &str,
        active: bool,
    ) -> ClientResult<QrCodeEntry> {
        let body = QrCodeSetActive { active };
        let envelope = self
            .put::<ApiResponse<QrCodeEntry>, _>(
                &format!("/api/qr/{restaurant_id}/{id}/active"),
                &body,
            )
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Rotate a code's token, invalidating printed copies
    pub async fn refresh_qr_token(
        &self,
        restaurant_id: &str,
        id: &str,
    ) -> ClientResult<QrCodeEntry> {
        let envelope = self
            .post_empty::<ApiResponse<QrCodeEntry>>(&format!(
                "/api/qr/{restaurant_id}/{id}/refresh"
            ))
            .await?;
        Self::unwrap_data(envelope)
    }

    /// Delete a QR code
    pub async fn remove_qr_code(&self, restaurant_id: &str, id: &str) -> ClientResult<bool> {
        let envelope = self
            .delete::<ApiResponse<bool>>(&format!("/api/qr/{restaurant_id}/{id}"))
            .await?;
        Self::unwrap_data(envelope)
    }
}
