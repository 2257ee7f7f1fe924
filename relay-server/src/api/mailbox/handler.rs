//! Mailbox API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use shared::records::{Record, StoredRecord};
use shared::relay::{RelayEvent, RelayEventKind};
use shared::response::ApiResponse;

use crate::core::ServerState;
use crate::utils::{AppResult, ok};

/// 信箱快照
///
/// `revision` 是后续 CAS 写入 (PUT) 要回传的版本号。
#[derive(Serialize)]
pub struct MailboxSnapshot {
    pub key: String,
    pub revision: u64,
    pub records: Vec<StoredRecord>,
}

/// 读取参数
#[derive(Deserialize)]
pub struct ReadQuery {
    /// 只要这个序号之后的记录 (增量轮询)
    pub since_seq: Option<u64>,
}

/// CAS 替换请求
#[derive(Deserialize)]
pub struct ReplaceRequest {
    /// 期望的当前版本；不给则无条件覆盖
    pub expected_revision: Option<u64>,
    pub records: Vec<Record>,
}

/// 替换结果
#[derive(Serialize)]
pub struct ReplaceResponse {
    pub revision: u64,
}

/// GET /api/mailbox - 列出所有已写入过的信箱
pub async fn list_keys(
    State(state): State<ServerState>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let keys = state.store.keys()?;
    Ok(ok(keys))
}

/// GET /api/mailbox/:key - 读取信箱 (可增量)
pub async fn read(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Query(query): Query<ReadQuery>,
) -> AppResult<Json<ApiResponse<MailboxSnapshot>>> {
    let records = match query.since_seq {
        Some(since) => state.store.read_since(&key, since)?,
        None => state.store.read(&key)?,
    };
    let revision = state.store.revision(&key)?;

    Ok(ok(MailboxSnapshot {
        key,
        revision,
        records,
    }))
}

/// POST /api/mailbox/:key - 追加一条记录
pub async fn append(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(record): Json<Record>,
) -> AppResult<Json<ApiResponse<StoredRecord>>> {
    let stored = state.store.append(&key, record)?;
    publish_changed(&state, &key)?;
    Ok(ok(stored))
}

/// PUT /api/mailbox/:key - CAS 替换整个信箱
pub async fn replace(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(request): Json<ReplaceRequest>,
) -> AppResult<Json<ApiResponse<ReplaceResponse>>> {
    let revision = state
        .store
        .replace(&key, request.records, request.expected_revision)?;
    publish_changed(&state, &key)?;
    Ok(ok(ReplaceResponse { revision }))
}

fn publish_changed(state: &ServerState, key: &str) -> AppResult<()> {
    let event = RelayEvent::from_payload(RelayEventKind::MailboxChanged, &json!({ "key": key }))?;
    state.hub.publish(event);
    Ok(())
}
