//! Notification API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use validator::Validate;

use shared::records::{MarkRead, MarkReadResult, Notification, NotificationCreate};
use shared::response::ApiResponse;

use crate::core::ServerState;
use crate::utils::{AppResult, ok};

/// 列表参数
#[derive(Deserialize)]
pub struct ListQuery {
    /// 只要未读的
    #[serde(default)]
    pub unread: bool,
}

/// GET /api/notifications/:key - 读取某个通知信箱
pub async fn list(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Notification>>>> {
    let notifications = if query.unread {
        state.notifications.unread(&key)?
    } else {
        state.notifications.all(&key)?
    };
    Ok(ok(notifications))
}

/// POST /api/notifications/:key - 投递一条通知
pub async fn post_one(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(payload): Json<NotificationCreate>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    payload.validate()?;
    let notification = state.notifications.post(&key, payload)?;
    Ok(ok(notification))
}

/// POST /api/notifications/:key/read - 标记已读
///
/// 不带 ids 时标记全部未读。计数只含真正翻转的条目，
/// 并发标记同一批 ids 时两边的计数加起来不会超。
pub async fn mark_read(
    State(state): State<ServerState>,
    Path(key): Path<String>,
    Json(payload): Json<MarkRead>,
) -> AppResult<Json<ApiResponse<MarkReadResult>>> {
    let result = state.notifications.mark_read(&key, payload)?;
    Ok(ok(result))
}
