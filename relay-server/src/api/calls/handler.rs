//! Waiter Call API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use shared::records::{Call, CallCreate, CallResolve};
use shared::response::ApiResponse;

use crate::core::ServerState;
use crate::utils::{AppResult, ok};

/// GET /api/calls - 当前待处理的呼叫
pub async fn list_active(
    State(state): State<ServerState>,
) -> AppResult<Json<ApiResponse<Vec<Call>>>> {
    let calls = state.calls.active()?;
    Ok(ok(calls))
}

/// POST /api/calls - 顾客发起呼叫
pub async fn open(
    State(state): State<ServerState>,
    Json(payload): Json<CallCreate>,
) -> AppResult<Json<ApiResponse<Call>>> {
    payload.validate()?;
    let call = state.calls.open(payload)?;
    Ok(ok(call))
}

/// GET /api/calls/history - 已解决的呼叫
pub async fn history(
    State(state): State<ServerState>,
) -> AppResult<Json<ApiResponse<Vec<Call>>>> {
    let calls = state.calls.history()?;
    Ok(ok(calls))
}

/// POST /api/calls/:id/resolve - 服务员解决呼叫
pub async fn resolve(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<CallResolve>,
) -> AppResult<Json<ApiResponse<Call>>> {
    let call = state.calls.resolve(&id, payload)?;
    Ok(ok(call))
}
