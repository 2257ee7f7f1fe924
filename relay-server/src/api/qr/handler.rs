//! QR Code API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use shared::records::{QrCodeBulkCreate, QrCodeCreate, QrCodeEntry, QrCodeScan, QrCodeSetActive};
use shared::response::ApiResponse;

use crate::core::ServerState;
use crate::services::qr::ScanReceipt;
use crate::utils::{AppResult, ok, ok_with_message};

/// GET /api/qr/:restaurant_id - 餐厅的全部二维码
pub async fn list(
    State(state): State<ServerState>,
    Path(restaurant_id): Path<String>,
) -> AppResult<Json<ApiResponse<Vec<QrCodeEntry>>>> {
    let entries = state.qr.list(&restaurant_id)?;
    Ok(ok(entries))
}

/// POST /api/qr/:restaurant_id - 为一张桌台生成二维码
pub async fn create(
    State(state): State<ServerState>,
    Path(restaurant_id): Path<String>,
    Json(payload): Json<QrCodeCreate>,
) -> AppResult<Json<ApiResponse<QrCodeEntry>>> {
    payload.validate()?;
    let entry = state.qr.create(&restaurant_id, payload)?;
    Ok(ok(entry))
}

/// POST /api/qr/:restaurant_id/bulk - 批量生成 (覆盖原有列表)
pub async fn create_bulk(
    State(state): State<ServerState>,
    Path(restaurant_id): Path<String>,
    Json(payload): Json<QrCodeBulkCreate>,
) -> AppResult<Json<ApiResponse<Vec<QrCodeEntry>>>> {
    payload.validate()?;
    let entries = state.qr.create_bulk(&restaurant_id, payload)?;
    let count = entries.len();
    Ok(ok_with_message(
        entries,
        format!("Generated {count} QR codes"),
    ))
}

/// POST /api/qr/:restaurant_id/scan - 记录一次扫码
pub async fn scan(
    State(state): State<ServerState>,
    Path(restaurant_id): Path<String>,
    Json(payload): Json<QrCodeScan>,
) -> AppResult<Json<ApiResponse<ScanReceipt>>> {
    payload.validate()?;
    let receipt = state.qr.record_scan(&restaurant_id, payload)?;
    Ok(ok(receipt))
}

/// GET /api/qr/:restaurant_id/:id - 查询单个二维码
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path((restaurant_id, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<QrCodeEntry>>> {
    let entry = state.qr.get(&restaurant_id, &id)?;
    Ok(ok(entry))
}

/// DELETE /api/qr/:restaurant_id/:id - 删除二维码
pub async fn remove(
    State(state): State<ServerState>,
    Path((restaurant_id, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<bool>>> {
    state.qr.remove(&restaurant_id, &id)?;
    Ok(ok(true))
}

/// PUT /api/qr/:restaurant_id/:id/active - 启用 / 停用
pub async fn set_active(
    State(state): State<ServerState>,
    Path((restaurant_id, id)): Path<(String, String)>,
    Json(payload): Json<QrCodeSetActive>,
) -> AppResult<Json<ApiResponse<QrCodeEntry>>> {
    let entry = state.qr.set_active(&restaurant_id, &id, payload.active)?;
    Ok(ok(entry))
}

/// POST /api/qr/:restaurant_id/:id/refresh - 刷新令牌
pub async fn refresh_token(
    State(state): State<ServerState>,
    Path((restaurant_id, id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<QrCodeEntry>>> {
    let entry = state.qr.refresh_token(&restaurant_id, &id)?;
    Ok(ok(entry))
}
