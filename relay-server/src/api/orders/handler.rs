//! Order Board API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use validator::Validate;

use shared::records::{
    ItemStatusUpdate, Order, OrderCreate, OrderStatusUpdate, PaymentCreate, PaymentRecord,
    settles_total,
};
use shared::response::ApiResponse;

use crate::core::ServerState;
use crate::utils::{AppResult, ok};

/// 对账视图
///
/// `remaining` 可能因浮点容差出现极小的负值，按 0 处理。
#[derive(Serialize)]
pub struct PaymentSummary {
    pub order_id: String,
    pub order_total: f64,
    pub paid_total: f64,
    pub remaining: f64,
    pub settled: bool,
    pub payments: Vec<PaymentRecord>,
}

/// GET /api/orders - 当前活跃订单快照
pub async fn list_active(
    State(state): State<ServerState>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    Ok(ok(state.board.active_orders()))
}

/// POST /api/orders - 下单
pub async fn place(
    State(state): State<ServerState>,
    Json(payload): Json<OrderCreate>,
) -> AppResult<Json<ApiResponse<Order>>> {
    payload.validate()?;
    let order = state.board.place(payload)?;
    Ok(ok(order))
}

/// GET /api/orders/:id - 获取单个订单
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.board.get(&id)?;
    Ok(ok(order))
}

/// PUT /api/orders/:id/status - 更新订单状态
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderStatusUpdate>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.board.update_status(&id, payload.status)?;
    Ok(ok(order))
}

/// PUT /api/orders/:id/items/:index/status - 更新菜品状态
pub async fn update_item_status(
    State(state): State<ServerState>,
    Path((id, index)): Path<(String, usize)>,
    Json(payload): Json<ItemStatusUpdate>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let order = state.board.update_item_status(&id, index, payload.status)?;
    Ok(ok(order))
}

/// GET /api/orders/:id/payments - 对账视图
pub async fn payments(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<PaymentSummary>>> {
    let order = state.board.get(&id)?;
    let payments = state.board.payments_for(&id)?;
    let paid_total = payments.iter().map(|p| p.amount).sum::<f64>();
    let remaining = (order.total_amount - paid_total).max(0.0);

    Ok(ok(PaymentSummary {
        order_id: order.id,
        order_total: order.total_amount,
        paid_total,
        remaining,
        settled: settles_total(paid_total, order.total_amount),
        payments,
    }))
}

/// POST /api/orders/:id/payments - 记录收款
pub async fn record_payment(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<PaymentCreate>,
) -> AppResult<Json<ApiResponse<PaymentRecord>>> {
    payload.validate()?;
    let (_order, payment) = state.board.record_payment(&id, payload)?;
    Ok(ok(payment))
}
