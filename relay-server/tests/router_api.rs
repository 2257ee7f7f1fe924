//! 路由层集成测试
//!
//! 通过 OneshotRouter 在进程内驱动完整路由，覆盖信箱读写、
//! 订单状态流转、呼叫生命周期、通知已读和二维码批量生成。

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};

use relay_server::api::router_ext::OneshotRouter;
use relay_server::api::build_app;
use relay_server::{Config, ServerState};
use shared::keys;
use shared::records::{Call, CallKind, Record};

/// 测试用路由 + 状态，工作目录落在临时目录里
struct TestApp {
    _dir: tempfile::TempDir,
    state: ServerState,
    router: Router<ServerState>,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_overrides(dir.path().to_string_lossy().into_owned(), 0);
        let state = ServerState::initialize(&config).unwrap();
        Self {
            _dir: dir,
            state,
            router: build_app(),
        }
    }

    async fn request(
        &mut self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => builder
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.oneshot(&self.state, request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&mut self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    async fn post(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    async fn put(&mut self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(body)).await
    }
}

/// 下一份两菜订单，返回订单 JSON
async fn place_order(app: &mut TestApp, table_number: i32) -> Value {
    let (status, body) = app
        .post(
            "/api/orders",
            json!({
                "table_number": table_number,
                "items": [
                    {"name": "Spring rolls", "price": 6.5, "quantity": 2},
                    {"name": "Pad thai", "price": 12.0, "quantity": 1}
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    body["data"].clone()
}

// ========== 健康检查 ==========

#[tokio::test]
async fn test_health_reports_healthy() {
    let mut app = TestApp::new();

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));

    let (status, body) = app.get("/health/detailed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["storage"]["status"], json!("ok"));
}

// ========== 信箱 ==========

#[tokio::test]
async fn test_mailbox_append_then_read_round_trip() {
    let mut app = TestApp::new();

    let call = Record::Call(Call::new(7, CallKind::Bill, Some("check please".to_string())));
    let (status, body) = app
        .post(
            &format!("/api/mailbox/{}", keys::WAITER_CALLS),
            serde_json::to_value(&call).unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let seq = body["data"]["seq"].as_u64().unwrap();
    assert!(seq >= 1);

    let (status, body) = app
        .get(&format!("/api/mailbox/{}", keys::WAITER_CALLS))
        .await;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["seq"].as_u64().unwrap(), seq);
    assert_eq!(records[0]["record"]["record_kind"], json!("CALL"));
    assert_eq!(records[0]["record"]["id"], json!(call.id()));
    assert_eq!(body["data"]["revision"].as_u64().unwrap(), 1);
}

#[tokio::test]
async fn test_mailbox_rejects_invalid_record() {
    let mut app = TestApp::new();

    // table_number 0 过不了存储边界校验
    let mut call = Call::new(1, CallKind::Water, None);
    call.table_number = 0;
    let (status, body) = app
        .post(
            &format!("/api/mailbox/{}", keys::WAITER_CALLS),
            serde_json::to_value(Record::Call(call)).unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_mailbox_replace_rejects_stale_revision() {
    let mut app = TestApp::new();

    let call = Record::Call(Call::new(3, CallKind::Waiter, None));
    app.post(
        &format!("/api/mailbox/{}", keys::WAITER_CALLS),
        serde_json::to_value(&call).unwrap(),
    )
    .await;

    // 版本 0 已经过期（追加把版本推到了 1）
    let (status, body) = app
        .put(
            &format!("/api/mailbox/{}", keys::WAITER_CALLS),
            json!({"expected_revision": 0, "records": []}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));

    // 冲突的写入不能改动信箱
    let (_, body) = app
        .get(&format!("/api/mailbox/{}", keys::WAITER_CALLS))
        .await;
    assert_eq!(body["data"]["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["revision"].as_u64().unwrap(), 1);
}

#[tokio::test]
async fn test_mailbox_replace_with_matching_revision() {
    let mut app = TestApp::new();

    let call = Record::Call(Call::new(3, CallKind::Clean, None));
    app.post(
        &format!("/api/mailbox/{}", keys::WAITER_CALLS),
        serde_json::to_value(&call).unwrap(),
    )
    .await;

    let (status, body) = app
        .put(
            &format!("/api/mailbox/{}", keys::WAITER_CALLS),
            json!({"expected_revision": 1, "records": []}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revision"].as_u64().unwrap(), 2);

    let (_, body) = app
        .get(&format!("/api/mailbox/{}", keys::WAITER_CALLS))
        .await;
    assert!(body["data"]["records"].as_array().unwrap().is_empty());
}

// ========== 订单看板 ==========

#[tokio::test]
async fn test_update_status_touches_only_status_field() {
    let mut app = TestApp::new();
    let order = place_order(&mut app, 4).await;
    let id = order["id"].as_str().unwrap();

    let (status, body) = app
        .put(&format!("/api/orders/{id}/status"), json!({"status": "READY"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let updated = &body["data"];
    assert_eq!(updated["status"], json!("READY"));
    // 菜品原样不动
    assert_eq!(updated["items"], order["items"]);
    assert_eq!(updated["total_amount"], order["total_amount"]);
    assert_eq!(updated["table_number"], order["table_number"]);
}

#[tokio::test]
async fn test_unknown_order_id_is_not_found() {
    let mut app = TestApp::new();

    let (status, body) = app
        .put("/api/orders/no-such-order/status", json!({"status": "READY"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_backward_transition_is_rejected() {
    let mut app = TestApp::new();
    let order = place_order(&mut app, 5).await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .put(&format!("/api/orders/{id}/status"), json!({"status": "SERVED"}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(&format!("/api/orders/{id}/status"), json!({"status": "READY"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_all_items_ready_advances_order() {
    let mut app = TestApp::new();
    let order = place_order(&mut app, 6).await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(
            &format!("/api/orders/{id}/items/0/status"),
            json!({"status": "READY"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // 还有一道菜在做，订单整体不动
    assert_eq!(body["data"]["status"], json!("PREPARING"));

    let (_, body) = app
        .put(
            &format!("/api/orders/{id}/items/1/status"),
            json!({"status": "READY"}),
        )
        .await;
    assert_eq!(body["data"]["status"], json!("READY"));
}

#[tokio::test]
async fn test_item_index_out_of_range() {
    let mut app = TestApp::new();
    let order = place_order(&mut app, 2).await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = app
        .put(
            &format!("/api/orders/{id}/items/9/status"),
            json!({"status": "READY"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_reconciliation_and_settlement() {
    let mut app = TestApp::new();
    // 2 × 6.5 + 12.0 = 25.0
    let order = place_order(&mut app, 9).await;
    let id = order["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            &format!("/api/orders/{id}/payments"),
            json!({"amount": 20.0, "method": "CASH", "cashier": "mei"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // 超出剩余 5.0 的付款被拒
    let (status, body) = app
        .post(
            &format!("/api/orders/{id}/payments"),
            json!({"amount": 10.0, "method": "CARD"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], json!(false));

    // 补齐后订单结清
    let (status, _) = app
        .post(
            &format!("/api/orders/{id}/payments"),
            json!({"amount": 5.0, "method": "CARD"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/api/orders/{id}/payments")).await;
    let summary = &body["data"];
    assert_eq!(summary["paid_total"].as_f64().unwrap(), 25.0);
    assert_eq!(summary["remaining"].as_f64().unwrap(), 0.0);
    assert_eq!(summary["settled"], json!(true));
    assert_eq!(summary["payments"].as_array().unwrap().len(), 2);

    let (_, body) = app.get(&format!("/api/orders/{id}")).await;
    assert_eq!(body["data"]["status"], json!("PAID"));
}

// ========== 呼叫 ==========

#[tokio::test]
async fn test_call_lifecycle_active_to_resolved() {
    let mut app = TestApp::new();

    let (status, body) = app
        .post("/api/calls", json!({"table_number": 7, "kind": "BILL"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let call_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.get("/api/calls").await;
    let active = body["data"].as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["table_number"], json!(7));
    assert_eq!(active[0]["status"], json!("ACTIVE"));

    let (status, body) = app
        .post(
            &format!("/api/calls/{call_id}/resolve"),
            json!({"resolved_by": "anna"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("RESOLVED"));

    // 解决后从活跃列表消失，进入历史
    let (_, body) = app.get("/api/calls").await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/api/calls/history").await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], json!(call_id));
    assert_eq!(history[0]["status"], json!("RESOLVED"));
    assert_eq!(history[0]["resolved_by"], json!("anna"));
}

#[tokio::test]
async fn test_resolve_unknown_call_is_not_found() {
    let mut app = TestApp::new();

    let (status, _) = app
        .post("/api/calls/no-such-call/resolve", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_call_validation_rejects_bad_table() {
    let mut app = TestApp::new();

    let (status, body) = app
        .post("/api/calls", json!({"table_number": 0, "kind": "WATER"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

// ========== 通知 ==========

#[tokio::test]
async fn test_notification_mark_read_counts_real_flips() {
    let mut app = TestApp::new();
    let uri = format!("/api/notifications/{}", keys::CASHIER_NOTIFICATIONS);

    let (_, body) = app
        .post(
            &uri,
            json!({"kind": "bill_request", "table_number": 7, "message": "Table 7 wants the bill"}),
        )
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.get(&format!("{uri}?unread=true")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .post(&format!("{uri}/read"), json!({"ids": [id.clone()]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["marked"].as_u64().unwrap(), 1);

    // 再标一次不再翻转
    let (_, body) = app.post(&format!("{uri}/read"), json!({"ids": [id]})).await;
    assert_eq!(body["data"]["marked"].as_u64().unwrap(), 0);

    let (_, body) = app.get(&format!("{uri}?unread=true")).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

// ========== 二维码 ==========

#[tokio::test]
async fn test_bulk_qr_creates_distinct_entries() {
    let mut app = TestApp::new();

    let (status, body) = app.post("/api/qr/rest-1/bulk", json!({"count": 5})).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 5);

    let mut tables: Vec<i64> = entries
        .iter()
        .map(|e| e["table_number"].as_i64().unwrap())
        .collect();
    tables.sort_unstable();
    assert_eq!(tables, vec![1, 2, 3, 4, 5]);

    let mut tokens: Vec<&str> = entries
        .iter()
        .map(|e| e["token"].as_str().unwrap())
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    assert_eq!(tokens.len(), 5);
}

#[tokio::test]
async fn test_qr_scan_counts_and_respects_active_flag() {
    let mut app = TestApp::new();

    let (_, body) = app.post("/api/qr/rest-1", json!({"table_number": 3})).await;
    let entry = body["data"].clone();
    let id = entry["id"].as_str().unwrap().to_string();
    let token = entry["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/api/qr/rest-1/scan", json!({"token": token}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], json!("VALID"));
    assert!(body["data"]["menu_url"].as_str().unwrap().contains(&token));

    // 停用后扫码拦下，计数不动
    app.put(&format!("/api/qr/rest-1/{id}/active"), json!({"active": false}))
        .await;
    let (_, body) = app
        .post("/api/qr/rest-1/scan", json!({"token": token}))
        .await;
    assert_eq!(body["data"]["outcome"], json!("INACTIVE"));

    let (_, body) = app.get(&format!("/api/qr/rest-1/{id}")).await;
    assert_eq!(body["data"]["scan_count"].as_u64().unwrap(), 1);
}

#[tokio::test]
async fn test_qr_refresh_invalidates_old_token() {
    let mut app = TestApp::new();

    let (_, body) = app.post("/api/qr/rest-1", json!({"table_number": 1})).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let old_token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(&format!("/api/qr/rest-1/{id}/refresh"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_token = body["data"]["token"].as_str().unwrap().to_string();
    assert_ne!(new_token, old_token);

    // 旧打印件上的 token 已经作废
    let (status, _) = app
        .post("/api/qr/rest-1/scan", json!({"token": old_token}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/api/qr/rest-1/scan", json!({"token": new_token}))
        .await;
    assert_eq!(status, StatusCode::OK);
}
