//! 面板端到端测试
//!
//! 在真实 TCP 端口上跑中继服务器，用 panel-client 走完整链路：
//! 顾客发起账单呼叫 → 服务员面板轮询看到 → 解决 → 归档历史；
//! 以及 SSE 推送、断点续传和轮询器自动标记已读。

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use panel_client::{
    ClientConfig, EventChannel, EventStream, PanelHttp, Poller, StreamItem, WaiterPanel,
};
use relay_server::{Config, ServerState};
use shared::keys;
use shared::records::{
    CallCreate, CallKind, CallResolve, CallStatus, NotificationCreate, NotificationKind,
    OrderCreate, OrderItemCreate,
};
use shared::relay::RelayEventKind;

/// 把中继服务器挂到 127.0.0.1 的随机端口上
async fn spawn_relay() -> (tempfile::TempDir, ServerState, SocketAddr) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_overrides(dir.path().to_string_lossy().into_owned(), 0);
    let state = ServerState::initialize(&config).unwrap();

    let app = relay_server::api::routes(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (dir, state, addr)
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(format!("http://{addr}")).with_poll_interval(100)
}

/// 轮询等待条件成立，超时返回 false
async fn wait_until<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn bill_call(table_number: i32) -> CallCreate {
    CallCreate {
        table_number,
        kind: CallKind::Bill,
        message: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bill_request_reaches_waiter_and_resolves() {
    let (_dir, _state, addr) = spawn_relay().await;
    let config = client_config(addr);
    let http = PanelHttp::new(&config);

    // 服务员面板盯着呼叫信箱
    let panel = Arc::new(Mutex::new(WaiterPanel::new()));
    let sink = panel.clone();
    let poller = Poller::new(PanelHttp::new(&config), keys::WAITER_CALLS, &config)
        .start(move |stored| {
            sink.lock().unwrap().absorb_record(&stored.record);
        });

    // 顾客要账单
    let call = http.open_call(&bill_call(7)).await.unwrap();
    assert_eq!(call.status, CallStatus::Active);

    // 下一个轮询周期内呼叫出现在面板上
    let seen = wait_until(
        || {
            panel
                .lock()
                .unwrap()
                .active_calls()
                .iter()
                .any(|c| c.table_number == 7 && c.kind == CallKind::Bill)
        },
        Duration::from_secs(3),
    )
    .await;
    assert!(seen, "poller never delivered the bill call");

    // 服务员解决
    let resolved = http
        .resolve_call(
            &call.id,
            &CallResolve {
                resolved_by: Some("anna".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, CallStatus::Resolved);
    assert!(resolved.resolved_at.is_some());

    // 活跃列表清空，历史里带着 RESOLVED 状态
    let active = http.active_calls().await.unwrap();
    assert!(active.is_empty());

    let history = http.call_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, call.id);
    assert_eq!(history[0].status, CallStatus::Resolved);

    poller.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_poller_marks_consumed_notifications_read() {
    let (_dir, _state, addr) = spawn_relay().await;
    let config = client_config(addr);
    let http = PanelHttp::new(&config);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let poller = Poller::new(PanelHttp::new(&config), keys::CASHIER_NOTIFICATIONS, &config)
        .with_mark_read(true)
        .start(move |stored| {
            sink.lock().unwrap().push(stored);
        });

    http.post_notification(
        keys::CASHIER_NOTIFICATIONS,
        &NotificationCreate {
            kind: NotificationKind::BillRequest,
            table_number: Some(7),
            order_id: None,
            amount: None,
            message: "Table 7 wants the bill".to_string(),
        },
    )
    .await
    .unwrap();

    let delivered = wait_until(
        || !received.lock().unwrap().is_empty(),
        Duration::from_secs(3),
    )
    .await;
    assert!(delivered, "poller never delivered the notification");

    // 标记请求紧跟在回调之后异步发出
    let unread_cleared = wait_until_async_unread(&http).await;
    assert!(unread_cleared, "notification never marked read");

    poller.stop().await;
}

/// 等未读列表清空（标记请求在回调之后异步发出）
async fn wait_until_async_unread(http: &PanelHttp) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let unread = http
            .notifications(keys::CASHIER_NOTIFICATIONS, true)
            .await
            .unwrap();
        if unread.is_empty() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sse_stream_delivers_new_order() {
    let (_dir, _state, addr) = spawn_relay().await;
    let config = client_config(addr);

    let mut stream = EventStream::new(&config, EventChannel::Orders);
    let token = stream.cancellation_token();

    // 建连后下单
    let order_http = PanelHttp::new(&config);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        order_http
            .place_order(&OrderCreate {
                table_number: 12,
                items: vec![OrderItemCreate {
                    name: "Green curry".to_string(),
                    price: 11.0,
                    quantity: 1,
                    notes: None,
                }],
                notes: None,
            })
            .await
            .unwrap();
    });

    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(StreamItem::Event(event)) if event.kind == RelayEventKind::NewOrder => {
                    return event;
                }
                Some(_) => continue,
                None => panic!("SSE stream ended before the order event"),
            }
        }
    })
    .await
    .expect("no new_order event within 5s");

    assert_eq!(event.payload["table_number"], serde_json::json!(12));
    assert!(event.sequence >= 1);
    token.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sse_replays_from_last_event_id() {
    let (_dir, state, addr) = spawn_relay().await;
    let config = client_config(addr);
    let http = PanelHttp::new(&config);

    let since = state.hub.current_sequence();
    http.open_call(&bill_call(11)).await.unwrap();
    http.open_call(&bill_call(12)).await.unwrap();

    // 带着断点接入，两次呼叫从回放窗口补回来
    let mut stream = EventStream::new(&config, EventChannel::All).resume_from(since);
    let token = stream.cancellation_token();

    let tables = tokio::time::timeout(Duration::from_secs(5), async {
        let mut tables = Vec::new();
        while tables.len() < 2 {
            match stream.next().await {
                Some(StreamItem::Event(event)) if event.kind == RelayEventKind::WaiterCall => {
                    tables.push(event.payload["table_number"].as_i64().unwrap());
                }
                Some(_) => continue,
                None => panic!("SSE stream ended during replay"),
            }
        }
        tables
    })
    .await
    .expect("replay did not deliver both calls within 5s");

    assert_eq!(tables, vec![11, 12]);
    token.cancel();
}
