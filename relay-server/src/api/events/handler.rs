//! SSE Event Stream Handlers
//!
//! 每帧的 `id:` 是全局序号，`event:` 是事件类型，`data:` 是
//! [`RelayEvent`] 的 JSON。15 秒一个 keep-alive 注释帧。

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use shared::relay::{RelayEvent, RelayEventKind};

use crate::core::ServerState;

/// 订单流只转发这些事件类型
const ORDER_KINDS: &[RelayEventKind] = &[
    RelayEventKind::NewOrder,
    RelayEventKind::OrderStatusChanged,
    RelayEventKind::ItemStatusChanged,
    RelayEventKind::PaymentRecorded,
];

/// 重连参数
///
/// 浏览器 EventSource 自动带 `Last-Event-ID` 头；
/// 其他客户端也可以用 `?last_event_id=` 查询参数。
#[derive(Deserialize)]
pub struct EventsQuery {
    pub last_event_id: Option<u64>,
}

/// GET /api/events - 全部中继事件
pub async fn all_events(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(state, headers, query, None)
}

/// GET /api/events/orders - 订单相关事件
pub async fn order_events(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    event_stream(state, headers, query, Some(ORDER_KINDS))
}

fn event_stream(
    state: ServerState,
    headers: HeaderMap,
    query: EventsQuery,
    filter: Option<&'static [RelayEventKind]>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_seen = last_event_id(&headers, &query);

    // Subscribe before snapshotting the replay so nothing falls in the
    // gap between the two; an event landing in both is dropped by the
    // consumer's id dedupe.
    let rx = state.hub.subscribe();
    let shutdown = state.hub.shutdown_token().clone();
    let hub = state.hub.clone();

    let replay: Vec<RelayEvent> = match last_seen {
        None => Vec::new(),
        Some(since) => match state.hub.events_since(since) {
            Some(missed) => {
                if !missed.is_empty() {
                    tracing::debug!(since, count = missed.len(), "replaying missed events");
                }
                missed
            }
            None => {
                tracing::info!(since, "client too far behind replay window, sending resync");
                vec![state.hub.resync_event()]
            }
        },
    };
    let replay_frames: Vec<Result<Event, Infallible>> = replay
        .into_iter()
        .filter(|event| keep(filter, event))
        .map(|event| Ok(frame(&event)))
        .collect();

    let live = futures::stream::unfold(
        (rx, shutdown, hub),
        move |(mut rx, shutdown, hub)| async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return None,
                    received = rx.recv() => match received {
                        Ok(event) => {
                            if keep(filter, &event) {
                                return Some((Ok(frame(&event)), (rx, shutdown, hub)));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "SSE consumer lagged, sending resync");
                            let resync = hub.resync_event();
                            return Some((Ok(frame(&resync)), (rx, shutdown, hub)));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                }
            }
        },
    );

    let stream = futures::stream::iter(replay_frames).chain(live);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn last_event_id(headers: &HeaderMap, query: &EventsQuery) -> Option<u64> {
    headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .or(query.last_event_id)
}

fn keep(filter: Option<&[RelayEventKind]>, event: &RelayEvent) -> bool {
    match filter {
        // Resync always goes through, it tells the panel to refetch
        Some(kinds) => event.kind == RelayEventKind::Resync || kinds.contains(&event.kind),
        None => true,
    }
}

fn frame(event: &RelayEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default()
        .id(event.sequence.to_string())
        .event(event.kind.to_string())
        .data(data)
}
