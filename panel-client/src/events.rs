//! SSE 事件流
//!
//! 订阅中继服务器的推送通道，断线后指数退避自动重连，并带上
//! `Last-Event-ID` 让服务器从断点续传。两种情况下产出
//! [`StreamItem::NeedsResync`]，要求消费方全量拉取后再继续：
//!
//! - 服务器明确推送 resync（重放窗口覆盖不到断点）
//! - 收到的序号跳号（中间丢了事件）
//!
//! 重连重放和在线推送可能重叠，这里按序号丢弃旧帧；消费方仍应按
//! `event_id` 幂等应用，双保险。

use std::collections::VecDeque;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use shared::relay::{RelayEvent, RelayEventKind};

use crate::{ClientConfig, ClientError, ClientResult};

type ByteStream = BoxStream<'static, reqwest::Result<Vec<u8>>>;

/// 订阅端点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChannel {
    /// 全部事件
    All,
    /// 只看订单相关事件（收银面板用）
    Orders,
}

impl EventChannel {
    fn path(&self) -> &'static str {
        match self {
            EventChannel::All => "/api/events",
            EventChannel::Orders => "/api/events/orders",
        }
    }
}

/// 事件流产出的条目
#[derive(Debug)]
pub enum StreamItem {
    /// 一条中继事件
    Event(RelayEvent),
    /// 续传失败，消费方需要全量拉取后用 `resume_from` 续上
    NeedsResync,
}

// ========== SSE 解析 ==========

/// 一帧 SSE 消息
#[derive(Debug, Default, Clone, PartialEq)]
struct SseFrame {
    id: Option<String>,
    event: Option<String>,
    data: String,
}

/// 增量 SSE 解析器
///
/// 字节流按行切分，空行提交一帧，跨分片的半行留在缓冲区。
#[derive(Debug, Default)]
struct SseParser {
    buffer: String,
    current: SseFrame,
}

impl SseParser {
    /// 喂入一个网络分片，返回其中解析完成的帧
    fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut frames = Vec::new();
        while let Some(newline_idx) = self.buffer.find('\n') {
            let mut line = self.buffer[..newline_idx].to_string();
            if line.ends_with('\r') {
                line.pop();
            }
            self.buffer.drain(..=newline_idx);

            if let Some(frame) = self.take_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// 处理一行；空行提交当前帧
    fn take_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            if self.current == SseFrame::default() {
                return None;
            }
            return Some(std::mem::take(&mut self.current));
        }

        // keep-alive 注释行
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "id" => self.current.id = Some(value.to_string()),
            "event" => self.current.event = Some(value.to_string()),
            "data" => {
                if !self.current.data.is_empty() {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
            }
            _ => {}
        }
        None
    }
}

// ========== 事件流 ==========

/// 带自动重连的 SSE 订阅
pub struct EventStream {
    client: Client,
    url: String,
    reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    token: CancellationToken,
    connection: Option<ByteStream>,
    parser: SseParser,
    pending: VecDeque<StreamItem>,
    last_sequence: u64,
    attempts: u32,
}

impl EventStream {
    /// 创建事件流；懒连接，第一次 `next` 才发起请求
    pub fn new(config: &ClientConfig, channel: EventChannel) -> Self {
        // SSE 连接要长期挂起，只限制建连时间，不设全局超时
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            url: format!("{}{}", config.base_url.trim_end_matches('/'), channel.path()),
            reconnect_delay: config.reconnect_delay,
            max_reconnect_delay: config.max_reconnect_delay,
            max_reconnect_attempts: config.max_reconnect_attempts,
            token: CancellationToken::new(),
            connection: None,
            parser: SseParser::default(),
            pending: VecDeque::new(),
            last_sequence: 0,
            attempts: 0,
        }
    }

    /// 从这个序号续传（resync 全量拉取之后用）
    pub fn resume_from(mut self, sequence: u64) -> Self {
        self.last_sequence = sequence;
        self
    }

    /// 取消令牌；面板卸载时 cancel 即关闭连接
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 已确认收到的最大事件序号
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// 下一个条目
    ///
    /// 返回 `None` 表示已取消或重连次数耗尽，流不再产出任何东西。
    pub async fn next(&mut self) -> Option<StreamItem> {
        let token = self.token.clone();

        loop {
            if token.is_cancelled() {
                return None;
            }

            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            if self.connection.is_none() {
                match self.connect().await {
                    Ok(stream) => {
                        tracing::debug!(url = %self.url, since = self.last_sequence, "SSE connected");
                        self.connection = Some(stream);
                        self.parser = SseParser::default();
                    }
                    Err(e) => {
                        if !self.backoff(&e.to_string()).await {
                            return None;
                        }
                    }
                }
                continue;
            }

            let chunk = {
                let stream = self.connection.as_mut().expect("connection checked above");
                tokio::select! {
                    _ = token.cancelled() => return None,
                    chunk = stream.next() => chunk,
                }
            };

            match chunk {
                Some(Ok(bytes)) => {
                    let frames = self.parser.feed(&bytes);
                    for frame in frames {
                        let items = self.interpret(frame);
                        self.pending.extend(items);
                    }
                }
                Some(Err(e)) => {
                    self.connection = None;
                    if !self.backoff(&e.to_string()).await {
                        return None;
                    }
                }
                None => {
                    self.connection = None;
                    if !self.backoff("stream closed by server").await {
                        return None;
                    }
                }
            }
        }
    }

    async fn connect(&self) -> ClientResult<ByteStream> {
        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if self.last_sequence > 0 {
            request = request.header("Last-Event-ID", self.last_sequence.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Internal(format!(
                "SSE endpoint returned {status}"
            )));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed())
    }

    /// 解析一帧，维护序号水位
    fn interpret(&mut self, frame: SseFrame) -> Vec<StreamItem> {
        if frame.data.is_empty() {
            return Vec::new();
        }

        let event: RelayEvent = match serde_json::from_str(&frame.data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable SSE frame dropped");
                return Vec::new();
            }
        };

        // 解析出任何一帧都说明连接健康，退避归零
        self.attempts = 0;

        if event.kind == RelayEventKind::Resync {
            // 服务器的序号是权威：重启后序号可能比本地水位小，
            // 照单全收，否则后续事件全被当成重放丢掉
            self.last_sequence = event.sequence;
            return vec![StreamItem::NeedsResync];
        }

        // 重放与在线推送的重叠帧
        if self.last_sequence > 0 && event.sequence <= self.last_sequence {
            return Vec::new();
        }

        let gap = self.last_sequence > 0 && event.sequence > self.last_sequence + 1;
        self.last_sequence = event.sequence;

        if gap {
            // 中间丢了事件：先要求全量拉取，本事件照常排队
            return vec![StreamItem::NeedsResync, StreamItem::Event(event)];
        }

        vec![StreamItem::Event(event)]
    }

    /// 退避等待；返回 false 表示已取消或重连次数耗尽
    async fn backoff(&mut self, reason: &str) -> bool {
        self.attempts += 1;
        if self.max_reconnect_attempts > 0 && self.attempts > self.max_reconnect_attempts {
            tracing::error!(
                attempts = self.attempts - 1,
                "SSE reconnect attempts exhausted"
            );
            return false;
        }

        let delay = self.reconnect_backoff();
        tracing::warn!(
            error = %reason,
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "SSE connection lost, reconnecting"
        );

        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// 第 n 次重试的等待：首次 reconnect_delay，然后翻倍，封顶 max_reconnect_delay
    fn reconnect_backoff(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempts.saturating_sub(1).min(16));
        (self.reconnect_delay * factor).min(self.max_reconnect_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_frame(event: &RelayEvent) -> SseFrame {
        SseFrame {
            id: Some(event.sequence.to_string()),
            event: Some(event.kind.to_string()),
            data: serde_json::to_string(event).unwrap(),
        }
    }

    fn call_event(sequence: u64) -> RelayEvent {
        RelayEvent::new(RelayEventKind::WaiterCall, json!({"table_number": 7}))
            .with_sequence(sequence)
    }

    fn test_stream() -> EventStream {
        EventStream::new(&ClientConfig::default(), EventChannel::All)
    }

    // ========== 解析器 ==========

    #[test]
    fn test_parser_reassembles_split_chunks() {
        let mut parser = SseParser::default();

        let frames = parser.feed(b"id: 3\nevent: waiter_call\ndat");
        assert!(frames.is_empty());

        let frames = parser.feed(b"a: {\"table_number\":7}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id.as_deref(), Some("3"));
        assert_eq!(frames[0].event.as_deref(), Some("waiter_call"));
        assert_eq!(frames[0].data, "{\"table_number\":7}");
    }

    #[test]
    fn test_parser_handles_crlf_and_comments() {
        let mut parser = SseParser::default();

        let frames = parser.feed(b"data: a\r\n\r\n: keep-alive\r\n\r\ndata: b\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "a");
        assert_eq!(frames[1].data, "b");
    }

    #[test]
    fn test_parser_joins_multi_line_data() {
        let mut parser = SseParser::default();

        let frames = parser.feed(b"data: first\ndata: second\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn test_parser_strips_single_leading_space_only() {
        let mut parser = SseParser::default();

        let frames = parser.feed(b"data:  padded\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, " padded");
    }

    // ========== 序号水位 ==========

    #[test]
    fn test_interpret_passes_ordered_events_through() {
        let mut stream = test_stream();

        let items = stream.interpret(event_frame(&call_event(1)));
        assert!(matches!(items.as_slice(), [StreamItem::Event(_)]));

        let items = stream.interpret(event_frame(&call_event(2)));
        assert!(matches!(items.as_slice(), [StreamItem::Event(_)]));
        assert_eq!(stream.last_sequence(), 2);
    }

    #[test]
    fn test_interpret_drops_replayed_overlap() {
        let mut stream = test_stream();

        stream.interpret(event_frame(&call_event(5)));
        let items = stream.interpret(event_frame(&call_event(5)));
        assert!(items.is_empty());

        let items = stream.interpret(event_frame(&call_event(3)));
        assert!(items.is_empty());
        assert_eq!(stream.last_sequence(), 5);
    }

    #[test]
    fn test_interpret_flags_sequence_gap() {
        let mut stream = test_stream();

        stream.interpret(event_frame(&call_event(1)));
        let items = stream.interpret(event_frame(&call_event(4)));
        assert!(matches!(
            items.as_slice(),
            [StreamItem::NeedsResync, StreamItem::Event(_)]
        ));
        assert_eq!(stream.last_sequence(), 4);
    }

    #[test]
    fn test_interpret_surfaces_server_resync() {
        let mut stream = test_stream();
        stream.interpret(event_frame(&call_event(2)));

        let resync = RelayEvent::new(RelayEventKind::Resync, json!({"reason": "lagged"}))
            .with_sequence(40);
        let items = stream.interpret(event_frame(&resync));
        assert!(matches!(items.as_slice(), [StreamItem::NeedsResync]));
        assert_eq!(stream.last_sequence(), 40);
    }

    #[test]
    fn test_resync_rewinds_watermark_after_server_restart() {
        let mut stream = test_stream().resume_from(50);

        // 服务器重启后从 0 重新计数，resync 带回权威序号
        let resync = RelayEvent::new(RelayEventKind::Resync, json!({"reason": "restart"}))
            .with_sequence(0);
        let items = stream.interpret(event_frame(&resync));
        assert!(matches!(items.as_slice(), [StreamItem::NeedsResync]));
        assert_eq!(stream.last_sequence(), 0);

        // 新纪元的事件照常流过
        let items = stream.interpret(event_frame(&call_event(1)));
        assert!(matches!(items.as_slice(), [StreamItem::Event(_)]));
    }

    #[test]
    fn test_interpret_skips_garbage_frame() {
        let mut stream = test_stream();
        let items = stream.interpret(SseFrame {
            id: None,
            event: None,
            data: "not json".to_string(),
        });
        assert!(items.is_empty());
    }

    // ========== 退避 ==========

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut stream = test_stream();

        stream.attempts = 1;
        assert_eq!(stream.reconnect_backoff(), Duration::from_millis(500));

        stream.attempts = 2;
        assert_eq!(stream.reconnect_backoff(), Duration::from_secs(1));

        stream.attempts = 3;
        assert_eq!(stream.reconnect_backoff(), Duration::from_secs(2));

        stream.attempts = 30;
        assert_eq!(stream.reconnect_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn test_resume_from_sets_watermark() {
        let stream = test_stream().resume_from(17);
        assert_eq!(stream.last_sequence(), 17);
    }
}
