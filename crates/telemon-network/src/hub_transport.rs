//! 푸시 허브 WebSocket 전송.
//!
//! `tokio-tungstenite` 기반 `PushTransport` 포트 구현.
//! JSON 허브 프로토콜의 클라이언트 측 최소 부분만 다룬다:
//! 핸드셰이크, 레코드 구분자(`\x1e`) 프레이밍, invocation 수신, ping, close.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use telemon_core::config::{PushConfig, ServerConfig};
use telemon_core::error::CoreError;
use telemon_core::normalize::RawPayload;
use telemon_core::ports::push::{PushTransport, TransportEvent};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// 허브 메시지 레코드 구분자
pub const RECORD_SEPARATOR: char = '\u{1e}';

const HANDSHAKE_REQUEST: &str = "{\"protocol\":\"json\",\"version\":1}\u{1e}";
const PING_FRAME: &str = "{\"type\":6}\u{1e}";
const STOP_GRACE: Duration = Duration::from_secs(1);

/// 허브 프레임
#[derive(Debug, Clone, PartialEq)]
pub enum HubFrame {
    /// 핸드셰이크 응답 (`type` 없음)
    Handshake { error: Option<String> },
    /// 서버 → 클라이언트 호출 (type 1)
    Invocation {
        target: String,
        arguments: Vec<Value>,
    },
    /// type 6
    Ping,
    /// type 7
    Close { error: Option<String> },
    /// 클라이언트가 다루지 않는 프레임
    Other(u64),
}

/// 텍스트 메시지를 허브 프레임 목록으로 분리
pub fn parse_hub_frames(text: &str) -> Vec<Result<HubFrame, CoreError>> {
    text.split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> Result<HubFrame, CoreError> {
    let value: Value = serde_json::from_str(record)
        .map_err(|e| CoreError::Parse(format!("허브 프레임 디코딩 실패: {e}")))?;
    let Value::Object(map) = value else {
        return Err(CoreError::Parse("허브 프레임이 객체가 아님".to_string()));
    };

    let error = map.get("error").and_then(Value::as_str).map(str::to_string);
    let Some(kind) = map.get("type") else {
        return Ok(HubFrame::Handshake { error });
    };

    match kind.as_u64() {
        Some(1) => {
            let target = map
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| CoreError::Parse("invocation에 target 없음".to_string()))?
                .to_string();
            let arguments = match map.get("arguments") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            Ok(HubFrame::Invocation { target, arguments })
        }
        Some(6) => Ok(HubFrame::Ping),
        Some(7) => Ok(HubFrame::Close { error }),
        Some(other) => Ok(HubFrame::Other(other)),
        None => Err(CoreError::Parse(format!("잘못된 프레임 type: {kind}"))),
    }
}

/// 진행 중인 연결 태스크
struct ActiveConnection {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// 푸시 허브 WebSocket 전송: `PushTransport` 포트 구현
pub struct HubTransport {
    url: String,
    keep_alive: Duration,
    connect_timeout: Duration,
    active: Mutex<Option<ActiveConnection>>,
}

impl HubTransport {
    /// 새 허브 전송 생성
    pub fn new(url: &str, keep_alive: Duration, connect_timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            keep_alive,
            connect_timeout,
            active: Mutex::new(None),
        }
    }

    /// 설정으로 생성
    pub fn from_config(server: &ServerConfig, push: &PushConfig) -> Self {
        Self::new(
            &server.hub_url(),
            Duration::from_millis(push.keep_alive_ms),
            Duration::from_millis(push.connect_timeout_ms),
        )
    }

    /// 허브 URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 연결 + 핸드셰이크. 핸드셰이크 응답과 같은 메시지에 실려 온 프레임은 반환한다.
    async fn open(url: &str) -> Result<(WsWrite, WsRead, Vec<HubFrame>), CoreError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| CoreError::Transport(format!("WebSocket 연결 실패: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(HANDSHAKE_REQUEST.into()))
            .await
            .map_err(|e| CoreError::Transport(format!("핸드셰이크 전송 실패: {e}")))?;

        while let Some(msg) = read.next().await {
            let msg =
                msg.map_err(|e| CoreError::Transport(format!("핸드셰이크 수신 실패: {e}")))?;
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let mut frames = parse_hub_frames(text.as_str()).into_iter();
            match frames.next() {
                Some(Ok(HubFrame::Handshake { error: None })) => {
                    let rest = frames.filter_map(Result::ok).collect();
                    return Ok((write, read, rest));
                }
                Some(Ok(HubFrame::Handshake { error: Some(e) })) => {
                    return Err(CoreError::Transport(format!("핸드셰이크 거부: {e}")));
                }
                Some(Ok(frame)) => {
                    return Err(CoreError::Transport(format!(
                        "핸드셰이크 전 예상치 못한 프레임: {frame:?}"
                    )));
                }
                Some(Err(e)) => return Err(e),
                None => continue,
            }
        }

        Err(CoreError::Transport("핸드셰이크 중 연결 종료".to_string()))
    }

    /// 연결 태스크 본체
    async fn run(
        url: String,
        keep_alive: Duration,
        connect_timeout: Duration,
        events: mpsc::Sender<TransportEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let opened = tokio::select! {
            _ = &mut shutdown => return,
            result = tokio::time::timeout(connect_timeout, Self::open(&url)) => result,
        };

        let (mut write, mut read, pending) = match opened {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!("허브 연결 실패: {e}");
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                return;
            }
            Err(_) => {
                warn!("허브 연결 타임아웃: {connect_timeout:?}");
                let msg = format!("허브 연결 타임아웃: {}ms 초과", connect_timeout.as_millis());
                let _ = events.send(TransportEvent::Error(msg)).await;
                return;
            }
        };

        info!("허브 연결 수립: {url}");
        if events.send(TransportEvent::Opened).await.is_err() {
            return;
        }
        for frame in pending {
            if let Some(event) = Self::frame_event(frame) {
                let terminal = !matches!(event, TransportEvent::Message { .. });
                let _ = events.send(event).await;
                if terminal {
                    return;
                }
            }
        }

        let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + keep_alive, keep_alive);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("허브 연결 종료 요청");
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
                _ = ping.tick() => {
                    if let Err(e) = write.send(Message::Text(PING_FRAME.into())).await {
                        let _ = events.send(TransportEvent::Error(format!("ping 전송 실패: {e}"))).await;
                        return;
                    }
                }
                msg = read.next() => {
                    let event = match msg {
                        Some(Ok(Message::Text(text))) => {
                            let mut terminal = None;
                            for frame in parse_hub_frames(text.as_str()) {
                                match frame {
                                    Ok(frame) => match Self::frame_event(frame) {
                                        Some(event @ TransportEvent::Message { .. }) => {
                                            if events.send(event).await.is_err() {
                                                return;
                                            }
                                        }
                                        Some(event) => {
                                            terminal = Some(event);
                                            break;
                                        }
                                        None => {}
                                    },
                                    Err(e) => warn!("허브 프레임 무시: {e}"),
                                }
                            }
                            match terminal {
                                Some(event) => event,
                                None => continue,
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("허브 close 프레임 수신: {frame:?}");
                            TransportEvent::Closed
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => TransportEvent::Error(format!("WebSocket 수신 에러: {e}")),
                        None => TransportEvent::Closed,
                    };
                    info!("허브 연결 종료: {event:?}");
                    let _ = events.send(event).await;
                    return;
                }
            }
        }
    }

    /// 프레임 → 전송 이벤트. `None`이면 무시.
    fn frame_event(frame: HubFrame) -> Option<TransportEvent> {
        match frame {
            HubFrame::Invocation { target, arguments } => Some(TransportEvent::Message {
                target,
                payload: RawPayload::Sequence(arguments),
            }),
            HubFrame::Close { error: Some(e) } => Some(TransportEvent::Error(e)),
            HubFrame::Close { error: None } => Some(TransportEvent::Closed),
            HubFrame::Ping | HubFrame::Handshake { .. } | HubFrame::Other(_) => None,
        }
    }
}

#[async_trait]
impl PushTransport for HubTransport {
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), CoreError> {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Self::run(
            self.url.clone(),
            self.keep_alive,
            self.connect_timeout,
            events,
            shutdown_rx,
        ));

        let previous = self.active.lock().replace(ActiveConnection { shutdown, task });
        if let Some(previous) = previous {
            warn!("이전 허브 연결 태스크 중단");
            previous.task.abort();
        }
        debug!("허브 연결 시작: {}", self.url);
        Ok(())
    }

    async fn stop(&self) {
        let Some(ActiveConnection { shutdown, mut task }) = self.active.lock().take() else {
            return;
        };
        let _ = shutdown.send(());
        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            warn!("허브 연결 태스크 종료 지연, 강제 중단");
            task.abort();
        }
    }
}
