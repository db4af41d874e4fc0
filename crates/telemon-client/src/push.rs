//! 푸시 연결 관리자.
//!
//! 영속 푸시 연결의 수명주기(연결, 해제, 자동 재연결, 에러 보고)를 소유한다.
//! 전송 이벤트는 연결마다 부여한 epoch으로 구분하며, 대체된 연결의 이벤트는 무시한다.
//! 결과는 [`ClientEvent`]로 액터 큐에 넣기만 한다.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use telemon_core::config::AppConfig;
use telemon_core::error::CoreError;
use telemon_core::ports::push::{PushTransport, TransportEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::ClientEvent;

/// 전송 이벤트 큐 용량
const TRANSPORT_QUEUE_CAPACITY: usize = 64;

/// 재연결 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 재연결 간격 (고정)
    pub interval: Duration,
    /// 최대 시도 횟수. 0이면 자동 재연결 안 함.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.reconnect_interval(),
            max_attempts: config.push.max_reconnect_attempts,
        }
    }
}

/// 연결 관리자 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Idle,
    Connecting,
    Open,
}

struct Inner {
    state: PushState,
    /// 현재 연결 세대. 전이마다 증가해 이전 연결의 이벤트를 걸러낸다.
    epoch: u64,
    attempts: u32,
    /// 현재 Connecting이 자동 재연결 시도인지
    reconnecting: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

/// 푸시 연결 관리자
pub struct PushConnectionManager {
    transport: Arc<dyn PushTransport>,
    policy: ReconnectPolicy,
    packet_target: String,
    events: mpsc::Sender<ClientEvent>,
    inner: Mutex<Inner>,
}

impl PushConnectionManager {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        policy: ReconnectPolicy,
        packet_target: impl Into<String>,
        events: mpsc::Sender<ClientEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            policy,
            packet_target: packet_target.into(),
            events,
            inner: Mutex::new(Inner {
                state: PushState::Idle,
                epoch: 0,
                attempts: 0,
                reconnecting: false,
                reconnect_timer: None,
                pump: None,
            }),
        })
    }

    pub fn state(&self) -> PushState {
        self.inner.lock().state
    }

    /// 현재 재연결 시도 횟수
    pub fn attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// 연결 시작
    ///
    /// Idle이면 새 연결을 시작한다. 자동 재연결 시도가 진행 중이면 그 시도를 중단하고
    /// 사용자 연결로 대체한다. 그 외 상태에서는 상태 변경 없이 실패.
    /// 시도 횟수를 초기화하고 대기 중인 재연결을 취소한다.
    pub async fn connect(self: &Arc<Self>) -> Result<(), CoreError> {
        let (epoch, superseded) = {
            let mut inner = self.inner.lock();
            let takeover = inner.state == PushState::Connecting && inner.reconnecting;
            if inner.state != PushState::Idle && !takeover {
                return Err(CoreError::Transport(format!(
                    "연결 불가: 현재 상태 {:?}",
                    inner.state
                )));
            }
            if let Some(timer) = inner.reconnect_timer.take() {
                debug!("대기 중인 재연결 취소");
                timer.abort();
            }
            let superseded = if takeover {
                info!("진행 중인 재연결 시도 {} 중단", inner.attempts);
                Some(inner.pump.take())
            } else {
                None
            };
            inner.attempts = 0;
            inner.reconnecting = false;
            (Self::begin_connecting(&mut inner), superseded)
        };

        if let Some(pump) = superseded {
            if let Some(pump) = pump {
                pump.abort();
            }
            self.transport.stop().await;
        }

        info!("푸시 연결 시작");
        self.start_transport(epoch).await;
        Ok(())
    }

    /// 연결 해제
    ///
    /// 대기 중인 재연결을 취소한다. 이미 Idle이면 (재연결 대기 중이어도) 알림 없이 반환.
    pub async fn disconnect(&self) {
        let (was, had_timer, pump) = {
            let mut inner = self.inner.lock();
            let had_timer = match inner.reconnect_timer.take() {
                Some(timer) => {
                    timer.abort();
                    true
                }
                None => false,
            };
            let was = inner.state;
            inner.state = PushState::Idle;
            inner.epoch += 1;
            inner.attempts = 0;
            inner.reconnecting = false;
            (was, had_timer, inner.pump.take())
        };

        if was == PushState::Idle {
            if had_timer {
                debug!("대기 중인 재연결 취소");
            } else {
                debug!("이미 연결 해제 상태");
            }
            return;
        }

        self.transport.stop().await;
        if let Some(pump) = pump {
            pump.abort();
        }
        info!("푸시 연결 해제 (이전 상태: {was:?})");
        self.notify(ClientEvent::Disconnected).await;
    }

    fn begin_connecting(inner: &mut Inner) -> u64 {
        inner.state = PushState::Connecting;
        inner.epoch += 1;
        inner.epoch
    }

    /// 전송 시작 + 이벤트 펌프 태스크
    async fn start_transport(self: &Arc<Self>, epoch: u64) {
        let (tx, mut rx) = mpsc::channel(TRANSPORT_QUEUE_CAPACITY);

        let this = Arc::clone(self);
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(notification) = this.handle_transport_event(epoch, event) {
                    this.notify(notification).await;
                }
            }
        });

        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                // 시작 전에 대체됨 (해제 또는 새 연결)
                pump.abort();
                return;
            }
            if let Some(previous) = inner.pump.replace(pump) {
                previous.abort();
            }
        }

        if let Err(e) = self.transport.start(tx).await {
            if let Some(notification) =
                self.handle_transport_event(epoch, TransportEvent::Error(e.to_string()))
            {
                self.notify(notification).await;
            }
        }
    }

    /// 전송 이벤트 → 상태 전이. 반환값은 액터에 보낼 알림.
    fn handle_transport_event(
        self: &Arc<Self>,
        epoch: u64,
        event: TransportEvent,
    ) -> Option<ClientEvent> {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            debug!("이전 연결 이벤트 무시 (epoch {epoch}): {event:?}");
            return None;
        }

        match event {
            TransportEvent::Message { target, payload } => {
                if inner.state != PushState::Open {
                    debug!("열리지 않은 연결의 메시지 무시: {target}");
                    None
                } else if target == self.packet_target {
                    Some(ClientEvent::PacketArrived(payload))
                } else {
                    debug!("처리하지 않는 허브 타깃: {target}");
                    None
                }
            }
            TransportEvent::Opened => {
                if inner.state != PushState::Connecting {
                    return None;
                }
                inner.state = PushState::Open;
                inner.attempts = 0;
                inner.reconnecting = false;
                info!("푸시 연결 열림");
                Some(ClientEvent::Connected)
            }
            TransportEvent::Closed | TransportEvent::Error(_) => {
                let reason = match &event {
                    TransportEvent::Error(msg) => Some(msg.clone()),
                    _ => None,
                };
                match inner.state {
                    PushState::Idle => None,
                    PushState::Open => {
                        inner.state = PushState::Idle;
                        inner.epoch += 1;
                        warn!("푸시 연결 예기치 않게 종료: {reason:?}");
                        if self.policy.max_attempts > 0 {
                            self.schedule_reconnect(&mut inner);
                        }
                        Some(match reason {
                            Some(msg) => ClientEvent::TransportError(msg),
                            None => ClientEvent::Disconnected,
                        })
                    }
                    PushState::Connecting => {
                        inner.state = PushState::Idle;
                        inner.epoch += 1;
                        let msg = reason.unwrap_or_else(|| "연결이 종료되었습니다".to_string());

                        if !inner.reconnecting {
                            warn!("푸시 연결 실패: {msg}");
                            return Some(ClientEvent::TransportError(msg));
                        }
                        if inner.attempts < self.policy.max_attempts {
                            warn!(
                                "재연결 시도 {}/{} 실패: {msg}",
                                inner.attempts, self.policy.max_attempts
                            );
                            self.schedule_reconnect(&mut inner);
                            return Some(ClientEvent::ReconnectFailed {
                                attempt: inner.attempts,
                                max_attempts: self.policy.max_attempts,
                                message: msg,
                            });
                        }

                        inner.reconnecting = false;
                        warn!("재연결 포기: {}회 시도", inner.attempts);
                        Some(ClientEvent::TransportError(format!(
                            "재연결 실패 ({}회 시도): {msg}",
                            inner.attempts
                        )))
                    }
                }
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, inner: &mut Inner) {
        inner.reconnecting = true;
        let this = Arc::clone(self);
        let interval = self.policy.interval;
        debug!("{interval:?} 후 재연결 예약");
        inner.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            this.reconnect_attempt().await;
        }));
    }

    async fn reconnect_attempt(self: &Arc<Self>) {
        let (epoch, attempt) = {
            let mut inner = self.inner.lock();
            if inner.state != PushState::Idle || !inner.reconnecting {
                return;
            }
            // 현재 태스크가 타이머 자신이므로 abort하지 않고 비우기만 한다
            inner.reconnect_timer = None;
            inner.attempts += 1;
            let attempt = inner.attempts;
            (Self::begin_connecting(&mut inner), attempt)
        };

        info!("재연결 시도 {attempt}/{}", self.policy.max_attempts);
        self.notify(ClientEvent::Reconnecting {
            attempt,
            max_attempts: self.policy.max_attempts,
        })
        .await;
        self.start_transport(epoch).await;
    }

    async fn notify(&self, event: ClientEvent) {
        if self.events.send(event).await.is_err() {
            debug!("액터 큐 닫힘, 알림 폐기");
        }
    }
}
