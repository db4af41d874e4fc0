//! 클라이언트 런타임.
//!
//! 단일 액터 태스크가 [`ClientState`]를 소유한다. 모든 입력은 유한 이벤트 큐로 들어오고,
//! 액터는 리듀서가 돌려준 [`Effect`]를 실행한다. 네트워크/DB 효과는 별도 태스크에서
//! 실행되며 완료 결과를 다시 이벤트로 큐에 넣는다.

use std::sync::Arc;
use std::time::Duration;
use telemon_core::config::AppConfig;
use telemon_core::error::CoreError;
use telemon_core::ports::control::ControlApi;
use telemon_core::ports::push::PushTransport;
use telemon_core::ports::store::TelemetryStore;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::UiEventBus;
use crate::poller::NotificationPoller;
use crate::push::{PushConnectionManager, ReconnectPolicy};
use crate::session::{default_session_name, SessionController};
use crate::state::{reduce, ClientEvent, ClientState, Effect, UiEvent};

/// 런타임이 사용하는 포트 구현
#[derive(Clone)]
pub struct ClientDeps {
    pub control: Arc<dyn ControlApi>,
    pub transport: Arc<dyn PushTransport>,
    pub store: Arc<dyn TelemetryStore>,
}

/// 런타임 조작 핸들
#[derive(Clone)]
pub struct ClientHandle {
    events: mpsc::Sender<ClientEvent>,
    bus: Arc<UiEventBus>,
    shutdown: Arc<watch::Sender<bool>>,
    finished: watch::Receiver<bool>,
}

impl ClientHandle {
    /// 이벤트 큐에 입력 추가
    pub async fn send(&self, event: ClientEvent) -> Result<(), CoreError> {
        self.events
            .send(event)
            .await
            .map_err(|_| CoreError::Transport("클라이언트 런타임이 종료됨".to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.bus.subscribe()
    }

    /// 종료 요청. 여러 번 호출해도 된다.
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            info!("클라이언트 종료 요청");
        }
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// 정리 완료 대기
    pub async fn wait_finished(&self) {
        let mut finished = self.finished.clone();
        let _ = finished.wait_for(|done| *done).await;
    }
}

/// 시작 전 런타임. 구독자는 [`ClientRuntime::spawn`] 전에 붙여야 초기 스냅샷을 받는다.
pub struct ClientRuntime {
    actor: Actor,
    handle: ClientHandle,
    shutdown_rx: watch::Receiver<bool>,
    poll_interval: Duration,
}

impl ClientRuntime {
    pub fn new(deps: ClientDeps, config: &AppConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.client.event_queue_capacity);
        let bus = Arc::new(UiEventBus::new(config.client.event_queue_capacity));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);

        let push = PushConnectionManager::new(
            deps.transport,
            ReconnectPolicy::from_config(config),
            config.push.packet_target.clone(),
            tx.clone(),
        );

        let actor = Actor {
            state: ClientState::new(config.client.live_log_capacity),
            rx,
            tx: tx.clone(),
            bus: bus.clone(),
            push,
            sessions: Arc::new(SessionController::new(deps.control)),
            poller: Arc::new(NotificationPoller::new(
                deps.store.clone(),
                config.poll_timeout(),
            )),
            store: deps.store,
            notify_channel: config.database.notify_channel.clone(),
            stop_timeout: Duration::from_millis(config.server.stop_timeout_ms),
            finished: finished_tx,
        };

        Self {
            actor,
            handle: ClientHandle {
                events: tx,
                bus,
                shutdown: Arc::new(shutdown_tx),
                finished: finished_rx,
            },
            shutdown_rx,
            poll_interval: config.poll_interval(),
        }
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// 액터 + 폴링 타이머 시작
    pub fn spawn(self) -> (ClientHandle, JoinHandle<()>) {
        let timer = spawn_poll_timer(
            self.handle.events.clone(),
            self.poll_interval,
            self.shutdown_rx.clone(),
        );
        let task = tokio::spawn(self.actor.run(self.shutdown_rx, timer));
        (self.handle, task)
    }
}

/// 주기적으로 `PollTick`을 넣는다. 큐가 가득 차면 해당 틱을 건너뛴다.
fn spawn_poll_timer(
    events: mpsc::Sender<ClientEvent>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match events.try_send(ClientEvent::PollTick) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            debug!("이벤트 큐 가득 참, 폴링 틱 건너뜀");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("폴링 타이머 종료");
    })
}

struct Actor {
    state: ClientState,
    rx: mpsc::Receiver<ClientEvent>,
    tx: mpsc::Sender<ClientEvent>,
    bus: Arc<UiEventBus>,
    push: Arc<PushConnectionManager>,
    sessions: Arc<SessionController>,
    poller: Arc<NotificationPoller>,
    store: Arc<dyn TelemetryStore>,
    notify_channel: String,
    stop_timeout: Duration,
    finished: watch::Sender<bool>,
}

impl Actor {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>, timer: JoinHandle<()>) {
        info!("클라이언트 런타임 시작");
        self.bus
            .publish(UiEvent::StateChanged(self.state.snapshot()));
        self.execute(Effect::CheckDatabase);

        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    event = self.rx.recv() => {
                        let Some(event) = event else { break };
                        for effect in reduce(&mut self.state, event) {
                            self.execute(effect);
                        }
                    }
                }
            }
        }

        self.teardown(timer).await;
    }

    /// 종료 정리: 큐 닫기 → 생성 중지(제한 시간) → 푸시 해제 → DB 종료
    async fn teardown(self, timer: JoinHandle<()>) {
        info!("클라이언트 정리 시작");
        timer.abort();
        let Self {
            state,
            rx,
            push,
            sessions,
            store,
            stop_timeout,
            finished,
            ..
        } = self;
        // 이후 알림 전송이 대기하지 않도록 큐를 먼저 닫는다
        drop(rx);

        if state.is_generation_active() {
            match tokio::time::timeout(stop_timeout, sessions.stop_generation()).await {
                Ok(Ok(())) => info!("종료 전 생성 중지 완료"),
                Ok(Err(e)) => warn!("종료 전 생성 중지 실패: {e}"),
                Err(_) => warn!("종료 전 생성 중지 타임아웃 ({}ms)", stop_timeout.as_millis()),
            }
        }

        push.disconnect().await;
        store.close().await;
        let _ = finished.send(true);
        info!("클라이언트 정리 완료");
    }

    fn execute(&self, effect: Effect) {
        let tx = self.tx.clone();
        match effect {
            Effect::Ui(event) => self.bus.publish(event),
            Effect::Connect => {
                let push = self.push.clone();
                tokio::spawn(async move {
                    if let Err(e) = push.connect().await {
                        let event = ClientEvent::ConnectRejected {
                            message: e.to_string(),
                            attempts: push.attempts(),
                        };
                        complete(&tx, event).await;
                    }
                });
            }
            Effect::Disconnect => {
                let push = self.push.clone();
                tokio::spawn(async move { push.disconnect().await });
            }
            Effect::StartSession => {
                let sessions = self.sessions.clone();
                tokio::spawn(async move {
                    let name = default_session_name();
                    let result = sessions.start_session(&name).await;
                    complete(&tx, ClientEvent::SessionStarted(result)).await;
                });
            }
            Effect::StartGeneration(session_id) => {
                let sessions = self.sessions.clone();
                tokio::spawn(async move {
                    let result = sessions.start_generation(session_id).await;
                    complete(&tx, ClientEvent::GenerationStarted(result)).await;
                });
            }
            Effect::StopGeneration => {
                let sessions = self.sessions.clone();
                tokio::spawn(async move {
                    let result = sessions.stop_generation().await;
                    complete(&tx, ClientEvent::GenerationStopped(result)).await;
                });
            }
            Effect::Poll => {
                let poller = self.poller.clone();
                tokio::spawn(async move {
                    let raw = poller.poll().await;
                    complete(&tx, ClientEvent::PollCompleted(raw)).await;
                });
            }
            Effect::CheckServerStatus => {
                let sessions = self.sessions.clone();
                tokio::spawn(async move {
                    let result = sessions.status().await;
                    complete(&tx, ClientEvent::ServerStatus(result)).await;
                });
            }
            Effect::CheckDatabase => {
                let store = self.store.clone();
                let channel = self.notify_channel.clone();
                tokio::spawn(async move {
                    let result = match store.ping().await {
                        Ok(()) => store.listen(&channel).await,
                        Err(e) => Err(e),
                    };
                    complete(&tx, ClientEvent::DatabaseChecked(result)).await;
                });
            }
            Effect::LoadSessions => {
                let store = self.store.clone();
                tokio::spawn(async move {
                    let result = store.list_sessions().await;
                    complete(&tx, ClientEvent::SessionsLoaded(result)).await;
                });
            }
            Effect::LoadSessionPackets(entry) => {
                let store = self.store.clone();
                tokio::spawn(async move {
                    let result = store.list_session_packets(entry.id).await;
                    complete(&tx, ClientEvent::SessionPacketsLoaded { entry, result }).await;
                });
            }
        }
    }
}

async fn complete(tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    if tx.send(event).await.is_err() {
        debug!("런타임 종료됨, 완료 이벤트 폐기");
    }
}
