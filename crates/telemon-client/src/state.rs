//! 클라이언트 상태 머신.
//!
//! 연결/생성/DB 상태의 단일 소유 구조체와 리듀서.
//! 모든 입력(전송 콜백, 폴링 타이머, 사용자 조작, 비동기 호출 완료)은 [`ClientEvent`]로
//! 들어오고, 리듀서는 상태를 갱신한 뒤 실행할 [`Effect`] 목록을 돌려준다.
//! 리듀서 자체는 I/O를 하지 않는다.

use std::collections::VecDeque;
use std::fmt;

use telemon_core::display::{
    format_session_entry, format_session_header, parse_session_entry, PacketRow, SessionEntry,
};
use telemon_core::error::CoreError;
use telemon_core::models::packet::TelemetryPacket;
use telemon_core::models::session::{Session, SessionId};
use telemon_core::normalize::{normalize_packet, RawPayload};
use tracing::{debug, error, info, warn};

/// 전송 내부 에러로 보이는 메시지 시그니처
const TRANSPORT_INTERNAL_SIGNATURES: [&str; 3] = ["WinError", "os error", "Connection reset"];

/// 사용자에게 보여줄 일반 연결 오류 메시지
pub const GENERIC_CONNECTION_ERROR: &str =
    "서버와의 연결에 문제가 발생했습니다. 네트워크 상태를 확인하세요.";

/// 푸시 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "연결 끊김",
            Self::Connecting => "연결 중",
            Self::Connected => "연결됨",
        };
        f.write_str(text)
    }
}

/// 패킷 생성 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Active,
    Inactive,
}

/// 진행 중인 제어 요청
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Starting,
    Stopping,
}

/// 상태 머신 입력
#[derive(Debug)]
pub enum ClientEvent {
    // 푸시 연결 관리자
    Connected,
    Disconnected,
    TransportError(String),
    Reconnecting { attempt: u32, max_attempts: u32 },
    /// 자동 재연결 시도 실패. 다음 시도가 예약되어 있다.
    ReconnectFailed {
        attempt: u32,
        max_attempts: u32,
        message: String,
    },
    /// 연결 관리자가 연결 요청을 거부함. `attempts`는 관리자의 현재 시도 횟수.
    ConnectRejected { message: String, attempts: u32 },
    PacketArrived(RawPayload),

    // 폴링 타이머 / 폴러
    PollTick,
    PollCompleted(Option<RawPayload>),

    // 비동기 호출 완료
    SessionStarted(Result<SessionId, CoreError>),
    GenerationStarted(Result<SessionId, CoreError>),
    GenerationStopped(Result<(), CoreError>),
    ServerStatus(Result<(), CoreError>),
    DatabaseChecked(Result<(), CoreError>),
    SessionsLoaded(Result<Vec<Session>, CoreError>),
    SessionPacketsLoaded {
        entry: SessionEntry,
        result: Result<Vec<TelemetryPacket>, CoreError>,
    },

    // 사용자 조작
    UserToggleConnect,
    UserStartGeneration,
    UserStopGeneration,
    UserRefreshSessions,
    UserOpenSession(String),
    UserCheckStatus,
    UserCheckDatabase,
}

/// 프레젠테이션 레이어용 상태 스냅샷
#[derive(Debug, Clone, PartialEq)]
pub struct UiSnapshot {
    pub connection: ConnectionState,
    pub generation: GenerationState,
    pub connect_label: String,
    pub connect_enabled: bool,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub history_enabled: bool,
    pub status_line: String,
    pub last_message: String,
    pub packet_count: u64,
    pub reconnect_attempts: u32,
}

/// 프레젠테이션 레이어 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    StateChanged(UiSnapshot),
    PacketAppended(PacketRow),
    LiveLogCleared,
    SessionList(Vec<String>),
    SessionHistory { header: String, rows: Vec<PacketRow> },
    Error(String),
    Info(String),
    ConnectionLost,
}

/// 리듀서가 요청하는 부수 효과
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Connect,
    Disconnect,
    StartSession,
    StartGeneration(SessionId),
    StopGeneration,
    Poll,
    CheckServerStatus,
    CheckDatabase,
    LoadSessions,
    LoadSessionPackets(SessionEntry),
    Ui(UiEvent),
}

/// 클라이언트 상태 (액터 태스크가 단독 소유)
#[derive(Debug)]
pub struct ClientState {
    pub connection: ConnectionState,
    pub generation: GenerationState,
    pub reconnect_attempts: u32,
    pub db_connected: bool,
    pub pending: Option<PendingAction>,
    pub poll_in_flight: bool,
    pub current_session: Option<SessionId>,
    pub packet_count: u64,
    pub last_message: String,
    live_log: VecDeque<PacketRow>,
    live_log_capacity: usize,
}

impl ClientState {
    /// 초기 상태: 연결 끊김, 생성 비활성, DB 미확인
    pub fn new(live_log_capacity: usize) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            generation: GenerationState::Inactive,
            reconnect_attempts: 0,
            db_connected: false,
            pending: None,
            poll_in_flight: false,
            current_session: None,
            packet_count: 0,
            last_message: String::new(),
            live_log: VecDeque::new(),
            live_log_capacity: live_log_capacity.max(1),
        }
    }

    /// 연결 상태 변경. Connected가 아니게 되면 같은 단계에서 생성도 비활성화한다.
    fn set_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
        if connection != ConnectionState::Connected && self.generation == GenerationState::Active
        {
            info!("연결 상태 {connection} → 생성 비활성화");
            self.generation = GenerationState::Inactive;
            self.current_session = None;
        }
    }

    pub fn is_generation_active(&self) -> bool {
        self.generation == GenerationState::Active
    }

    /// 라이브 패킷 로그 (오래된 것부터)
    pub fn live_log(&self) -> impl Iterator<Item = &PacketRow> {
        self.live_log.iter()
    }

    pub fn live_log_len(&self) -> usize {
        self.live_log.len()
    }

    fn push_row(&mut self, row: PacketRow) {
        if self.live_log.len() == self.live_log_capacity {
            self.live_log.pop_front();
        }
        self.live_log.push_back(row);
    }

    /// 현재 상태의 UI 스냅샷
    pub fn snapshot(&self) -> UiSnapshot {
        let connected = self.connection == ConnectionState::Connected;
        let active = self.is_generation_active();

        let status_line = format!(
            "DB: {} | 생성: {} | 서버: {}",
            if self.db_connected { "연결됨" } else { "연결 끊김" },
            if active { "켜짐" } else { "꺼짐" },
            self.connection,
        );

        UiSnapshot {
            connection: self.connection,
            generation: self.generation,
            connect_label: if connected { "연결 끊기" } else { "연결" }.to_string(),
            // 최초 연결 시도 중에는 버튼을 막고, 자동 재연결 대기 중에는 수동 연결을 허용
            connect_enabled: self.connection != ConnectionState::Connecting
                || self.reconnect_attempts > 0,
            start_enabled: connected && !active && self.pending.is_none(),
            stop_enabled: active && self.pending.is_none(),
            history_enabled: self.db_connected,
            status_line,
            last_message: self.last_message.clone(),
            packet_count: self.packet_count,
            reconnect_attempts: self.reconnect_attempts,
        }
    }
}

/// 사용자 표시용 에러 메시지
///
/// 비어 있거나 전송 내부 시그니처가 포함된 메시지는 일반 메시지로 바꾼다.
pub fn user_error_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty()
        || TRANSPORT_INTERNAL_SIGNATURES
            .iter()
            .any(|signature| trimmed.contains(signature))
    {
        GENERIC_CONNECTION_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}

/// 상태 머신 리듀서
pub fn reduce(state: &mut ClientState, event: ClientEvent) -> Vec<Effect> {
    let mut effects = Vec::new();

    let changed = match event {
        ClientEvent::Connected => {
            info!("푸시 연결 수립");
            state.set_connection(ConnectionState::Connected);
            state.reconnect_attempts = 0;
            state.last_message = "서버에 연결됨".to_string();
            true
        }
        ClientEvent::Disconnected => {
            let was = state.connection;
            state.set_connection(ConnectionState::Disconnected);
            if was != ConnectionState::Disconnected {
                warn!("푸시 연결 끊김 (이전 상태: {was})");
                state.last_message = "서버 연결이 끊어졌습니다".to_string();
                effects.push(Effect::Ui(UiEvent::ConnectionLost));
            }
            true
        }
        ClientEvent::TransportError(message) => {
            error!("전송 에러: {message}");
            state.set_connection(ConnectionState::Disconnected);
            surface_error(state, &mut effects, &message);
            true
        }
        ClientEvent::Reconnecting {
            attempt,
            max_attempts,
        } => {
            state.set_connection(ConnectionState::Connecting);
            state.reconnect_attempts = attempt;
            state.last_message = format!("재연결 시도 {attempt}/{max_attempts}");
            effects.push(Effect::Ui(UiEvent::Info(state.last_message.clone())));
            true
        }
        ClientEvent::ReconnectFailed {
            attempt,
            max_attempts,
            message,
        } => {
            warn!("재연결 시도 {attempt}/{max_attempts} 실패: {message}");
            state.set_connection(ConnectionState::Disconnected);
            state.reconnect_attempts = attempt;
            state.last_message =
                format!("재연결 시도 {attempt}/{max_attempts} 실패, 다음 시도 대기 중");
            effects.push(Effect::Ui(UiEvent::Info(state.last_message.clone())));
            true
        }
        ClientEvent::ConnectRejected { message, attempts } => {
            warn!("연결 요청 거부: {message}");
            state.reconnect_attempts = attempts;
            surface_error(state, &mut effects, &message);
            true
        }
        ClientEvent::PacketArrived(raw) => {
            on_packet(state, raw, &mut effects);
            false
        }

        ClientEvent::PollTick => {
            if state.db_connected && !state.poll_in_flight {
                state.poll_in_flight = true;
                effects.push(Effect::Poll);
            }
            false
        }
        ClientEvent::PollCompleted(raw) => {
            state.poll_in_flight = false;
            if let Some(raw) = raw {
                on_packet(state, raw, &mut effects);
            }
            false
        }

        ClientEvent::SessionStarted(result) => on_session_started(state, result, &mut effects),
        ClientEvent::GenerationStarted(result) => {
            on_generation_started(state, result, &mut effects)
        }
        ClientEvent::GenerationStopped(result) => {
            on_generation_stopped(state, result, &mut effects)
        }
        ClientEvent::ServerStatus(result) => {
            if let Err(e) = &result {
                warn!("서버 상태 확인 실패: {e}");
            }
            state.last_message = format!(
                "HTTP: {} | 푸시: {}",
                if result.is_ok() { "OK" } else { "ERROR" },
                if state.connection == ConnectionState::Connected {
                    "연결됨"
                } else {
                    "연결 끊김"
                }
            );
            effects.push(Effect::Ui(UiEvent::Info(state.last_message.clone())));
            true
        }
        ClientEvent::DatabaseChecked(result) => {
            match result {
                Ok(()) => {
                    if !state.db_connected {
                        info!("DB 연결 확인");
                    }
                    state.db_connected = true;
                    state.last_message = "DB 연결됨".to_string();
                }
                Err(e) => {
                    warn!("DB 사용 불가, 푸시 전용 모드: {e}");
                    state.db_connected = false;
                    state.poll_in_flight = false;
                    state.last_message = "DB 연결 없음: 기록 조회를 사용할 수 없습니다".to_string();
                    effects.push(Effect::Ui(UiEvent::Error(state.last_message.clone())));
                }
            }
            true
        }
        ClientEvent::SessionsLoaded(result) => {
            match result {
                Ok(sessions) => {
                    debug!("세션 목록 {}개", sessions.len());
                    let entries = sessions.iter().map(format_session_entry).collect();
                    effects.push(Effect::Ui(UiEvent::SessionList(entries)));
                }
                Err(e) => surface_error(state, &mut effects, &format!("세션 목록 조회 실패: {e}")),
            }
            false
        }
        ClientEvent::SessionPacketsLoaded { entry, result } => {
            match result {
                Ok(packets) if packets.is_empty() => {
                    surface_error(
                        state,
                        &mut effects,
                        &format!("세션 {}에 패킷이 없습니다", entry.id),
                    );
                }
                Ok(packets) => {
                    let label = format!("세션 {}", entry.id);
                    let rows = packets
                        .iter()
                        .map(|packet| PacketRow::from_packet(packet, Some(&label)))
                        .collect();
                    let header = format_session_header(&entry, packets.len());
                    effects.push(Effect::Ui(UiEvent::SessionHistory { header, rows }));
                }
                Err(e) => surface_error(state, &mut effects, &format!("세션 패킷 조회 실패: {e}")),
            }
            false
        }

        ClientEvent::UserToggleConnect => match state.connection {
            ConnectionState::Connected => {
                info!("사용자 연결 해제 요청");
                effects.push(Effect::Disconnect);
                false
            }
            ConnectionState::Disconnected => {
                info!("사용자 연결 요청");
                state.connection = ConnectionState::Connecting;
                state.reconnect_attempts = 0;
                state.last_message = "서버에 연결 중...".to_string();
                effects.push(Effect::Connect);
                true
            }
            ConnectionState::Connecting => {
                state.reconnect_attempts = 0;
                effects.push(Effect::Connect);
                true
            }
        },
        ClientEvent::UserStartGeneration => on_user_start(state, &mut effects),
        ClientEvent::UserStopGeneration => {
            if !state.is_generation_active() || state.pending.is_some() {
                debug!("중지 요청 무시: 생성={:?}, 대기={:?}", state.generation, state.pending);
                false
            } else {
                state.pending = Some(PendingAction::Stopping);
                state.last_message = "생성 중지 중...".to_string();
                effects.push(Effect::StopGeneration);
                true
            }
        }
        ClientEvent::UserRefreshSessions => {
            if require_db(state, &mut effects) {
                effects.push(Effect::LoadSessions);
            }
            false
        }
        ClientEvent::UserOpenSession(text) => {
            if require_db(state, &mut effects) {
                match parse_session_entry(&text) {
                    Ok(entry) => effects.push(Effect::LoadSessionPackets(entry)),
                    Err(e) => surface_error(state, &mut effects, &e.to_string()),
                }
            }
            false
        }
        ClientEvent::UserCheckStatus => {
            effects.push(Effect::CheckServerStatus);
            false
        }
        ClientEvent::UserCheckDatabase => {
            effects.push(Effect::CheckDatabase);
            false
        }
    };

    if changed {
        effects.push(Effect::Ui(UiEvent::StateChanged(state.snapshot())));
    }
    effects
}

fn surface_error(state: &mut ClientState, effects: &mut Vec<Effect>, message: &str) {
    let message = user_error_message(message);
    state.last_message = message.clone();
    effects.push(Effect::Ui(UiEvent::Error(message)));
}

fn require_db(state: &mut ClientState, effects: &mut Vec<Effect>) -> bool {
    if !state.db_connected {
        surface_error(state, effects, "DB 연결 없음: 기록 조회를 사용할 수 없습니다");
    }
    state.db_connected
}

fn on_packet(state: &mut ClientState, raw: RawPayload, effects: &mut Vec<Effect>) {
    let packet = match normalize_packet(raw) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("패킷 폐기: {e}");
            return;
        }
    };

    let label = state.current_session.map(|id| format!("세션 {id}"));
    let row = PacketRow::from_packet(&packet, label.as_deref());
    state.packet_count += 1;
    debug!(
        "패킷 #{} 수신: id={}, payload={}",
        state.packet_count, packet.id, packet.payload
    );
    state.push_row(row.clone());
    effects.push(Effect::Ui(UiEvent::PacketAppended(row)));
}

fn on_user_start(state: &mut ClientState, effects: &mut Vec<Effect>) -> bool {
    if state.connection != ConnectionState::Connected {
        surface_error(state, effects, "먼저 서버에 연결하세요");
        return false;
    }
    if state.is_generation_active() || state.pending.is_some() {
        debug!("시작 요청 무시: 생성={:?}, 대기={:?}", state.generation, state.pending);
        return false;
    }
    if !state.db_connected {
        warn!("DB 연결 없이 생성 시작");
        effects.push(Effect::Ui(UiEvent::Info(
            "DB 연결 없음: 이번 세션은 기록에서 조회할 수 없습니다".to_string(),
        )));
    }

    state.pending = Some(PendingAction::Starting);
    state.packet_count = 0;
    state.live_log.clear();
    state.last_message = "세션 생성 중...".to_string();
    effects.push(Effect::Ui(UiEvent::LiveLogCleared));
    effects.push(Effect::StartSession);
    true
}

fn on_session_started(
    state: &mut ClientState,
    result: Result<SessionId, CoreError>,
    effects: &mut Vec<Effect>,
) -> bool {
    if state.pending != Some(PendingAction::Starting) {
        debug!("대기 중이 아닌 세션 생성 완료 무시: {result:?}");
        return false;
    }

    match result {
        Ok(id) if state.connection == ConnectionState::Connected => {
            info!("세션 생성: {id}");
            state.current_session = Some(id);
            effects.push(Effect::StartGeneration(id));
            false
        }
        Ok(id) => {
            state.pending = None;
            surface_error(
                state,
                effects,
                &format!("연결이 끊어져 세션 {id}의 생성을 시작하지 않았습니다"),
            );
            true
        }
        Err(e) => {
            error!("세션 생성 실패: {e}");
            state.pending = None;
            state.generation = GenerationState::Inactive;
            state.current_session = None;
            surface_error(state, effects, &format!("세션 생성 실패: {e}"));
            true
        }
    }
}

fn on_generation_started(
    state: &mut ClientState,
    result: Result<SessionId, CoreError>,
    effects: &mut Vec<Effect>,
) -> bool {
    if state.pending != Some(PendingAction::Starting) {
        debug!("대기 중이 아닌 생성 시작 완료 무시: {result:?}");
        return false;
    }
    state.pending = None;

    match result {
        Ok(id) if state.connection == ConnectionState::Connected => {
            info!("생성 시작: 세션 {id}");
            state.generation = GenerationState::Active;
            state.current_session = Some(id);
            state.last_message = format!("생성 시작: 세션 {id}");
        }
        Ok(id) => {
            // 응답 전에 연결이 끊김 → 비활성 유지, 서버 쪽 생성은 최선 노력으로 중지
            warn!("연결 끊김 후 생성 시작 응답 수신, 중지 요청: 세션 {id}");
            state.generation = GenerationState::Inactive;
            state.current_session = None;
            state.last_message = "연결이 끊어져 생성을 중지합니다".to_string();
            effects.push(Effect::StopGeneration);
        }
        Err(e) => {
            error!("생성 시작 실패: {e}");
            state.generation = GenerationState::Inactive;
            state.current_session = None;
            surface_error(state, effects, &format!("생성 시작 실패: {e}"));
        }
    }
    true
}

fn on_generation_stopped(
    state: &mut ClientState,
    result: Result<(), CoreError>,
    effects: &mut Vec<Effect>,
) -> bool {
    if state.pending != Some(PendingAction::Stopping) {
        match result {
            Ok(()) => debug!("최선 노력 중지 완료"),
            Err(e) => warn!("최선 노력 중지 실패: {e}"),
        }
        return false;
    }
    state.pending = None;

    match result {
        Ok(()) => {
            info!("생성 중지");
            state.generation = GenerationState::Inactive;
            state.current_session = None;
            state.last_message = "생성 중지됨".to_string();
        }
        Err(e) if state.generation == GenerationState::Inactive => {
            // 응답 전에 연결이 끊겨 이미 비활성
            warn!("연결 끊김 후 생성 중지 실패: {e}");
        }
        Err(e) => {
            error!("생성 중지 실패: {e}");
            surface_error(state, effects, &format!("생성 중지 실패: {e}"));
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use telemon_core::display::NOT_AVAILABLE;

    fn connected_state() -> ClientState {
        let mut state = ClientState::new(100);
        reduce(&mut state, ClientEvent::Connected);
        state
    }

    fn active_state() -> ClientState {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::UserStartGeneration);
        reduce(&mut state, ClientEvent::SessionStarted(Ok(SessionId(5))));
        reduce(&mut state, ClientEvent::GenerationStarted(Ok(SessionId(5))));
        assert!(state.is_generation_active());
        state
    }

    fn packet(id: i64, payload: f64) -> RawPayload {
        RawPayload::from(json!({"id": id, "counter": id, "payload": payload, "crc16": 255}))
    }

    fn count_connection_lost(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Ui(UiEvent::ConnectionLost)))
            .count()
    }

    fn last_error(effects: &[Effect]) -> Option<&str> {
        effects.iter().rev().find_map(|e| match e {
            Effect::Ui(UiEvent::Error(msg)) => Some(msg.as_str()),
            _ => None,
        })
    }

    #[test]
    fn toggle_connect_from_disconnected() {
        let mut state = ClientState::new(10);
        let effects = reduce(&mut state, ClientEvent::UserToggleConnect);
        assert_eq!(state.connection, ConnectionState::Connecting);
        assert_eq!(effects[0], Effect::Connect);
        assert!(!state.snapshot().connect_enabled);

        let effects = reduce(&mut state, ClientEvent::Connected);
        assert_eq!(state.connection, ConnectionState::Connected);
        assert_eq!(state.reconnect_attempts, 0);
        let Some(Effect::Ui(UiEvent::StateChanged(snapshot))) = effects.last() else {
            panic!("상태 변경 이벤트 없음: {effects:?}");
        };
        assert!(snapshot.start_enabled);
        assert!(!snapshot.stop_enabled);
        assert_eq!(snapshot.connect_label, "연결 끊기");
    }

    #[test]
    fn toggle_connect_when_connected_disconnects() {
        let mut state = connected_state();
        let effects = reduce(&mut state, ClientEvent::UserToggleConnect);
        assert_eq!(effects, vec![Effect::Disconnect]);
        assert_eq!(state.connection, ConnectionState::Connected);
    }

    #[test]
    fn unexpected_close_while_active() {
        let mut state = active_state();
        let effects = reduce(&mut state, ClientEvent::Disconnected);

        assert_eq!(state.connection, ConnectionState::Disconnected);
        assert_eq!(state.generation, GenerationState::Inactive);
        assert_eq!(count_connection_lost(&effects), 1);
        let snapshot = state.snapshot();
        assert!(!snapshot.stop_enabled);
        assert!(!snapshot.start_enabled);
        assert!(snapshot.status_line.contains("생성: 꺼짐"));

        // 이미 끊긴 상태에서 중복 알림 없음
        let effects = reduce(&mut state, ClientEvent::Disconnected);
        assert_eq!(count_connection_lost(&effects), 0);
    }

    #[test]
    fn transport_error_forces_inactive_in_same_step() {
        let mut state = active_state();
        let effects = reduce(&mut state, ClientEvent::TransportError("hub closed".to_string()));
        assert_eq!(state.generation, GenerationState::Inactive);
        assert_eq!(state.connection, ConnectionState::Disconnected);
        assert_eq!(last_error(&effects), Some("hub closed"));
    }

    #[test]
    fn transport_internal_messages_are_replaced() {
        for raw in [
            "",
            "   ",
            "[WinError 10054] 현재 연결은 원격 호스트에 의해 강제로 끊겼습니다",
            "Connection refused (os error 111)",
            "Connection reset by peer",
        ] {
            let mut state = connected_state();
            let effects = reduce(&mut state, ClientEvent::TransportError(raw.to_string()));
            assert_eq!(last_error(&effects), Some(GENERIC_CONNECTION_ERROR), "raw={raw:?}");
        }
    }

    #[test]
    fn reconnecting_sets_connecting_and_inactive() {
        let mut state = active_state();
        reduce(&mut state, ClientEvent::Disconnected);
        reduce(
            &mut state,
            ClientEvent::Reconnecting {
                attempt: 2,
                max_attempts: 3,
            },
        );
        assert_eq!(state.connection, ConnectionState::Connecting);
        assert_eq!(state.generation, GenerationState::Inactive);
        assert_eq!(state.reconnect_attempts, 2);
        assert!(state.snapshot().connect_enabled);

        reduce(&mut state, ClientEvent::Connected);
        assert_eq!(state.reconnect_attempts, 0);
    }

    #[test]
    fn failed_reconnect_attempt_shows_disconnected() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::Disconnected);
        reduce(
            &mut state,
            ClientEvent::Reconnecting {
                attempt: 1,
                max_attempts: 3,
            },
        );
        let effects = reduce(
            &mut state,
            ClientEvent::ReconnectFailed {
                attempt: 1,
                max_attempts: 3,
                message: "connection refused".to_string(),
            },
        );

        assert_eq!(state.connection, ConnectionState::Disconnected);
        assert_eq!(state.reconnect_attempts, 1);
        assert_eq!(count_connection_lost(&effects), 0);
        assert!(last_error(&effects).is_none());
        let snapshot = state.snapshot();
        assert!(snapshot.connect_enabled);
        assert!(snapshot.status_line.contains("서버: 연결 끊김"));
    }

    #[test]
    fn connect_during_reconnect_attempt() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::Disconnected);
        reduce(
            &mut state,
            ClientEvent::Reconnecting {
                attempt: 2,
                max_attempts: 3,
            },
        );
        assert!(state.snapshot().connect_enabled);

        let effects = reduce(&mut state, ClientEvent::UserToggleConnect);
        assert!(effects.contains(&Effect::Connect));

        // 관리자가 거부하면 관리자의 시도 횟수로 되돌린다
        let effects = reduce(
            &mut state,
            ClientEvent::ConnectRejected {
                message: "연결 불가: 현재 상태 Connecting".to_string(),
                attempts: 2,
            },
        );
        assert_eq!(state.reconnect_attempts, 2);
        assert_eq!(state.connection, ConnectionState::Connecting);
        assert!(last_error(&effects).is_some());
        let Some(Effect::Ui(UiEvent::StateChanged(snapshot))) = effects.last() else {
            panic!("상태 변경 이벤트 없음: {effects:?}");
        };
        assert_eq!(snapshot.reconnect_attempts, 2);
    }

    #[test]
    fn start_flow() {
        let mut state = connected_state();
        let effects = reduce(&mut state, ClientEvent::UserStartGeneration);
        assert!(effects.contains(&Effect::Ui(UiEvent::LiveLogCleared)));
        assert!(effects.contains(&Effect::StartSession));
        assert_eq!(state.pending, Some(PendingAction::Starting));
        assert!(!state.snapshot().start_enabled);

        let effects = reduce(&mut state, ClientEvent::SessionStarted(Ok(SessionId(5))));
        assert_eq!(effects, vec![Effect::StartGeneration(SessionId(5))]);

        reduce(&mut state, ClientEvent::GenerationStarted(Ok(SessionId(5))));
        assert_eq!(state.generation, GenerationState::Active);
        assert_eq!(state.pending, None);
        let snapshot = state.snapshot();
        assert!(snapshot.stop_enabled);
        assert!(!snapshot.start_enabled);
    }

    #[test]
    fn start_requires_connection() {
        let mut state = ClientState::new(10);
        let effects = reduce(&mut state, ClientEvent::UserStartGeneration);
        assert!(!effects.contains(&Effect::StartSession));
        assert!(last_error(&effects).is_some());
        assert_eq!(state.pending, None);
    }

    #[test]
    fn start_ignored_while_pending() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::UserStartGeneration);
        let effects = reduce(&mut state, ClientEvent::UserStartGeneration);
        assert!(effects.is_empty());
    }

    #[test]
    fn session_without_id_leaves_inactive() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::UserStartGeneration);
        let effects = reduce(
            &mut state,
            ClientEvent::SessionStarted(Err(CoreError::remote(None, "세션 ID 없는 응답"))),
        );
        assert_eq!(state.generation, GenerationState::Inactive);
        assert_eq!(state.pending, None);
        assert!(last_error(&effects).is_some());
        assert!(state.snapshot().start_enabled);
    }

    #[test]
    fn generation_start_failure_surfaces() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::UserStartGeneration);
        reduce(&mut state, ClientEvent::SessionStarted(Ok(SessionId(9))));
        let effects = reduce(
            &mut state,
            ClientEvent::GenerationStarted(Err(CoreError::remote(Some(500), "boom"))),
        );
        assert_eq!(state.generation, GenerationState::Inactive);
        assert_eq!(state.current_session, None);
        assert!(last_error(&effects).is_some());
    }

    #[test]
    fn late_generation_start_after_disconnect_is_stopped() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::UserStartGeneration);
        reduce(&mut state, ClientEvent::SessionStarted(Ok(SessionId(3))));
        reduce(&mut state, ClientEvent::Disconnected);

        let effects = reduce(&mut state, ClientEvent::GenerationStarted(Ok(SessionId(3))));
        assert_eq!(state.generation, GenerationState::Inactive);
        assert!(effects.contains(&Effect::StopGeneration));
        assert_eq!(state.pending, None);
    }

    #[test]
    fn session_started_after_disconnect_does_not_start_generation() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::UserStartGeneration);
        reduce(&mut state, ClientEvent::Disconnected);
        let effects = reduce(&mut state, ClientEvent::SessionStarted(Ok(SessionId(3))));
        assert!(!effects.iter().any(|e| matches!(e, Effect::StartGeneration(_))));
        assert_eq!(state.pending, None);
    }

    #[test]
    fn stop_flow_and_failure() {
        let mut state = active_state();
        let effects = reduce(&mut state, ClientEvent::UserStopGeneration);
        assert!(effects.contains(&Effect::StopGeneration));
        assert!(!state.snapshot().stop_enabled);

        let effects = reduce(
            &mut state,
            ClientEvent::GenerationStopped(Err(CoreError::Timeout {
                operation: "stop_generation".to_string(),
                timeout_ms: 2_000,
            })),
        );
        assert_eq!(state.generation, GenerationState::Active);
        assert!(last_error(&effects).is_some());

        reduce(&mut state, ClientEvent::UserStopGeneration);
        reduce(&mut state, ClientEvent::GenerationStopped(Ok(())));
        assert_eq!(state.generation, GenerationState::Inactive);
        assert!(state.snapshot().start_enabled);
    }

    #[test]
    fn stop_failure_after_connection_loss_is_not_surfaced() {
        let mut state = active_state();
        reduce(&mut state, ClientEvent::UserStopGeneration);
        reduce(&mut state, ClientEvent::Disconnected);
        assert_eq!(state.generation, GenerationState::Inactive);

        let effects = reduce(
            &mut state,
            ClientEvent::GenerationStopped(Err(CoreError::remote(Some(503), "unavailable"))),
        );
        assert!(last_error(&effects).is_none());
        assert_eq!(state.pending, None);
        assert_eq!(state.generation, GenerationState::Inactive);
    }

    #[test]
    fn stop_when_inactive_is_noop() {
        let mut state = connected_state();
        let effects = reduce(&mut state, ClientEvent::UserStopGeneration);
        assert!(effects.is_empty());
    }

    #[test]
    fn unparseable_packet_does_not_mutate_state() {
        let mut state = connected_state();
        let before = state.snapshot();
        let effects = reduce(
            &mut state,
            ClientEvent::PacketArrived(RawPayload::Text("{broken".to_string())),
        );
        assert!(effects.is_empty());
        assert_eq!(state.snapshot(), before);
        assert_eq!(state.live_log_len(), 0);
    }

    #[test]
    fn packet_row_uses_live_session_label() {
        let mut state = ClientState::new(10);
        let effects = reduce(&mut state, ClientEvent::PacketArrived(packet(1, -2.0)));
        let Some(Effect::Ui(UiEvent::PacketAppended(row))) = effects.first() else {
            panic!("패킷 행 없음: {effects:?}");
        };
        assert_eq!(row.session, "현재");
        assert!(row.highlight);
        assert_eq!(row.time, NOT_AVAILABLE);

        let mut state = active_state();
        let effects = reduce(&mut state, ClientEvent::PacketArrived(packet(2, 1.0)));
        let Some(Effect::Ui(UiEvent::PacketAppended(row))) = effects.first() else {
            panic!("패킷 행 없음: {effects:?}");
        };
        assert_eq!(row.session, "세션 5");
        assert!(!row.highlight);
        assert_eq!(state.packet_count, 1);
    }

    #[test]
    fn live_log_is_bounded() {
        let mut state = ClientState::new(3);
        for id in 1..=5 {
            reduce(&mut state, ClientEvent::PacketArrived(packet(id, 1.0)));
        }
        assert_eq!(state.packet_count, 5);
        assert_eq!(state.live_log_len(), 3);
        let ids: Vec<_> = state.live_log().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4", "5"]);
    }

    #[test]
    fn poll_tick_requires_db_and_single_flight() {
        let mut state = ClientState::new(10);
        assert!(reduce(&mut state, ClientEvent::PollTick).is_empty());

        reduce(&mut state, ClientEvent::DatabaseChecked(Ok(())));
        assert_eq!(reduce(&mut state, ClientEvent::PollTick), vec![Effect::Poll]);
        assert!(reduce(&mut state, ClientEvent::PollTick).is_empty());

        let effects = reduce(&mut state, ClientEvent::PollCompleted(Some(packet(7, 0.5))));
        assert!(!state.poll_in_flight);
        assert!(matches!(effects.first(), Some(Effect::Ui(UiEvent::PacketAppended(_)))));
        assert_eq!(reduce(&mut state, ClientEvent::PollTick), vec![Effect::Poll]);

        reduce(&mut state, ClientEvent::PollCompleted(None));
        assert_eq!(state.packet_count, 1);
    }

    #[test]
    fn database_loss_disables_history() {
        let mut state = ClientState::new(10);
        reduce(&mut state, ClientEvent::DatabaseChecked(Ok(())));
        assert!(state.snapshot().history_enabled);

        reduce(
            &mut state,
            ClientEvent::DatabaseChecked(Err(CoreError::Storage("refused".to_string()))),
        );
        assert!(!state.snapshot().history_enabled);
        let effects = reduce(&mut state, ClientEvent::UserRefreshSessions);
        assert!(!effects.contains(&Effect::LoadSessions));
        assert!(last_error(&effects).is_some());
    }

    #[test]
    fn open_session_entry() {
        let mut state = ClientState::new(10);
        reduce(&mut state, ClientEvent::DatabaseChecked(Ok(())));

        let effects = reduce(
            &mut state,
            ClientEvent::UserOpenSession("12: Test (2024-01-01 00:00:00 - Активна)".to_string()),
        );
        let Some(Effect::LoadSessionPackets(entry)) = effects.first() else {
            panic!("세션 패킷 로드 없음: {effects:?}");
        };
        assert_eq!(entry.id, SessionId(12));
        assert_eq!(entry.name, "Test");

        let effects = reduce(&mut state, ClientEvent::UserOpenSession("no colon".to_string()));
        assert!(last_error(&effects).is_some());
    }

    #[test]
    fn session_history_rows_and_empty_result() {
        let mut state = ClientState::new(10);
        let entry = SessionEntry {
            id: SessionId(4),
            name: "Run".to_string(),
            time_range: "a - b".to_string(),
        };
        let packets = vec![
            normalize_packet(packet(1, -1.0)).unwrap(),
            normalize_packet(packet(2, 1.0)).unwrap(),
        ];

        let effects = reduce(
            &mut state,
            ClientEvent::SessionPacketsLoaded {
                entry: entry.clone(),
                result: Ok(packets),
            },
        );
        let Some(Effect::Ui(UiEvent::SessionHistory { header, rows })) = effects.first() else {
            panic!("세션 기록 없음: {effects:?}");
        };
        assert_eq!(header, "세션: Run | 범위: a - b | 패킷: 2");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].session, "세션 4");
        assert!(rows[0].highlight);

        let effects = reduce(
            &mut state,
            ClientEvent::SessionPacketsLoaded {
                entry,
                result: Ok(Vec::new()),
            },
        );
        assert!(last_error(&effects).is_some());
    }

    #[test]
    fn server_status_message() {
        let mut state = connected_state();
        reduce(&mut state, ClientEvent::ServerStatus(Ok(())));
        assert_eq!(state.last_message, "HTTP: OK | 푸시: 연결됨");

        let mut state = ClientState::new(10);
        reduce(
            &mut state,
            ClientEvent::ServerStatus(Err(CoreError::Network("refused".to_string()))),
        );
        assert_eq!(state.last_message, "HTTP: ERROR | 푸시: 연결 끊김");
    }
}
