//! 콘솔 프레젠테이션.
//!
//! 표준 입력 명령 → [`ClientEvent`], [`UiEvent`] → 표준 출력 텍스트.

use telemon_client::runtime::ClientHandle;
use telemon_client::state::{ClientEvent, UiEvent, UiSnapshot};
use telemon_core::display::{PacketRow, PACKET_COLUMNS};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

pub const HELP: &str = "\
명령:
  connect          서버 연결 / 연결 끊기
  start            세션 생성 후 패킷 생성 시작
  stop             패킷 생성 중지
  sessions         세션 목록 (DB)
  open <항목|ID>   세션 기록 조회 (DB)
  status           서버 상태 확인
  db               DB 연결 재확인
  state            현재 상태 표시
  help             도움말
  quit             종료";

/// 콘솔 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleConnect,
    Start,
    Stop,
    Sessions,
    Open(String),
    Status,
    Database,
    State,
    Help,
    Quit,
}

impl Command {
    /// 입력 한 줄 파싱. 빈 줄이면 `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "connect" | "disconnect" | "c" => Self::ToggleConnect,
            "start" => Self::Start,
            "stop" => Self::Stop,
            "sessions" | "ls" => Self::Sessions,
            "open" => {
                if rest.is_empty() {
                    return Err("open: 세션 항목 또는 ID가 필요합니다".to_string());
                }
                // 숫자만 주면 "ID:" 형태의 항목으로 만든다
                if rest.chars().all(|c| c.is_ascii_digit()) {
                    Self::Open(format!("{rest}:"))
                } else {
                    Self::Open(rest.to_string())
                }
            }
            "status" => Self::Status,
            "db" => Self::Database,
            "state" => Self::State,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("알 수 없는 명령: {other} (help 참고)")),
        };
        Ok(Some(command))
    }

    /// 런타임 입력 이벤트. 로컬 명령이면 `None`.
    pub fn into_event(self) -> Option<ClientEvent> {
        match self {
            Self::ToggleConnect => Some(ClientEvent::UserToggleConnect),
            Self::Start => Some(ClientEvent::UserStartGeneration),
            Self::Stop => Some(ClientEvent::UserStopGeneration),
            Self::Sessions => Some(ClientEvent::UserRefreshSessions),
            Self::Open(entry) => Some(ClientEvent::UserOpenSession(entry)),
            Self::Status => Some(ClientEvent::UserCheckStatus),
            Self::Database => Some(ClientEvent::UserCheckDatabase),
            Self::State | Self::Help | Self::Quit => None,
        }
    }
}

// ============================================================
// 렌더링
// ============================================================

fn render_row(row: &PacketRow) -> String {
    let marker = if row.highlight { "!" } else { " " };
    format!("{marker} {}", row.cells().join(" | "))
}

fn render_columns() -> String {
    format!("  {}", PACKET_COLUMNS.join(" | "))
}

/// 상태 스냅샷 상세 출력
pub fn render_snapshot(snapshot: &UiSnapshot) -> Vec<String> {
    let flag = |enabled: bool| if enabled { "가능" } else { "불가" };
    vec![
        snapshot.status_line.clone(),
        format!(
            "[{}: {}] [시작: {}] [중지: {}] [기록: {}]",
            snapshot.connect_label,
            flag(snapshot.connect_enabled),
            flag(snapshot.start_enabled),
            flag(snapshot.stop_enabled),
            flag(snapshot.history_enabled),
        ),
        format!("수신 패킷: {}", snapshot.packet_count),
    ]
}

/// UI 이벤트 → 출력 줄
pub fn render(event: &UiEvent) -> Vec<String> {
    match event {
        UiEvent::StateChanged(snapshot) => {
            let mut line = format!("[상태] {}", snapshot.status_line);
            if !snapshot.last_message.is_empty() {
                line.push_str(&format!(" | {}", snapshot.last_message));
            }
            vec![line]
        }
        UiEvent::PacketAppended(row) => vec![render_row(row)],
        UiEvent::LiveLogCleared => vec!["[라이브 로그 초기화]".to_string(), render_columns()],
        UiEvent::SessionList(entries) if entries.is_empty() => {
            vec!["세션이 없습니다".to_string()]
        }
        UiEvent::SessionList(entries) => {
            let mut lines = vec![format!("세션 {}개:", entries.len())];
            lines.extend(entries.iter().map(|entry| format!("  {entry}")));
            lines
        }
        UiEvent::SessionHistory { header, rows } => {
            let mut lines = vec![header.clone(), render_columns()];
            lines.extend(rows.iter().map(render_row));
            lines
        }
        UiEvent::Error(message) => vec![format!("[오류] {message}")],
        UiEvent::Info(message) => vec![format!("[정보] {message}")],
        UiEvent::ConnectionLost => vec!["[경고] 서버 연결이 끊어졌습니다".to_string()],
    }
}

// ============================================================
// 입출력 루프
// ============================================================

/// UI 이벤트 출력 루프. 마지막 스냅샷을 `latest`에 보관한다.
pub async fn print_events(
    mut events: broadcast::Receiver<UiEvent>,
    latest: watch::Sender<Option<UiSnapshot>>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let UiEvent::StateChanged(snapshot) = &event {
                    latest.send_replace(Some(snapshot.clone()));
                }
                for line in render(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("UI 이벤트 {skipped}개 건너뜀");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("출력 루프 종료");
}

/// 표준 입력 명령 루프. `quit` 또는 입력 종료(EOF) 시 반환.
pub async fn read_commands(
    handle: ClientHandle,
    latest: watch::Receiver<Option<UiSnapshot>>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");

    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("[오류] {message}");
                continue;
            }
        };

        match command {
            Command::Quit => return Ok(()),
            Command::Help => println!("{HELP}"),
            Command::State => match latest.borrow().as_ref() {
                Some(snapshot) => {
                    for line in render_snapshot(snapshot) {
                        println!("{line}");
                    }
                }
                None => println!("상태 정보 없음"),
            },
            other => {
                if let Some(event) = other.into_event() {
                    handle.send(event).await?;
                }
            }
        }
    }
    debug!("표준 입력 종료");
    Ok(())
}
