//! 표시용 포맷팅.
//!
//! 타임스탬프 문자열, 패킷 테이블 행, 세션 목록 항목의 생성과 파싱.
//! 프레젠테이션 레이어는 여기서 만든 평문 데이터만 받는다.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::models::packet::{PacketTimestamp, TelemetryPacket};
use crate::models::session::{Session, SessionId};

/// 표시 형식
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 표시 불가 센티널
pub const NOT_AVAILABLE: &str = "N/A";

/// 종료되지 않은 세션의 종료 시각 자리 표시
pub const ACTIVE_MARKER: &str = "진행 중";

/// 세션이 없는 라이브 패킷의 세션 열
pub const CURRENT_SESSION_LABEL: &str = "현재";

/// 패킷 테이블 열 제목
pub const PACKET_COLUMNS: [&str; 7] = ["ID", "카운터", "시간", "값", "CRC16", "상태", "세션"];

/// 타임스탬프를 `YYYY-MM-DD HH:MM:SS`로 포맷
///
/// epoch은 UTC 기준. 값이 없거나 0/빈 문자열이거나 파싱 실패 시 `"N/A"`.
pub fn format_timestamp(timestamp: Option<&PacketTimestamp>) -> String {
    let parsed = match timestamp {
        None => None,
        Some(PacketTimestamp::Epoch(secs)) => epoch_to_naive(*secs),
        Some(PacketTimestamp::Text(text)) if text.is_empty() => None,
        Some(PacketTimestamp::Text(text)) if text.contains('T') => parse_iso(text),
        Some(PacketTimestamp::Text(text)) => NaiveDateTime::parse_from_str(text, DISPLAY_FORMAT).ok(),
    };

    match parsed {
        Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        None => {
            if timestamp.is_some() {
                tracing::debug!("타임스탬프 형식 오류: {timestamp:?}");
            }
            NOT_AVAILABLE.to_string()
        }
    }
}

/// UTC 시각 포맷
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DISPLAY_FORMAT).to_string()
}

fn epoch_to_naive(secs: f64) -> Option<NaiveDateTime> {
    if secs == 0.0 || !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos).map(|dt| dt.naive_utc())
}

/// ISO 8601 날짜-시각. 오프셋이 있으면 적힌 벽시계 시각을 그대로 쓴다.
fn parse_iso(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// 패킷 테이블의 한 행
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRow {
    pub id: String,
    pub counter: String,
    pub time: String,
    /// 소수점 4자리
    pub payload: String,
    /// `0x` 접두 16진수
    pub checksum: String,
    pub status: String,
    pub session: String,
    /// 음수 payload 강조
    pub highlight: bool,
}

impl PacketRow {
    /// 패킷 → 행 변환. 세션 라벨이 없으면 "현재".
    pub fn from_packet(packet: &TelemetryPacket, session_label: Option<&str>) -> Self {
        Self {
            id: packet.id.to_string(),
            counter: packet.counter.to_string(),
            time: format_timestamp(packet.timestamp.as_ref()),
            payload: format!("{:.4}", packet.payload),
            checksum: format!("{:#x}", packet.checksum),
            status: packet.status().to_string(),
            session: session_label.unwrap_or(CURRENT_SESSION_LABEL).to_string(),
            highlight: packet.is_negative(),
        }
    }

    /// 열 순서대로 셀 반환
    pub fn cells(&self) -> [&str; 7] {
        [
            &self.id,
            &self.counter,
            &self.time,
            &self.payload,
            &self.checksum,
            &self.status,
            &self.session,
        ]
    }
}

/// 세션 목록 항목을 파싱한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub id: SessionId,
    pub name: String,
    pub time_range: String,
}

/// `"{id}: {name} ({start} - {end})"` 형식의 세션 목록 항목 생성
pub fn format_session_entry(session: &Session) -> String {
    let end = session
        .ended_at
        .as_ref()
        .map(format_datetime)
        .unwrap_or_else(|| ACTIVE_MARKER.to_string());
    format!(
        "{}: {} ({} - {})",
        session.id,
        session.name,
        format_datetime(&session.started_at),
        end
    )
}

/// 세션 목록 항목 파싱
///
/// 콜론이 없거나 ID가 숫자가 아니면 `CoreError::Parse`.
/// 괄호가 없으면 이름 전체를 쓰고 범위는 `"N/A"`.
pub fn parse_session_entry(text: &str) -> Result<SessionEntry, CoreError> {
    let Some((id_part, rest)) = text.split_once(':') else {
        return Err(CoreError::Parse(format!("잘못된 세션 형식: {text}")));
    };

    let id_str = id_part.trim();
    if id_str.is_empty() || !id_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::Parse(format!("잘못된 세션 ID 형식: {id_str}")));
    }
    let id = id_str
        .parse::<i64>()
        .map_err(|e| CoreError::Parse(format!("세션 ID 범위 초과: {id_str} ({e})")))?;

    let rest = rest.trim();
    let (name, time_range) = match rest.split_once('(') {
        Some((name_part, time_part)) if rest.contains(')') => {
            let range = time_part.split(')').next().unwrap_or_default();
            (name_part.trim().to_string(), range.trim().to_string())
        }
        _ => (rest.to_string(), NOT_AVAILABLE.to_string()),
    };

    Ok(SessionEntry {
        id: SessionId(id),
        name,
        time_range,
    })
}

/// 세션 기록 헤더
pub fn format_session_header(entry: &SessionEntry, packet_count: usize) -> String {
    format!(
        "세션: {} | 범위: {} | 패킷: {}",
        entry.name, entry.time_range, packet_count
    )
}
