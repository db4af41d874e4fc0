//! 인바운드 패킷 정규화.
//!
//! 허브 알림 인자(문자열/리스트/객체)와 DB 알림으로 조회한 레코드를
//! 하나의 [`TelemetryPacket`]으로 변환한다. 실패는 "폐기"이며 호출자가 로그만 남긴다.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::models::packet::{PacketTimestamp, TelemetryPacket};
use crate::models::session::SessionId;

/// 정규화 전 원본 페이로드
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// 구조화 데이터로 파싱해야 하는 텍스트
    Text(String),
    /// 값 목록 (허브 invocation 인자)
    Sequence(Vec<Value>),
    /// 레코드 (필드 맵)
    Record(Map<String, Value>),
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            Value::Array(items) => Self::Sequence(items),
            Value::Object(map) => Self::Record(map),
            // 스칼라는 텍스트로 취급 → 파싱 후 레코드가 아니므로 폐기된다
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&TelemetryPacket> for RawPayload {
    fn from(packet: &TelemetryPacket) -> Self {
        match serde_json::to_value(packet) {
            Ok(Value::Object(map)) => Self::Record(map),
            Ok(other) => Self::from(other),
            Err(e) => Self::Text(format!("<직렬화 실패: {e}>")),
        }
    }
}

/// 원본 페이로드를 패킷으로 정규화
///
/// 순서: 텍스트 파싱 → 시퀀스면 첫 원소 → 레코드 확인 → 기본값 포함 필드 추출.
pub fn normalize_packet(raw: RawPayload) -> Result<TelemetryPacket, CoreError> {
    let value = match raw {
        RawPayload::Text(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| CoreError::Parse(format!("JSON 디코딩 실패: {e}")))?,
        RawPayload::Sequence(items) => Value::Array(items),
        RawPayload::Record(map) => Value::Object(map),
    };

    let value = match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Parse("빈 시퀀스".to_string()))?,
        other => other,
    };

    let Value::Object(record) = value else {
        return Err(CoreError::Parse(format!(
            "레코드가 아닌 페이로드: {}",
            value_kind(&value)
        )));
    };

    Ok(TelemetryPacket {
        id: int_field(&record, "id").unwrap_or(0),
        counter: int_field(&record, "counter")
            .or_else(|| int_field(&record, "packetCounter"))
            .unwrap_or(0),
        timestamp: timestamp_field(&record),
        payload: record
            .get("payload")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        checksum: record
            .get("crc16")
            .and_then(Value::as_u64)
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(0),
        session_id: int_field(&record, "sessionId").map(SessionId),
    })
}

/// 정수 필드 (정수형 실수 허용)
fn int_field(record: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = record.get(key)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn timestamp_field(record: &Map<String, Value>) -> Option<PacketTimestamp> {
    match record.get("timestamp")? {
        Value::Number(n) => n.as_f64().map(PacketTimestamp::Epoch),
        Value::String(s) => Some(PacketTimestamp::Text(s.clone())),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
