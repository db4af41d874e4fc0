//! 텔레메트리 패킷 모델.
//!
//! 푸시 알림 파싱 또는 DB 행 조회로 생성되며, 생성 후 변경되지 않는다.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::session::SessionId;

/// 패킷 타임스탬프 원본 값
///
/// 서버는 epoch 초(double)를 보내지만 과거 드래프트는 ISO 문자열을 보냈다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacketTimestamp {
    /// Unix epoch (초, 소수 허용)
    Epoch(f64),
    /// 문자열 날짜/시각
    Text(String),
}

/// 패킷 처리 상태. payload 부호로 결정된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketStatus {
    /// 정상 값
    #[serde(rename = "OK")]
    Ok,
    /// 음수 payload
    NegativeValue,
}

impl PacketStatus {
    /// payload < 0 이면 `NegativeValue`, 그 외(0, -0.0, NaN 포함)는 `Ok`
    pub fn from_payload(payload: f64) -> Self {
        if payload < 0.0 {
            Self::NegativeValue
        } else {
            Self::Ok
        }
    }

    /// 표시용 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NegativeValue => "NegativeValue",
        }
    }
}

impl fmt::Display for PacketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 단일 텔레메트리 측정값
///
/// 직렬화 필드명은 허브 알림 레코드와 동일하다 (`counter`, `crc16`, `sessionId`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPacket {
    /// 패킷 ID
    pub id: i64,
    /// 패킷 카운터 (세션 내 단조 증가)
    pub counter: i64,
    /// 생성 시각
    pub timestamp: Option<PacketTimestamp>,
    /// 측정값
    pub payload: f64,
    /// CRC16 체크섬
    #[serde(rename = "crc16")]
    pub checksum: u16,
    /// 소속 세션
    pub session_id: Option<SessionId>,
}

impl TelemetryPacket {
    /// 파생 상태
    pub fn status(&self) -> PacketStatus {
        PacketStatus::from_payload(self.payload)
    }

    /// 강조 표시 여부 (음수 payload)
    pub fn is_negative(&self) -> bool {
        self.status() == PacketStatus::NegativeValue
    }
}
