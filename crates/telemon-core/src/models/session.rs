//! 세션 모델.
//!
//! 원격 서비스가 패킷을 생성하는 구간. 클라이언트는 읽기만 한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 서버가 할당한 세션 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 생성 세션 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// 세션 ID
    pub id: SessionId,
    /// 표시 이름
    pub name: String,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각 (진행 중이면 None)
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// 아직 종료되지 않은 세션인지
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_id_serializes_as_number() {
        let json = serde_json::to_string(&SessionId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn active_until_end_time_set() {
        let mut session = Session {
            id: SessionId(1),
            name: "Test".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ended_at: None,
        };
        assert!(session.is_active());

        session.ended_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
        assert!(!session.is_active());
    }
}
