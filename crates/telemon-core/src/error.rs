//! Telemon 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 라이브러리 에러를 `CoreError`로 매핑해서 반환한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 푸시 채널 실패 (연결 끊김, 핸드셰이크 실패 등)
    #[error("전송 에러: {0}")]
    Transport(String),

    /// 제어 API 비정상 응답 (non-2xx 또는 응답 형식 오류)
    #[error("원격 에러 ({}): {message}", status.map_or_else(|| "-".to_string(), |s| s.to_string()))]
    Remote {
        /// HTTP 상태 코드 (응답 파싱 실패 시 None)
        status: Option<u16>,
        /// 실패 사유
        message: String,
    },

    /// 제어 API 도달 불가 (연결 거부, DNS 실패)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("{operation} 타임아웃: {timeout_ms}ms 초과")]
    Timeout {
        /// 타임아웃된 작업 이름
        operation: String,
        /// 타임아웃 (밀리초)
        timeout_ms: u64,
    },

    /// 데이터베이스 연결/쿼리 실패
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 패킷 페이로드 또는 세션 목록 항목 형식 오류
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),
}

impl CoreError {
    /// 원격 에러 생성 헬퍼
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display_includes_status() {
        let err = CoreError::remote(Some(503), "unavailable");
        assert_eq!(err.to_string(), "원격 에러 (503): unavailable");

        let err = CoreError::remote(None, "missing id");
        assert_eq!(err.to_string(), "원격 에러 (-): missing id");
    }

    #[test]
    fn timeout_display() {
        let err = CoreError::Timeout {
            operation: "stop_generation".to_string(),
            timeout_ms: 2_000,
        };
        assert!(err.to_string().contains("2000ms"));
    }
}
