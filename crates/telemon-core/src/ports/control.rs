//! 제어 API 포트.
//!
//! 구현: `telemon-network` crate (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::session::SessionId;

/// 텔레메트리 서버 제어 API
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// 세션 생성
    ///
    /// `idempotency_key`는 재시도 간 동일하게 전송된다.
    async fn start_session(&self, name: &str, idempotency_key: &str)
        -> Result<SessionId, CoreError>;

    /// 세션의 패킷 생성 시작
    async fn start_generation(&self, session_id: SessionId) -> Result<(), CoreError>;

    /// 패킷 생성 중지
    async fn stop_generation(&self, session_id: Option<SessionId>) -> Result<(), CoreError>;

    /// 서버 상태 조회 (도달 가능 여부)
    async fn status(&self) -> Result<(), CoreError>;
}
