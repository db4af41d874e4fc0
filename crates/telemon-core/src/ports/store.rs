//! 텔레메트리 저장소 포트.
//!
//! 구현: `telemon-storage` crate (sqlx PostgreSQL)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::packet::TelemetryPacket;
use crate::models::session::{Session, SessionId};

/// 세션/패킷 저장소 (읽기 전용) + 새 패킷 알림 채널
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// 연결 확인
    async fn ping(&self) -> Result<(), CoreError>;

    /// 세션 목록 (최신순)
    async fn list_sessions(&self) -> Result<Vec<Session>, CoreError>;

    /// 세션의 패킷 목록 (타임스탬프 오름차순)
    async fn list_session_packets(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<TelemetryPacket>, CoreError>;

    /// ID로 패킷 조회
    async fn get_packet(&self, id: i64) -> Result<Option<TelemetryPacket>, CoreError>;

    /// 알림 채널 구독
    async fn listen(&self, channel: &str) -> Result<(), CoreError>;

    /// 대기 중인 알림 하나를 꺼낸다 (블로킹하지 않음)
    async fn poll_notification(&self) -> Result<Option<String>, CoreError>;

    /// 연결 풀 종료
    async fn close(&self);
}
