//! 푸시 전송 포트.
//!
//! 구현: `telemon-network` crate (tokio-tungstenite 허브 전송)

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::normalize::RawPayload;

/// 전송 계층 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 연결 수립 (핸드셰이크 완료)
    Opened,
    /// 연결 종료 (정상 또는 원격 종료)
    Closed,
    /// 전송 에러. 이후 연결은 닫힌 것으로 간주한다.
    Error(String),
    /// 허브 메시지
    Message {
        /// 허브 타깃 이름
        target: String,
        /// 메시지 인자
        payload: RawPayload,
    },
}

/// 영속 푸시 연결
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// 연결 시작
    ///
    /// 이후 이벤트는 `events`로 전달된다. 연결 시도 자체는 백그라운드에서 진행되고
    /// 실패는 `TransportEvent::Error`로 보고된다.
    async fn start(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), CoreError>;

    /// 연결 중지. 이미 중지된 상태면 아무 것도 하지 않는다.
    async fn stop(&self);
}
