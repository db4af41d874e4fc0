//! 새 패킷 알림 폴러.
//!
//! 저장소 알림 채널에서 알림을 하나 꺼내 패킷을 조회한다.
//! 알림 페이로드는 새 패킷의 ID(정수)다.

use std::sync::Arc;
use std::time::Duration;
use telemon_core::error::CoreError;
use telemon_core::normalize::RawPayload;
use telemon_core::ports::store::TelemetryStore;
use tracing::{debug, warn};

pub struct NotificationPoller {
    store: Arc<dyn TelemetryStore>,
    timeout: Duration,
}

impl NotificationPoller {
    pub fn new(store: Arc<dyn TelemetryStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// 알림 하나 처리. 알림이 없거나 실패하면 `None`.
    pub async fn poll(&self) -> Option<RawPayload> {
        match tokio::time::timeout(self.timeout, self.poll_once()).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                warn!("알림 폴링 실패: {e}");
                None
            }
            Err(_) => {
                warn!("알림 폴링 타임아웃 ({}ms)", self.timeout.as_millis());
                None
            }
        }
    }

    async fn poll_once(&self) -> Result<Option<RawPayload>, CoreError> {
        let Some(notification) = self.store.poll_notification().await? else {
            return Ok(None);
        };

        let id: i64 = notification.trim().parse().map_err(|_| {
            CoreError::Parse(format!("알림 페이로드가 패킷 ID가 아님: {notification:?}"))
        })?;

        match self.store.get_packet(id).await? {
            Some(packet) => {
                debug!("알림 패킷 조회: id={id}");
                Ok(Some(RawPayload::from(&packet)))
            }
            None => {
                debug!("알림된 패킷 없음: id={id}");
                Ok(None)
            }
        }
    }
}
