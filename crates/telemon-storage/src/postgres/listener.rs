//! LISTEN/NOTIFY 전달 태스크.
//!
//! `PgListener`가 받은 알림 페이로드를 유한 채널로 넘긴다.
//! 채널이 가득 차면 가장 새 알림을 버린다.

use sqlx::postgres::{PgListener, PgPool};
use std::time::Duration;
use telemon_core::error::CoreError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::storage_error;

/// 알림 큐 용량
const NOTIFICATION_CAPACITY: usize = 64;

/// 수신 에러 후 재시도 지연
const RECV_RETRY_DELAY: Duration = Duration::from_secs(1);

pub(super) struct ListenerHandle {
    channel: String,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(super) fn is_running_on(&self, channel: &str) -> bool {
        self.channel == channel && !self.task.is_finished()
    }

    pub(super) fn abort(&self) {
        self.task.abort();
    }
}

/// 채널 구독 후 전달 태스크 시작
pub(super) async fn spawn(
    pool: &PgPool,
    channel: &str,
) -> Result<(ListenerHandle, mpsc::Receiver<String>), CoreError> {
    let mut listener = PgListener::connect_with(pool)
        .await
        .map_err(|e| storage_error("알림 리스너 연결 실패", e))?;
    listener
        .listen(channel)
        .await
        .map_err(|e| storage_error("LISTEN 실패", e))?;

    let (tx, rx) = mpsc::channel(NOTIFICATION_CAPACITY);
    let name = channel.to_string();
    let task = tokio::spawn(async move {
        loop {
            match listener.recv().await {
                Ok(notification) => {
                    let payload = notification.payload().to_string();
                    debug!("알림 수신 ({name}): {payload}");
                    match tx.try_send(payload) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(dropped)) => {
                            warn!("알림 큐 가득 참, 폐기: {dropped}");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
                Err(e) => {
                    // 다음 recv에서 자동 재연결
                    warn!("알림 수신 실패 ({name}): {e}");
                    tokio::time::sleep(RECV_RETRY_DELAY).await;
                }
            }
        }
        info!("알림 전달 태스크 종료: {name}");
    });

    Ok((
        ListenerHandle {
            channel: channel.to_string(),
            task,
        },
        rx,
    ))
}
