//! PostgreSQL 저장소 어댑터.
//!
//! `TelemetryStore` 포트 구현.
//!
//! # 모듈 구조
//! - `sessions`: `"Sessions"` 테이블 조회
//! - `packets`: `"Packets"` 테이블 조회 + 행 변환
//! - `listener`: LISTEN/NOTIFY 전달 태스크

mod listener;
mod packets;
mod sessions;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use telemon_core::config::DatabaseConfig;
use telemon_core::error::CoreError;
use telemon_core::models::packet::TelemetryPacket;
use telemon_core::models::session::{Session, SessionId};
use telemon_core::ports::store::TelemetryStore;
use tokio::sync::mpsc;
use tracing::{debug, info};

use listener::ListenerHandle;

/// 최대 풀 연결 수
const MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL 저장소: `TelemetryStore` 포트 구현
pub struct PgTelemetryStore {
    pub(super) pool: PgPool,
    listener: Mutex<Option<ListenerHandle>>,
    notifications: Mutex<Option<mpsc::Receiver<String>>>,
    closed: AtomicBool,
}

impl PgTelemetryStore {
    /// 지연 연결 풀 생성
    ///
    /// 실제 연결은 첫 쿼리에서 이뤄지므로 DB가 내려가 있어도 생성은 실패하지 않는다.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .options([("search_path", config.schema.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
            .connect_lazy_with(options);

        info!(
            "PostgreSQL 저장소 준비: {}:{}/{} (schema={})",
            config.host, config.port, config.name, config.schema
        );

        Self {
            pool,
            listener: Mutex::new(None),
            notifications: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("저장소가 이미 닫힘".to_string()));
        }
        Ok(())
    }
}

/// sqlx 에러 → CoreError
pub(super) fn storage_error(context: &str, e: sqlx::Error) -> CoreError {
    CoreError::Storage(format!("{context}: {e}"))
}

#[async_trait]
impl TelemetryStore for PgTelemetryStore {
    async fn ping(&self) -> Result<(), CoreError> {
        self.ensure_open()?;
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("DB 연결 확인 실패", e))?;
        debug!("DB 연결 확인 완료");
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, CoreError> {
        self.ensure_open()?;
        self.fetch_sessions().await
    }

    async fn list_session_packets(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<TelemetryPacket>, CoreError> {
        self.ensure_open()?;
        self.fetch_session_packets(session_id).await
    }

    async fn get_packet(&self, id: i64) -> Result<Option<TelemetryPacket>, CoreError> {
        self.ensure_open()?;
        self.fetch_packet(id).await
    }

    async fn listen(&self, channel: &str) -> Result<(), CoreError> {
        self.ensure_open()?;
        if let Some(handle) = self.listener.lock().as_ref() {
            if handle.is_running_on(channel) {
                debug!("이미 구독 중인 채널: {channel}");
                return Ok(());
            }
        }

        let (handle, rx) = listener::spawn(&self.pool, channel).await?;
        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }
        *self.notifications.lock() = Some(rx);
        info!("알림 채널 구독: {channel}");
        Ok(())
    }

    async fn poll_notification(&self) -> Result<Option<String>, CoreError> {
        self.ensure_open()?;
        let mut guard = self.notifications.lock();
        let Some(rx) = guard.as_mut() else {
            return Ok(None);
        };
        match rx.try_recv() {
            Ok(payload) => Ok(Some(payload)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                *guard = None;
                Err(CoreError::Storage("알림 전달 태스크 종료됨".to_string()))
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
        self.notifications.lock().take();
        self.pool.close().await;
        info!("PostgreSQL 연결 풀 종료");
    }
}
