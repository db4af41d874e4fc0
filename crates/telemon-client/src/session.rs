//! 세션 컨트롤러.
//!
//! 제어 API 위에서 세션 생성, 생성 시작/중지를 수행하고 현재 세션 ID를 추적한다.

use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;
use telemon_core::error::CoreError;
use telemon_core::models::session::SessionId;
use telemon_core::ports::control::ControlApi;
use tracing::{debug, info};
use uuid::Uuid;

/// 현재 시각 기반 기본 세션 이름
pub fn default_session_name() -> String {
    format!("세션 {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}

pub struct SessionController {
    api: Arc<dyn ControlApi>,
    current: Mutex<Option<SessionId>>,
}

impl SessionController {
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        Self {
            api,
            current: Mutex::new(None),
        }
    }

    pub fn current_session(&self) -> Option<SessionId> {
        *self.current.lock()
    }

    /// 새 세션 생성. 재시도 간 동일한 멱등 키를 사용한다.
    pub async fn start_session(&self, name: &str) -> Result<SessionId, CoreError> {
        let key = Uuid::new_v4().to_string();
        debug!("세션 생성 요청: name={name}, key={key}");
        let id = self.api.start_session(name, &key).await?;
        info!("세션 생성됨: {id}");
        Ok(id)
    }

    /// 생성 시작. 성공 시 현재 세션으로 기록.
    pub async fn start_generation(&self, session_id: SessionId) -> Result<SessionId, CoreError> {
        self.api.start_generation(session_id).await?;
        *self.current.lock() = Some(session_id);
        Ok(session_id)
    }

    /// 생성 중지. 성공 시 현재 세션을 비운다.
    pub async fn stop_generation(&self) -> Result<(), CoreError> {
        let current = self.current_session();
        self.api.stop_generation(current).await?;
        let mut guard = self.current.lock();
        if *guard == current {
            *guard = None;
        }
        Ok(())
    }

    pub async fn status(&self) -> Result<(), CoreError> {
        self.api.status().await
    }
}
