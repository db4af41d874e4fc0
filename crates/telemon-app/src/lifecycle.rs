//! 라이프사이클 관리.
//!
//! 종료 신호(콘솔 `quit`, SIGINT, SIGTERM)를 하나의 watch 채널로 모은다.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    /// 종료 신호 발송. 이미 발송됐으면 무시.
    pub fn shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("종료 신호 발송");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// OS 시그널 대기 (SIGINT, SIGTERM). 핸들러 등록 실패는 에러로 반환.
    pub async fn wait_for_signal(&self) -> Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint =
                signal(SignalKind::interrupt()).context("SIGINT 핸들러 등록 실패")?;
            let mut sigterm =
                signal(SignalKind::terminate()).context("SIGTERM 핸들러 등록 실패")?;

            tokio::select! {
                _ = sigint.recv() => info!("SIGINT 수신"),
                _ = sigterm.recv() => info!("SIGTERM 수신"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .context("Ctrl+C 핸들러 등록 실패")?;
            info!("Ctrl+C 수신");
        }

        self.shutdown();
        Ok(())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let lm = LifecycleManager::new();
        assert!(!lm.is_shutting_down());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let lm = LifecycleManager::default();
        lm.shutdown();
        lm.shutdown();
        assert!(lm.is_shutting_down());
    }
}
