//! UI 이벤트 버스.
//!
//! `tokio::broadcast` 기반. 액터가 발행하고 표시 계층이 구독한다.

use tokio::sync::broadcast;
use tracing::debug;

use crate::state::UiEvent;

pub struct UiEventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl UiEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 이벤트 발행. 구독자가 없으면 버린다.
    pub fn publish(&self, event: UiEvent) {
        debug!("UI 이벤트 발행: {:?}", std::mem::discriminant(&event));
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }
}

impl Default for UiEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
