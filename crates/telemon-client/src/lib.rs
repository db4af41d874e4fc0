//! # telemon-client
//!
//! 텔레메트리 모니터 클라이언트 코어.
//!
//! - [`state`]: 연결/생성/DB 상태 머신 (I/O 없는 리듀서)
//! - [`push`]: 푸시 연결 수명주기와 자동 재연결
//! - [`session`]: 세션 생성, 생성 시작/중지
//! - [`poller`]: DB 새 패킷 알림 폴링
//! - [`runtime`]: 이벤트 큐를 소비하는 단일 액터

pub mod events;
pub mod poller;
pub mod push;
pub mod runtime;
pub mod session;
pub mod state;
