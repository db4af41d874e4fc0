//! 포트 인터페이스 (trait).
//!
//! 각 어댑터 crate가 이 trait들을 구현하며,
//! `telemon-app`에서 `Arc<dyn T>`로 와이어링한다.
//! 테스트는 같은 trait의 인메모리 구현을 주입한다.

pub mod control;
pub mod push;
pub mod store;
