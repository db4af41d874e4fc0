//! # telemon-storage
//!
//! 텔레메트리 저장소 어댑터.
//! 원격 서비스가 기록한 세션/패킷을 PostgreSQL에서 읽고,
//! 새 패킷 알림(LISTEN/NOTIFY)을 폴링 가능한 큐로 전달한다.
//!
//! ## 모듈
//! - `postgres`: `TelemetryStore` 포트 구현 (sqlx)

pub mod postgres;
