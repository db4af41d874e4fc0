//! # telemon-core
//!
//! Telemon 도메인 모델, 포트(trait) 정의, 에러 타입, 설정.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 세션/패킷 데이터 구조체
//! - [`ports`]: 푸시 전송, 제어 API, 저장소 포트 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 애플리케이션 설정 (`config` crate 로더)
//! - [`normalize`]: 인바운드 패킷 정규화
//! - [`display`]: 표시용 포맷팅

pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod normalize;
pub mod ports;
