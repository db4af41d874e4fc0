//! Telemon 도메인 모델.
//!
//! 제어 서버, 푸시 허브, 데이터베이스가 공유하는 데이터 구조체를 정의한다.

pub mod packet;
pub mod session;
