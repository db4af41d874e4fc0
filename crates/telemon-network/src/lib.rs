//! # telemon-network
//!
//! 텔레메트리 서버 네트워크 어댑터.
//! 제어 API(REST)와 푸시 허브(WebSocket) 통신을 담당한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use telemon_network::control_client::HttpControlClient;
//! use telemon_network::hub_transport::HubTransport;
//!
//! let control = HttpControlClient::from_config(&config.server)?;
//! let hub = HubTransport::from_config(&config.server, &config.push);
//! ```

pub mod control_client;
pub mod hub_transport;
