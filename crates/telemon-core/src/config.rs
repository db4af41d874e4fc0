//! 애플리케이션 설정 구조체.
//!
//! 텔레메트리 서버(제어 API, 푸시 허브), PostgreSQL 저장소, 클라이언트 주기 설정을 정의한다.
//! `config` crate를 통해 파일 → 환경변수 순으로 로드하고, CLI 오버라이드는 `main`에서 적용.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 텔레메트리 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 푸시 허브 연결 설정
    #[serde(default)]
    pub push: PushConfig,
    /// PostgreSQL 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 클라이언트 런타임 설정
    #[serde(default)]
    pub client: ClientConfig,
}

// ============================================================
// 서버 설정
// ============================================================

/// 텔레메트리 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 서버 호스트
    #[serde(default = "default_server_host")]
    pub host: String,
    /// 서버 포트
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// 푸시 허브 경로
    #[serde(default = "default_hub_path")]
    pub hub_path: String,
    /// 제어 API 경로
    #[serde(default = "default_api_path")]
    pub api_path: String,
    /// 세션/생성 시작 요청 타임아웃 (밀리초)
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
    /// 생성 중지 요청 타임아웃 (밀리초)
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    /// 상태 조회 타임아웃 (밀리초)
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,
    /// 일시적 실패 시 최대 재시도 횟수
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            hub_path: default_hub_path(),
            api_path: default_api_path(),
            start_timeout_ms: default_start_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            status_timeout_ms: default_status_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl ServerConfig {
    /// `http://{host}:{port}`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// 제어 API 기본 URL
    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url(), self.api_path)
    }

    /// 푸시 허브 WebSocket URL
    pub fn hub_url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.hub_path)
    }
}

// ============================================================
// 푸시 설정
// ============================================================

/// 푸시 허브 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// 패킷 알림 허브 타깃
    #[serde(default = "default_packet_target")]
    pub packet_target: String,
    /// 재연결 간격 (밀리초)
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// 최대 재연결 시도 횟수
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// keep-alive ping 주기 (밀리초)
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,
    /// 연결 + 핸드셰이크 타임아웃 (밀리초)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            packet_target: default_packet_target(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            keep_alive_ms: default_keep_alive_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

// ============================================================
// 데이터베이스 설정
// ============================================================

/// PostgreSQL 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// 데이터베이스 이름
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// search_path로 설정할 스키마
    #[serde(default = "default_db_schema")]
    pub schema: String,
    /// 새 패킷 알림 채널 (LISTEN)
    #[serde(default = "default_notify_channel")]
    pub notify_channel: String,
    /// 연결 획득 타임아웃 (밀리초)
    #[serde(default = "default_db_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: String::new(),
            schema: default_db_schema(),
            notify_channel: default_notify_channel(),
            connect_timeout_ms: default_db_connect_timeout_ms(),
        }
    }
}

// ============================================================
// 클라이언트 설정
// ============================================================

/// 클라이언트 런타임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// DB 알림 폴링 주기 (밀리초)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 단일 폴링 타임아웃 (밀리초)
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// 라이브 패킷 로그 최대 행 수
    #[serde(default = "default_live_log_capacity")]
    pub live_log_capacity: usize,
    /// 이벤트 큐 용량
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            live_log_capacity: default_live_log_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

/// 환경변수 오버라이드 (`SERVER_HOST`, `DB_PORT` 등 평면 키)
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    server_host: Option<String>,
    server_port: Option<u16>,
    db_host: Option<String>,
    db_port: Option<u16>,
    db_name: Option<String>,
    db_user: Option<String>,
    db_password: Option<String>,
    db_schema: Option<String>,
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 설정 파일(선택) → 환경변수 순으로 로드
    ///
    /// `env`가 `None`이면 프로세스 환경변수를 읽는다. 파일이 없으면 무시.
    pub fn load(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, CoreError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("설정 파일 로드: {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
        let mut loaded: AppConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| CoreError::Config(format!("설정 파일 파싱 실패: {e}")))?;

        let overrides: EnvOverrides = Config::builder()
            .add_source(Environment::default().source(env))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| CoreError::Config(format!("환경변수 파싱 실패: {e}")))?;

        loaded.apply_env(overrides);
        loaded.validate()?;
        Ok(loaded)
    }

    fn apply_env(&mut self, env: EnvOverrides) {
        if let Some(host) = env.server_host {
            self.server.host = host;
        }
        if let Some(port) = env.server_port {
            self.server.port = port;
        }
        if let Some(host) = env.db_host {
            self.database.host = host;
        }
        if let Some(port) = env.db_port {
            self.database.port = port;
        }
        if let Some(name) = env.db_name {
            self.database.name = name;
        }
        if let Some(user) = env.db_user {
            self.database.user = user;
        }
        if let Some(password) = env.db_password {
            self.database.password = password;
        }
        if let Some(schema) = env.db_schema {
            self.database.schema = schema;
        }
    }

    /// 값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.server.host.trim().is_empty() {
            return Err(CoreError::Config("서버 호스트가 비어 있음".to_string()));
        }
        if self.client.poll_interval_ms == 0 {
            return Err(CoreError::Config("폴링 주기는 0보다 커야 함".to_string()));
        }
        if self.client.live_log_capacity == 0 || self.client.event_queue_capacity == 0 {
            return Err(CoreError::Config("큐/로그 용량은 0보다 커야 함".to_string()));
        }
        if !self.server.hub_path.starts_with('/') || !self.server.api_path.starts_with('/') {
            return Err(CoreError::Config(
                "허브/API 경로는 '/'로 시작해야 함".to_string(),
            ));
        }
        Ok(())
    }

    /// 재연결 간격을 Duration으로 반환
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.push.reconnect_interval_ms)
    }

    /// 폴링 주기를 Duration으로 반환
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.client.poll_interval_ms)
    }

    /// 단일 폴링 타임아웃을 Duration으로 반환
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.client.poll_timeout_ms)
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_server_host() -> String {
    "localhost".to_string()
}
fn default_server_port() -> u16 {
    15233
}
fn default_hub_path() -> String {
    "/telemetryhub".to_string()
}
fn default_api_path() -> String {
    "/api/Telemetry".to_string()
}
fn default_start_timeout_ms() -> u64 {
    10_000
}
fn default_stop_timeout_ms() -> u64 {
    2_000
}
fn default_status_timeout_ms() -> u64 {
    5_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_packet_target() -> String {
    "NewPacket".to_string()
}
fn default_reconnect_interval_ms() -> u64 {
    30_000
}
fn default_max_reconnect_attempts() -> u32 {
    3
}
fn default_keep_alive_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_name() -> String {
    "Telemetry".to_string()
}
fn default_db_user() -> String {
    "postgres".to_string()
}
fn default_db_schema() -> String {
    "public".to_string()
}
fn default_notify_channel() -> String {
    "new_packet".to_string()
}
fn default_db_connect_timeout_ms() -> u64 {
    3_000
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_poll_timeout_ms() -> u64 {
    500
}
fn default_live_log_capacity() -> usize {
    5_000
}
fn default_event_queue_capacity() -> usize {
    256
}
