//! 텔레메트리 제어 API 클라이언트.
//!
//! `ControlApi` 포트 구현. 요청별 타임아웃 + 일시적 실패 재시도.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use telemon_core::config::ServerConfig;
use telemon_core::error::CoreError;
use telemon_core::models::session::SessionId;
use telemon_core::ports::control::ControlApi;
use tracing::{debug, info, warn};

/// 멱등성 키 헤더
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// 세션 ID 응답 필드 (우선순위 순)
const SESSION_ID_FIELDS: [&str; 3] = ["SessionId", "sessionId", "id"];

/// 재시도 가능한 에러인지 판별
///
/// 연결 실패와 500/502/503/504만 재시도한다.
fn is_retryable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_)
            | CoreError::Remote {
                status: Some(500 | 502 | 503 | 504),
                ..
            }
    )
}

/// 응답 본문에서 세션 ID 추출
///
/// `SessionId`, `sessionId`, `id` 순으로 첫 번째 양수 값을 사용한다. 숫자 문자열 허용.
pub fn parse_session_id(body: &Value) -> Option<SessionId> {
    SESSION_ID_FIELDS
        .iter()
        .filter_map(|field| body.get(field))
        .find_map(|value| {
            let id = match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            id.filter(|id| *id > 0).map(SessionId)
        })
}

/// REST 제어 API 클라이언트: `ControlApi` 포트 구현
pub struct HttpControlClient {
    client: reqwest::Client,
    base_url: String,
    start_timeout: Duration,
    stop_timeout: Duration,
    status_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpControlClient {
    /// 새 제어 API 클라이언트 생성
    ///
    /// `base_url`은 API 루트 (예: `http://localhost:15233/api/Telemetry`).
    pub fn new(base_url: &str, config: &ServerConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            start_timeout: Duration::from_millis(config.start_timeout_ms),
            stop_timeout: Duration::from_millis(config.stop_timeout_ms),
            status_timeout: Duration::from_millis(config.status_timeout_ms),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// 설정의 API URL로 생성
    pub fn from_config(config: &ServerConfig) -> Result<Self, CoreError> {
        Self::new(&config.api_url(), config)
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 첫 재시도 지연 설정 (이후 두 배씩 증가)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 요청 전송. 전송 단계 에러를 Timeout/Network로 매핑
    async fn send(
        &self,
        operation: &str,
        timeout: Duration,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CoreError> {
        let resp = request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                CoreError::Network(format!("{operation} 요청 실패: {e}"))
            }
        })?;
        Self::check_response(resp).await
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        Err(CoreError::remote(
            Some(status.as_u16()),
            format!("API 에러 ({status}): {text}"),
        ))
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s
    async fn execute_with_retry<F, Fut, T>(&self, operation: &str, call: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut delay = self.retry_delay;
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(result) => return Ok(result),
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{operation} 실패 (시도 {attempt}/{}): {e}, {delay:?} 후 재시도",
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ControlApi for HttpControlClient {
    async fn start_session(
        &self,
        name: &str,
        idempotency_key: &str,
    ) -> Result<SessionId, CoreError> {
        debug!("세션 생성 요청: name={name}, key={idempotency_key}");

        let body: Value = self
            .execute_with_retry("start_session", || async {
                let req = self
                    .client
                    .post(self.url("/sessions/start"))
                    .header(IDEMPOTENCY_HEADER, idempotency_key)
                    .json(&json!({ "name": name }));
                let resp = self.send("start_session", self.start_timeout, req).await?;
                let status = resp.status().as_u16();
                let text = resp
                    .text()
                    .await
                    .map_err(|e| CoreError::Network(format!("세션 응답 읽기 실패: {e}")))?;
                serde_json::from_str::<Value>(&text).map_err(|e| {
                    CoreError::remote(Some(status), format!("세션 응답 파싱 실패: {e}"))
                })
            })
            .await?;

        let session_id = parse_session_id(&body).ok_or_else(|| {
            CoreError::remote(None, format!("세션 ID 없는 응답: {body}"))
        })?;

        info!("세션 생성 완료: id={session_id}");
        Ok(session_id)
    }

    async fn start_generation(&self, session_id: SessionId) -> Result<(), CoreError> {
        debug!("패킷 생성 시작 요청: session={session_id}");

        self.execute_with_retry("start_generation", || async {
            let req = self
                .client
                .post(self.url("/start"))
                .json(&json!({ "sessionId": session_id }));
            self.send("start_generation", self.start_timeout, req).await?;
            Ok(())
        })
        .await?;

        info!("패킷 생성 시작: session={session_id}");
        Ok(())
    }

    async fn stop_generation(&self, session_id: Option<SessionId>) -> Result<(), CoreError> {
        debug!("패킷 생성 중지 요청: session={session_id:?}");

        let body = match session_id {
            Some(id) => json!({ "sessionId": id }),
            None => json!({}),
        };

        self.execute_with_retry("stop_generation", || async {
            let req = self.client.post(self.url("/stop")).json(&body);
            self.send("stop_generation", self.stop_timeout, req).await?;
            Ok(())
        })
        .await?;

        info!("패킷 생성 중지 완료");
        Ok(())
    }

    async fn status(&self) -> Result<(), CoreError> {
        self.execute_with_retry("status", || async {
            let req = self.client.get(self.url("/status"));
            self.send("status", self.status_timeout, req).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard, max_retries: u32) -> HttpControlClient {
        HttpControlClient::new(&server.url(), &ServerConfig::default())
            .unwrap()
            .with_max_retries(max_retries)
            .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn client_uses_configured_timeouts() {
        let config = ServerConfig::default();
        let client = HttpControlClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:15233/api/Telemetry");
        assert_eq!(client.start_timeout, Duration::from_secs(10));
        assert_eq!(client.stop_timeout, Duration::from_secs(2));
        assert_eq!(client.status_timeout, Duration::from_secs(5));
        assert_eq!(client.max_retries, 3);
    }

    #[test]
    fn is_retryable_errors() {
        assert!(is_retryable(&CoreError::Network("refused".to_string())));
        for status in [500, 502, 503, 504] {
            assert!(is_retryable(&CoreError::remote(Some(status), "x")));
        }
        assert!(!is_retryable(&CoreError::remote(Some(400), "x")));
        assert!(!is_retryable(&CoreError::remote(Some(501), "x")));
        assert!(!is_retryable(&CoreError::remote(None, "x")));
        assert!(!is_retryable(&CoreError::Timeout {
            operation: "stop_generation".to_string(),
            timeout_ms: 2_000,
        }));
    }

    #[test]
    fn session_id_field_precedence() {
        assert_eq!(
            parse_session_id(&json!({"SessionId": 1, "sessionId": 2, "id": 3})),
            Some(SessionId(1))
        );
        assert_eq!(parse_session_id(&json!({"sessionId": 2, "id": 3})), Some(SessionId(2)));
        assert_eq!(parse_session_id(&json!({"id": 3})), Some(SessionId(3)));
        // 비어 있거나 양수가 아니면 다음 필드
        assert_eq!(
            parse_session_id(&json!({"SessionId": null, "sessionId": 0, "id": "17"})),
            Some(SessionId(17))
        );
        assert_eq!(parse_session_id(&json!({"SessionId": "abc"})), None);
        assert_eq!(parse_session_id(&json!({})), None);
        assert_eq!(parse_session_id(&json!([1, 2])), None);
    }

    #[tokio::test]
    async fn start_session_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/sessions/start")
            .match_header(IDEMPOTENCY_HEADER, "key-1")
            .match_body(Matcher::Json(json!({"name": "run"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"SessionId": 7}"#)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let id = client.start_session("run", "key-1").await.unwrap();
        assert_eq!(id, SessionId(7));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_session_without_id_is_remote_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sessions/start")
            .with_status(200)
            .with_body(r#"{"message": "ok"}"#)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let result = client.start_session("run", "key-1").await;
        assert_matches!(result, Err(CoreError::Remote { status: None, .. }));
    }

    #[tokio::test]
    async fn start_session_non_json_is_remote_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sessions/start")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = client_for(&server, 0);
        let result = client.start_session("run", "key-1").await;
        assert_matches!(result, Err(CoreError::Remote { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn idempotency_key_is_stable_across_retries() {
        let mut server = mockito::Server::new_async().await;
        // 키가 달라지면 mock이 매칭되지 않아 재시도 횟수가 어긋난다
        let mock = server
            .mock("POST", "/sessions/start")
            .match_header(IDEMPOTENCY_HEADER, "stable-key")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = client_for(&server, 2);
        let result = client.start_session("run", "stable-key").await;
        assert_matches!(result, Err(CoreError::Remote { status: Some(503), .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/start")
            .with_status(400)
            .with_body("bad session")
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let result = client.start_generation(SessionId(1)).await;
        assert_matches!(result, Err(CoreError::Remote { status: Some(400), .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_generation_sends_session_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/start")
            .match_body(Matcher::Json(json!({"sessionId": 12})))
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        client.start_generation(SessionId(12)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stop_generation_with_and_without_session() {
        let mut server = mockito::Server::new_async().await;
        let with_id = server
            .mock("POST", "/stop")
            .match_body(Matcher::Json(json!({"sessionId": 4})))
            .with_status(200)
            .create_async()
            .await;
        let without_id = server
            .mock("POST", "/stop")
            .match_body(Matcher::Json(json!({})))
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server, 0);
        client.stop_generation(Some(SessionId(4))).await.unwrap();
        client.stop_generation(None).await.unwrap();
        with_id.assert_async().await;
        without_id.assert_async().await;
    }

    #[tokio::test]
    async fn status_reports_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/status")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server, 1);
        assert_matches!(
            client.status().await,
            Err(CoreError::Remote { status: Some(500), .. })
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let client = HttpControlClient::new("http://127.0.0.1:1/api", &ServerConfig::default())
            .unwrap()
            .with_max_retries(0);
        assert_matches!(client.status().await, Err(CoreError::Network(_)));
    }
}
