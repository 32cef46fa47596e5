//! Reference processing backend over HTTP.
//!
//! Item payloads are POSTed as JSON to a configured target; the service
//! answers with a small control envelope:
//!
//! ```text
//! { "gate": 1, "complete": false, "response": { ... }, "error": { "message": "...", "no_retry": true } }
//! ```
//!
//! A non-null `error` wins over the HTTP status code, and `no_retry` there is
//! the only way a backend can fail an item without burning through its
//! retries.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::processor::{ProcessError, Processor, ProcessorResponse};

pub const DEFAULT_HEALTH_ENDPOINT: &str = "/healthcheck";

/// [`Processor`] adapter for a remote JSON service.
pub struct HttpProcessor {
    client: reqwest::Client,
    target: String,
    health_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    gate: i64,
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    response: Map<String, Value>,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    no_retry: bool,
}

impl HttpProcessor {
    pub fn new(client: reqwest::Client, target: impl Into<String>) -> Self {
        Self {
            client,
            target: target.into(),
            health_endpoint: None,
        }
    }

    /// Enable the GET healthcheck against `target + endpoint`. Without this,
    /// the processor healthcheck always succeeds.
    pub fn with_health_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.health_endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl Processor for HttpProcessor {
    async fn process(&self, payload: &[u8]) -> Result<ProcessorResponse, ProcessError> {
        let response = self
            .client
            .post(&self.target)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|err| ProcessError::retryable(format!("request failed: {err}")))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ProcessError::retryable(format!("reading response failed: {err}")))?;

        let envelope: Envelope = serde_json::from_slice(&body).map_err(|err| {
            ProcessError::retryable(format!(
                "decode error: {err}, from request with status HTTP {}",
                status.as_u16()
            ))
        })?;

        if let Some(remote) = envelope.error {
            let message = format!(
                "Status HTTP {}; message: {}",
                status.as_u16(),
                remote.message
            );
            return Err(if remote.no_retry {
                ProcessError::non_retryable(message)
            } else {
                ProcessError::retryable(message)
            });
        }

        if !status.is_success() {
            return Err(ProcessError::retryable(format!("HTTP {}", status.as_u16())));
        }

        let data = serde_json::to_vec(&envelope.response)
            .map_err(|err| ProcessError::retryable(format!("re-encoding response failed: {err}")))?;
        Ok(ProcessorResponse {
            next_gate: envelope.gate,
            complete: envelope.complete,
            data,
        })
    }

    async fn healthcheck(&self) -> anyhow::Result<()> {
        let Some(endpoint) = &self.health_endpoint else {
            return Ok(());
        };
        let url = format!(
            "{}/{}",
            self.target.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let response = self.client.get(&url).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;

    /// Serve one canned response on an ephemeral port, returning the base URL.
    async fn spawn_stub(status: u16, body: &'static str) -> String {
        let app = Router::new()
            .route(
                "/",
                post(move || async move {
                    (StatusCode::from_u16(status).unwrap(), body.to_string())
                }),
            )
            .route(
                "/healthcheck",
                get(move || async move {
                    (StatusCode::from_u16(status).unwrap(), body.to_string())
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });
        format!("http://{addr}/")
    }

    fn processor(target: String) -> HttpProcessor {
        HttpProcessor::new(reqwest::Client::new(), target)
    }

    #[tokio::test]
    async fn successful_response_carries_gate_and_data() {
        let target =
            spawn_stub(200, r#"{"gate": 1, "complete": false, "response": {"data": 1}}"#).await;
        let response = processor(target).process(b"{}").await.unwrap();
        assert_eq!(response.next_gate, 1);
        assert!(!response.complete);
        let data: Value = serde_json::from_slice(&response.data).unwrap();
        assert_eq!(data, serde_json::json!({"data": 1}));
    }

    #[tokio::test]
    async fn completed_response_sets_complete() {
        let target =
            spawn_stub(200, r#"{"gate": 2, "complete": true, "response": {"done": true}}"#).await;
        let response = processor(target).process(b"{}").await.unwrap();
        assert_eq!(response.next_gate, 2);
        assert!(response.complete);
    }

    #[tokio::test]
    async fn envelope_fields_default_when_absent() {
        let target = spawn_stub(200, "{}").await;
        let response = processor(target).process(b"{}").await.unwrap();
        assert_eq!(response.next_gate, 0);
        assert!(!response.complete);
        let data: Value = serde_json::from_slice(&response.data).unwrap();
        assert_eq!(data, serde_json::json!({}));
    }

    #[tokio::test]
    async fn no_retry_error_is_non_retryable() {
        let target = spawn_stub(500, r#"{"error": {"message": "boom", "no_retry": true}}"#).await;
        let err = processor(target).process(b"{}").await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Status HTTP 500; message: boom");
    }

    #[tokio::test]
    async fn envelope_error_overrides_http_status() {
        let target = spawn_stub(200, r#"{"error": {"message": "x"}}"#).await;
        let err = processor(target).process(b"{}").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Status HTTP 200; message: x");
    }

    #[tokio::test]
    async fn bare_http_failure_is_retryable() {
        let target = spawn_stub(400, "{}").await;
        let err = processor(target).process(b"{}").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "HTTP 400");
    }

    #[tokio::test]
    async fn undecodable_body_is_retryable_and_names_the_status() {
        let target = spawn_stub(200, r#"{"":"#).await;
        let err = processor(target).process(b"{}").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("HTTP 200"), "got: {err}");
    }

    #[tokio::test]
    async fn healthcheck_without_endpoint_always_passes() {
        let p = processor("http://127.0.0.1:1/".to_string());
        p.healthcheck().await.unwrap();
    }

    #[tokio::test]
    async fn healthcheck_follows_endpoint_status() {
        let target = spawn_stub(200, "OK").await;
        processor(target)
            .with_health_endpoint(DEFAULT_HEALTH_ENDPOINT)
            .healthcheck()
            .await
            .unwrap();

        let target = spawn_stub(500, "down").await;
        let err = processor(target)
            .with_health_endpoint(DEFAULT_HEALTH_ENDPOINT)
            .healthcheck()
            .await;
        assert!(err.is_err());
    }
}
