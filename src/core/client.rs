//! Boundary to the external text-generation service.
//!
//! One `invoke` is one attempt. The client reports what went wrong and
//! never substitutes content of its own; deciding to fall back is the
//! pipeline's job.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::core::config::PipelineConfig;

/// Longest response body kept in a [`GenerationError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service is not configured")]
    Disabled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response envelope: {0}")]
    Envelope(String),
    #[error("completion is not a single JSON document: {0}")]
    NotJson(String),
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// False when the credentials the service needs are missing.
    fn enabled(&self) -> bool;

    /// Send one system/user prompt pair and parse the completion as JSON.
    async fn invoke(&self, system: &str, user: &str) -> Result<Value, GenerationError>;
}

/// Stand-in used when no credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClient;

#[async_trait]
impl GenerationClient for DisabledClient {
    fn enabled(&self) -> bool {
        false
    }

    async fn invoke(&self, _system: &str, _user: &str) -> Result<Value, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Azure OpenAI chat-completions deployment.
#[derive(Debug, Clone)]
pub struct AzureChatClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    temperature: f32,
    timeout: Duration,
    enabled: bool,
}

impl AzureChatClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, GenerationError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            timeout,
            enabled: config.credentials_present(),
        })
    }

    fn request_body(&self, system: &str, user: &str) -> Value {
        json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
        })
    }

    async fn send(&self, system: &str, user: &str) -> Result<Value, GenerationError> {
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.request_body(system, user))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !(200..300).contains(&status) {
            return Err(GenerationError::Status {
                status,
                body: truncate(&body_text, MAX_ERROR_BODY),
            });
        }

        let envelope: ChatResponse = serde_json::from_str(&body_text)
            .map_err(|e| GenerationError::Envelope(e.to_string()))?;
        let content = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Envelope("no completion content".to_string()))?;

        parse_completion(&content)
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl GenerationClient for AzureChatClient {
    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn invoke(&self, system: &str, user: &str) -> Result<Value, GenerationError> {
        if !self.enabled {
            return Err(GenerationError::Disabled);
        }
        tokio::time::timeout(self.timeout, self.send(system, user))
            .await
            .map_err(|_| GenerationError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
    }
}

/// Parse completion text as exactly one JSON document. Surrounding
/// whitespace is allowed; fences, prose and trailing text are not.
pub fn parse_completion(content: &str) -> Result<Value, GenerationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::NotJson("empty completion".to_string()));
    }
    serde_json::from_str(trimmed).map_err(|e| GenerationError::NotJson(e.to_string()))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::task::JoinHandle;

    fn configured() -> PipelineConfig {
        PipelineConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            api_key: "k".to_string(),
            deployment: "d".to_string(),
            request_timeout_ms: 200,
            ..Default::default()
        }
    }

    #[test]
    fn parse_completion_accepts_plain_json() {
        let v = parse_completion("  {\"questions\": []}\n").unwrap();
        assert!(v["questions"].is_array());
    }

    #[test]
    fn parse_completion_rejects_wrappers() {
        for bad in [
            "```json\n{\"a\": 1}\n```",
            "Here you go: {\"a\": 1}",
            "{\"a\": 1} Hope this helps!",
            "{\"a\": 1}{\"b\": 2}",
            "",
        ] {
            assert!(
                matches!(parse_completion(bad), Err(GenerationError::NotJson(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn request_body_shape() {
        let client = AzureChatClient::new(&configured()).unwrap();
        let body = client.request_body("sys", "usr");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn enabled_follows_credentials() {
        assert!(AzureChatClient::new(&configured()).unwrap().enabled());
        assert!(!AzureChatClient::new(&PipelineConfig::default()).unwrap().enabled());
        assert!(!DisabledClient.enabled());
    }

    #[tokio::test]
    async fn disabled_client_refuses() {
        let err = DisabledClient.invoke("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::Disabled));
        let err = AzureChatClient::new(&PipelineConfig::default())
            .unwrap()
            .invoke("s", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Disabled));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let client = AzureChatClient::new(&configured()).unwrap();
        let err = client.invoke("s", "u").await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Transport(_) | GenerationError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // Connections queue in the backlog and never get an answer.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = PipelineConfig {
            endpoint: format!("http://{}", listener.local_addr().unwrap()),
            request_timeout_ms: 100,
            ..configured()
        };
        let client = AzureChatClient::new(&config).unwrap();
        let err = client.invoke("s", "u").await.unwrap_err();
        assert!(
            matches!(err, GenerationError::Timeout { timeout_ms: 100 }),
            "{:?}",
            err
        );
        drop(listener);
    }

    /// Serves exactly one HTTP response, then hands back the raw request.
    async fn one_shot(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
            request
        });
        (endpoint, handle)
    }

    async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn envelope(content: &str) -> String {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
    }

    fn client_for(endpoint: String) -> AzureChatClient {
        let config = PipelineConfig {
            endpoint,
            request_timeout_ms: 5000,
            ..configured()
        };
        AzureChatClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn completion_content_is_extracted() {
        let (endpoint, server) = one_shot("200 OK", envelope("\n{\"a\": 1}\n")).await;
        let got = client_for(endpoint).invoke("sys", "usr").await.unwrap();
        assert_eq!(got, json!({"a": 1}));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /openai/deployments/d/chat/completions?api-version="));
        assert!(request.to_lowercase().contains("api-key: k"));
        assert!(request.contains("\"response_format\""));
    }

    #[tokio::test]
    async fn fenced_completion_is_rejected() {
        let (endpoint, _server) = one_shot("200 OK", envelope("```json\n{\"a\": 1}\n```")).await;
        let err = client_for(endpoint).invoke("sys", "usr").await.unwrap_err();
        assert!(matches!(err, GenerationError::NotJson(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn error_status_keeps_code_and_body() {
        let (endpoint, _server) =
            one_shot("500 Internal Server Error", "{\"error\":\"boom\"}".to_string()).await;
        let err = client_for(endpoint).invoke("sys", "usr").await.unwrap_err();
        match err {
            GenerationError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_choices_is_an_envelope_error() {
        let (endpoint, _server) = one_shot("200 OK", "{\"choices\": []}".to_string()).await;
        let err = client_for(endpoint).invoke("sys", "usr").await.unwrap_err();
        assert!(matches!(err, GenerationError::Envelope(_)), "{:?}", err);
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
