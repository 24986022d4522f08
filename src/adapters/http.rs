//! Shared HTTP plumbing for the quote and swap services
//!
//! Both services are plain JSON-over-HTTP APIs with the same auth header and
//! the same rate-limit behavior, so they share one retrying client.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Connection settings for one external service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_url: String,
    /// Sent as `x-api-key` when present
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Total attempts per request (at least one)
    pub max_retries: u32,
}

impl ServiceConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    config: ServiceConfig,
    http: Client,
}

impl ServiceClient {
    pub fn new(config: ServiceConfig) -> Result<Self, HttpError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { config, http })
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    pub fn get(&self, endpoint: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.url(endpoint)))
    }

    pub fn post(&self, endpoint: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.url(endpoint)))
    }

    /// Send with retries, then decode a successful JSON body
    pub async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HttpError> {
        let response = self.execute_with_retry(request).await?;
        self.handle_response(response).await
    }

    /// Send exactly once, then decode a successful JSON body.
    ///
    /// For requests that must not be resubmitted, such as broadcasting a
    /// transaction: a 5xx or timeout may arrive after the side effect.
    pub async fn json_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HttpError> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        self.handle_response(response).await
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Execute request with retry logic and rate limit handling.
    ///
    /// 429 backs off exponentially, 5xx and transport errors back off
    /// linearly. The final attempt's response is returned as-is.
    async fn execute_with_retry(&self, request: RequestBuilder) -> Result<Response, HttpError> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let last_attempt = attempt + 1 == attempts;
            let req = request
                .try_clone()
                .ok_or_else(|| HttpError::Client("Failed to clone request".into()))?;

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS && !last_attempt {
                        let backoff = Duration::from_secs(2u64.pow(attempt + 1)); // 2s, 4s, 8s
                        tracing::warn!(
                            "Rate limited (429), backing off for {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            attempts
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    if status.is_server_error() && !last_attempt {
                        tracing::debug!("Server error {} (attempt {}/{})", status, attempt + 1, attempts);
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(HttpError::Transport(e.to_string()));
                    if !last_attempt {
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| HttpError::Transport("Max retries exceeded".into())))
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, HttpError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Pong {
        ok: bool,
    }

    fn client(url: &str, retries: u32) -> ServiceClient {
        let mut config = ServiceConfig::new(url);
        config.max_retries = retries;
        config.api_key = Some("secret".to_string());
        ServiceClient::new(config).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let c = client("http://localhost:9000/api/", 1);
        assert_eq!(c.url("/quote"), "http://localhost:9000/api/quote");
        assert_eq!(c.url("swap"), "http://localhost:9000/api/swap");
    }

    #[tokio::test]
    async fn test_api_key_header_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .match_header("x-api-key", "secret")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let c = client(&server.url(), 1);
        let pong: Pong = c.json(c.get("ping")).await.unwrap();
        assert!(pong.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .with_status(503)
            .with_body("unavailable")
            .expect(2)
            .create_async()
            .await;

        let c = client(&server.url(), 2);
        let result: Result<Pong, _> = c.json(c.get("ping")).await;
        assert!(matches!(result, Err(HttpError::Status { status: 503, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_json_once_sends_a_single_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/swap")
            .with_status(502)
            .with_body("bad gateway")
            .expect(1)
            .create_async()
            .await;

        let c = client(&server.url(), 3);
        let result: Result<Pong, _> = c.json_once(c.post("swap")).await;
        assert!(matches!(result, Err(HttpError::Status { status: 502, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/swap")
            .with_status(400)
            .with_body("bad path")
            .expect(1)
            .create_async()
            .await;

        let c = client(&server.url(), 3);
        let result: Result<Pong, _> = c.json(c.post("swap")).await;
        match result {
            Err(HttpError::Status { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad path");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let c = client(&server.url(), 1);
        let result: Result<Pong, _> = c.json(c.get("ping")).await;
        assert!(matches!(result, Err(HttpError::Decode(_))));
    }
}
