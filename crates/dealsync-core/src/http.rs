//! Blocking JSON client with bounded retries, shared by the CRM and board
//! integrations.

use crate::config::HttpConfig;
use crate::error::{Result, SyncError};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    service: &'static str,
    max_attempts: u32,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn new(service: &'static str, cfg: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .user_agent(concat!("dealsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            service,
            max_attempts: cfg.max_retries.saturating_add(1),
            base_backoff: Duration::try_from_secs_f64(cfg.backoff_secs).unwrap_or_default(),
        })
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send `builder`, retrying 429 and 5xx responses (honouring
    /// `Retry-After`) and transient transport failures. Other non-success
    /// statuses fail immediately with the response body.
    pub fn send_json(&self, builder: RequestBuilder, path: &str) -> Result<Value> {
        for attempt in 1..=self.max_attempts {
            let Some(request) = builder.try_clone() else {
                return Err(SyncError::Api {
                    service: self.service,
                    status: 0,
                    body: format!("request body for {path} cannot be replayed"),
                });
            };
            let last = attempt == self.max_attempts;

            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!(service = self.service, path, attempt, %status, "response");
                    if is_retryable(status) {
                        if last {
                            break;
                        }
                        let wait = retry_after(&response).unwrap_or_else(|| self.backoff(attempt));
                        tracing::warn!(
                            service = self.service,
                            path,
                            %status,
                            wait_ms = wait.as_millis() as u64,
                            "retrying"
                        );
                        std::thread::sleep(wait);
                        continue;
                    }
                    return self.decode(response);
                }
                Err(err) if !last && is_transient(&err) => {
                    tracing::warn!(service = self.service, path, error = %err, "request failed, retrying");
                    std::thread::sleep(self.backoff(attempt));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SyncError::RetriesExhausted {
            service: self.service,
            path: path.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn decode(&self, response: Response) -> Result<Value> {
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(SyncError::Api {
                service: self.service,
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `base * 2^(attempt - 1)`, capped at eight doublings.
    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(8);
        self.base_backoff.saturating_mul(1u32 << shift)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_after(response: &Response) -> Option<Duration> {
    let header = response.headers().get(reqwest::header::RETRY_AFTER)?;
    let secs: f64 = header.to_str().ok()?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(retries: u32) -> HttpClient {
        HttpClient::new(
            "test",
            &HttpConfig {
                timeout_secs: 5,
                max_retries: retries,
                backoff_secs: 0.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn returns_json_on_success() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"hello": "world"}"#)
            .expect(1)
            .create();

        let c = client(2);
        let url = format!("{}/ok", server.url());
        let value = c.send_json(c.request(Method::GET, &url), "/ok").unwrap();
        assert_eq!(value["hello"], "world");
        m.assert();
    }

    #[test]
    fn retries_server_errors_until_exhausted() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create();

        let c = client(2);
        let url = format!("{}/flaky", server.url());
        let err = c.send_json(c.request(Method::GET, &url), "/flaky").unwrap_err();
        assert!(matches!(err, SyncError::RetriesExhausted { attempts: 3, .. }));
        m.assert();
    }

    #[test]
    fn rate_limit_honours_retry_after() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/limited")
            .with_status(429)
            .with_header("retry-after", "0")
            .expect(2)
            .create();

        let c = client(1);
        let url = format!("{}/limited", server.url());
        let builder = c
            .request(Method::POST, &url)
            .json(&serde_json::json!({"a": 1}));
        let err = c.send_json(builder, "/limited").unwrap_err();
        assert!(matches!(err, SyncError::RetriesExhausted { .. }));
        m.assert();
    }

    #[test]
    fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("GET", "/bad")
            .with_status(400)
            .with_body("validation failed")
            .expect(1)
            .create();

        let c = client(3);
        let url = format!("{}/bad", server.url());
        match c.send_json(c.request(Method::GET, &url), "/bad").unwrap_err() {
            SyncError::Api { status, body, .. } => {
                assert_eq!(status, 400);
                assert_eq!(body, "validation failed");
            }
            other => panic!("unexpected error: {other}"),
        }
        m.assert();
    }

    #[test]
    fn backoff_doubles() {
        let c = HttpClient::new(
            "test",
            &HttpConfig {
                timeout_secs: 5,
                max_retries: 4,
                backoff_secs: 1.5,
            },
        )
        .unwrap();
        assert_eq!(c.backoff(1), Duration::from_millis(1500));
        assert_eq!(c.backoff(3), Duration::from_secs(6));
    }
}
