//! Request/response transport for the Slack Web API
//!
//! The rest of the crate only sees a method name with form parameters going
//! out and a status, optional `Retry-After` hint and body coming back.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use tracing::debug;

use crate::error::{RelayError, Result};

pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Outbound API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Web API method, e.g. `chat.postMessage`
    pub method: String,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Raw answer to an [`ApiRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Seconds from a `Retry-After` header, when present and numeric
    pub retry_after: Option<u64>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.to_string(),
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

/// One attempt at an outbound call, no retries
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// Form-encoded POSTs with a bearer token
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(token, SLACK_API_BASE)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, request.method);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .form(&request.params)
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("{}: {}", request.method, e)))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(format!("{}: {}", request.method, e)))?;

        debug!("{} -> {} ({} bytes)", request.method, status, body.len());

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}
