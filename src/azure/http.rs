//! HTTP transport for ARM REST calls
//!
//! A [`Transport`] sends one [`ArmRequest`] and classifies the outcome as a
//! plain response, a redirect, a rate limit, or a failure. Retrying and
//! redirect-following live one layer up in [`super::client::ArmClient`].

use super::error::{ArmError, Result, TransportError};
use super::request::ArmRequest;
use crate::config::ClientConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Raw response as returned by a transport
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn json(status: StatusCode, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as lossy UTF-8 text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON; an empty body parses to `Value::Null`
    pub fn parse_body(&self, path: &str) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&self.body)
            .map_err(|e| ArmError::malformed(path, format!("invalid JSON body: {}", e)))
    }

    /// Message of an ARM error payload (`{"error": {"message": ...}}`)
    pub fn error_message(&self) -> Option<String> {
        let value: Value = serde_json::from_slice(&self.body).ok()?;
        let error = value.get("error")?;

        error
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| error.as_str().map(|s| s.to_string()))
    }

    /// Fail with a [`ArmError::Remote`] unless the status is 2xx
    pub fn error_for_status(self, method: &str, path: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
        tracing::error!("API error: {} - {}", self.status, sanitize_for_log(&self.text()));

        let message = self.error_message().unwrap_or_else(|| {
            self.status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

        Err(ArmError::Remote {
            method: method.to_string(),
            path: path.to_string(),
            status: self.status.as_u16(),
            message,
        })
    }

    /// Check the status and parse the body
    pub fn into_json(self, method: &str, path: &str) -> Result<Value> {
        self.error_for_status(method, path)?.parse_body(path)
    }
}

/// Sends a single request and classifies the outcome
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ArmRequest) -> std::result::Result<RawResponse, TransportError>;
}

/// Parse a `Retry-After` header: delay in seconds or an HTTP date
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delay = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delay.to_std().unwrap_or(Duration::ZERO))
}

/// Reqwest-backed transport carrying the bearer token
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    scheme: String,
    token: String,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: &ClientConfig, token: &str) -> Result<Self> {
        // Redirects are surfaced to the client, which rewrites the target host
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
            token: token.to_string(),
        })
    }

    fn url(&self, request: &ArmRequest) -> String {
        format!("{}://{}{}", self.scheme, request.host, request.path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ArmRequest) -> std::result::Result<RawResponse, TransportError> {
        let url = self.url(request);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        if status.is_redirection() {
            if let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) {
                return Err(TransportError::Redirect {
                    location: location.to_string(),
                });
            }
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(TransportError::RateLimited { retry_after });
        }

        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Format an ARM error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_arm_error(error: &anyhow::Error) -> String {
    if let Some(arm_error) = error.downcast_ref::<ArmError>() {
        match arm_error {
            ArmError::RetriesExhausted { .. } | ArmError::RateLimited { .. } => {
                return "Rate limit exceeded. Please try again later.".to_string();
            },
            ArmError::TooManyRedirects { .. } => {
                return "Too many redirects. The endpoint may be misconfigured.".to_string();
            },
            ArmError::Validation(msg) | ArmError::Precondition(msg) => return msg.clone(),
            _ => {},
        }

        match arm_error.status() {
            Some(401) => {
                return "Authentication failed. Set AZURE_ACCESS_TOKEN or pass --token.".to_string();
            },
            Some(403) => return "Permission denied. Check your Azure role assignments.".to_string(),
            Some(404) => return "Resource not found.".to_string(),
            Some(409) => {
                return "Resource conflict. The resource may already exist or be in use.".to_string();
            },
            Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
            Some(400) => return "Invalid request. Check your parameters.".to_string(),
            Some(status) if status >= 500 => {
                return "Azure service temporarily unavailable. Please try again.".to_string();
            },
            _ => {},
        }
    }

    let error_str = error.to_string();

    // Truncate long error messages and remove potential sensitive data
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
