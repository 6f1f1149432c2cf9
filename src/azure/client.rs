//! ARM Client
//!
//! Main client for Resource Manager calls, combining request building with
//! a [`Transport`]. Every logical request runs through
//! [`ArmClient::perform_request`], which follows redirects and retries
//! rate-limited attempts after the server-specified delay.

use super::auth::Credentials;
use super::error::{ArmError, Result, TransportError};
use super::http::{HttpTransport, RawResponse, Transport};
use super::request::{ArmRequest, RequestBody};
use crate::config::ClientConfig;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Header used to correlate the attempts of one logical request
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Main ARM client
#[derive(Clone)]
pub struct ArmClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    subscription_id: String,
}

impl ArmClient {
    /// Create a client talking HTTPS to the configured host
    pub fn new(subscription_id: &str, credentials: &Credentials, config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config, credentials.token())?;
        Ok(Self::with_transport(subscription_id, config, Arc::new(transport)))
    }

    /// Create a client on top of an arbitrary transport
    pub fn with_transport(
        subscription_id: &str,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            config,
            subscription_id: subscription_id.to_string(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    /// Build a path under the subscription prefix
    pub fn subscription_path(&self, path: &str) -> String {
        format!("/subscriptions/{}/{}", self.subscription_id, path)
    }

    /// Build a path under a resource group
    pub fn resource_group_path(&self, resource_group: &str, path: &str) -> String {
        self.subscription_path(&format!("resourceGroups/{}/{}", resource_group, path))
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// Make a GET request
    pub async fn get(&self, path: &str, api_version: Option<&str>) -> Result<RawResponse> {
        self.perform(Method::GET, path, &RequestBody::Empty, api_version)
            .await
    }

    /// Make a GET request and parse a successful JSON body
    pub async fn get_json(&self, path: &str, api_version: Option<&str>) -> Result<Value> {
        self.get(path, api_version).await?.into_json("GET", path)
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, path: &str, body: Value, api_version: Option<&str>) -> Result<RawResponse> {
        self.perform(Method::PUT, path, &RequestBody::Json(body), api_version)
            .await
    }

    /// Make a POST request
    pub async fn post(
        &self,
        path: &str,
        body: RequestBody,
        api_version: Option<&str>,
    ) -> Result<RawResponse> {
        self.perform(Method::POST, path, &body, api_version).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str, api_version: Option<&str>) -> Result<RawResponse> {
        self.perform(Method::DELETE, path, &RequestBody::Empty, api_version)
            .await
    }

    /// Build a versioned request against the configured host
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: &RequestBody,
        api_version: Option<&str>,
    ) -> Result<ArmRequest> {
        let api_version = api_version.unwrap_or(&self.config.default_api_version);
        let request_id = uuid::Uuid::new_v4().to_string();

        Ok(
            ArmRequest::build(method, &self.config.host, path, api_version, body)?
                .with_header(CLIENT_REQUEST_ID_HEADER, &request_id),
        )
    }

    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: &RequestBody,
        api_version: Option<&str>,
    ) -> Result<RawResponse> {
        let request = self.build_request(method, path, body, api_version)?;
        self.perform_request(request).await
    }

    /// Execute one logical request.
    ///
    /// Redirects rewrite the target host and are re-attempted without
    /// consuming the retry budget; they are bounded by `max_redirects`.
    /// A rate-limited attempt with a server-specified delay sleeps for that
    /// delay and retries, at most `max_retries` times. A rate limit with no
    /// delay, and any other failure, is returned as is.
    pub async fn perform_request(&self, mut request: ArmRequest) -> Result<RawResponse> {
        let request_id = request
            .header(CLIENT_REQUEST_ID_HEADER)
            .unwrap_or("-")
            .to_string();
        let mut retries = 0u32;
        let mut redirects = 0u32;

        loop {
            tracing::debug!(
                "{} {}{} [request {}, retry {}]",
                request.method,
                request.host,
                request.path,
                request_id,
                retries
            );

            match self.transport.send(&request).await {
                Ok(response) => return Ok(response),
                Err(TransportError::Redirect { location }) => {
                    redirects += 1;
                    if redirects > self.config.max_redirects {
                        return Err(ArmError::TooManyRedirects {
                            path: request.path,
                            max_redirects: self.config.max_redirects,
                        });
                    }

                    let host = redirect_host(&location)?;
                    tracing::info!(
                        "Following redirect for request {} from {} to {}",
                        request_id,
                        request.host,
                        host
                    );
                    request.host = host;
                },
                Err(TransportError::RateLimited {
                    retry_after: Some(delay),
                }) => {
                    if retries >= self.config.max_retries {
                        return Err(ArmError::RetriesExhausted {
                            path: request.path,
                            max_retries: self.config.max_retries,
                        });
                    }

                    tracing::warn!(
                        "Rate limited on {} [request {}], retrying in {:?}",
                        request.path,
                        request_id,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                },
                Err(TransportError::RateLimited { retry_after: None }) => {
                    return Err(ArmError::RateLimited { path: request.path });
                },
                Err(TransportError::Failed(err)) => return Err(err),
            }
        }
    }
}

/// Extract `host[:port]` from a redirect target
fn redirect_host(location: &str) -> Result<String> {
    let url = url::Url::parse(location)
        .map_err(|e| ArmError::InvalidRedirect(format!("{}: {}", location, e)))?;

    let host = url
        .host_str()
        .ok_or_else(|| ArmError::InvalidRedirect(location.to_string()))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
