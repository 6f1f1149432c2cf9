//! ARM request construction
//!
//! Builds versioned, escaped request paths. A path may already carry a
//! query string (for instance a `nextLink` returned by the API); its pairs
//! are moved into the request's query list before the path is escaped and
//! the `api-version` pair is appended.

use super::error::Result;
use reqwest::Method;
use serde_json::Value;

/// Characters left unescaped in paths and query pairs, on top of the
/// always-safe ASCII alphanumerics and `_.-~`
pub const SAFE_CHARS: &str = "/()$=',";

/// Name of the version query parameter every ARM request carries
pub const API_VERSION_PARAM: &str = "api-version";

/// A single query pair; pairs with no value are left out of the path
pub type QueryPair = (String, Option<String>);

/// Percent-escape `value`, leaving [`SAFE_CHARS`] untouched
pub fn quote(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut buf = [0u8; 4];

    for c in value.chars() {
        if c.is_ascii_alphanumeric() || "_.-~".contains(c) || SAFE_CHARS.contains(c) {
            escaped.push(c);
        } else {
            escaped.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }

    escaped
}

fn unescape(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Split a query string out of `path`, escape the path and re-serialize
/// every pair onto it.
///
/// Pairs already in `query` come first, followed by the ones found in the
/// path, followed by exactly one `api-version` pair. Any `api-version`
/// present in the inputs is replaced by `api_version`.
pub fn update_request_uri_query(
    path: &str,
    query: &[QueryPair],
    api_version: &str,
) -> (String, Vec<QueryPair>) {
    let mut pairs: Vec<QueryPair> = query.to_vec();

    let path = match path.split_once('?') {
        Some((path, query_string)) => {
            for param in query_string.split('&') {
                if let Some((name, value)) = param.split_once('=') {
                    // Names and values are re-escaped on serialization
                    pairs.push((unescape(name), Some(unescape(value))));
                }
            }
            path
        },
        None => path,
    };

    pairs.retain(|(name, _)| name != API_VERSION_PARAM);
    pairs.push((API_VERSION_PARAM.to_string(), Some(api_version.to_string())));

    let serialized: Vec<String> = pairs
        .iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .map(|value| format!("{}={}", quote(name), quote(value)))
        })
        .collect();

    let mut full_path = quote(path);
    if !serialized.is_empty() {
        full_path.push('?');
        full_path.push_str(&serialized.join("&"));
    }

    (full_path, pairs)
}

/// Payload of an outgoing request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Structured data, sent as JSON text
    Json(Value),
    Text(String),
}

impl RequestBody {
    /// Encode the body as UTF-8 bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Empty => Ok(Vec::new()),
            Self::Json(value) => Ok(serde_json::to_vec(value)?),
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Option<Value>> for RequestBody {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Empty, Self::Json)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A fully built request, ready for a transport
#[derive(Debug, Clone, PartialEq)]
pub struct ArmRequest {
    pub method: Method,
    /// Target host; rewritten when the server redirects
    pub host: String,
    /// Escaped path including the serialized query string
    pub path: String,
    pub query: Vec<QueryPair>,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl ArmRequest {
    /// Build a request for `path`, versioned with `api_version`
    pub fn build(
        method: Method,
        host: &str,
        path: &str,
        api_version: &str,
        body: &RequestBody,
    ) -> Result<Self> {
        let (path, query) = update_request_uri_query(path, &[], api_version);

        Ok(Self {
            method,
            host: host.to_string(),
            path,
            query,
            body: body.encode()?,
            headers: Vec::new(),
        })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Value of the first header named `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
