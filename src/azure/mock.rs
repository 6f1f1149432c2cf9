//! Scripted in-memory transport for unit tests

use super::error::{ArmError, TransportError};
use super::http::{RawResponse, Transport};
use super::request::ArmRequest;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// What the mock answers for one attempt
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Response(RawResponse),
    Redirect(String),
    RateLimited(Option<Duration>),
    Fail(String),
}

impl MockOutcome {
    pub fn json(status: u16, body: Value) -> Self {
        let status = StatusCode::from_u16(status).expect("valid status code");
        Self::Response(RawResponse::json(status, &body))
    }

    fn into_result(self) -> Result<RawResponse, TransportError> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Redirect(location) => Err(TransportError::Redirect { location }),
            Self::RateLimited(retry_after) => Err(TransportError::RateLimited { retry_after }),
            Self::Fail(message) => Err(TransportError::Failed(ArmError::malformed("mock", message))),
        }
    }
}

struct Route {
    method: Method,
    path: String,
    queued: VecDeque<MockOutcome>,
    fallback: Option<MockOutcome>,
}

/// Routes requests by method and unescaped path (query string ignored)
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ArmRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route_mut<'a>(routes: &'a mut Vec<Route>, method: &Method, path: &str) -> &'a mut Route {
        let index = match routes.iter().position(|r| r.method == *method && r.path == path) {
            Some(index) => index,
            None => {
                routes.push(Route {
                    method: method.clone(),
                    path: path.to_string(),
                    queued: VecDeque::new(),
                    fallback: None,
                });
                routes.len() - 1
            },
        };
        &mut routes[index]
    }

    /// Answer every request to `path` with `outcome` once queued ones run out
    pub fn on(&self, method: Method, path: &str, outcome: MockOutcome) {
        let mut routes = self.routes.lock().unwrap();
        Self::route_mut(&mut routes, &method, path).fallback = Some(outcome);
    }

    /// Queue a single answer for `path`
    pub fn on_once(&self, method: Method, path: &str, outcome: MockOutcome) {
        let mut routes = self.routes.lock().unwrap();
        Self::route_mut(&mut routes, &method, path)
            .queued
            .push_back(outcome);
    }

    pub fn requests(&self) -> Vec<ArmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of attempts sent to `path`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && request_path(r) == path)
            .count()
    }

    /// Paths requested, in order, without query strings
    pub fn paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(request_path)
            .collect()
    }

    /// Parsed JSON body of the last request to `path`
    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && request_path(r) == path)
            .and_then(|r| serde_json::from_slice(&r.body).ok())
    }
}

fn request_path(request: &ArmRequest) -> String {
    let path = request.path.split('?').next().unwrap_or_default();
    urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ArmRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let path = request_path(request);

        let outcome = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == path)
                .and_then(|route| route.queued.pop_front().or_else(|| route.fallback.clone()))
        };

        outcome
            .unwrap_or_else(|| {
                MockOutcome::json(
                    404,
                    json!({"error": {"code": "NotFound", "message": format!("no mock for {}", path)}}),
                )
            })
            .into_result()
    }
}
