//! Transports carrying requests to the controller.
//!
//! [`Transport`] is the seam between the typed [`Client`](crate::Client) and
//! the wire. [`UreqTransport`] talks HTTPS; [`MockTransport`] answers from a
//! script and records every call, for tests without a controller.
//!
//! Transports never turn HTTP statuses into errors: the status code is part of
//! the [`Response`] so the poll protocol can classify it.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "AUTHTOKEN";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Whether the method changes controller state.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A request relative to the controller base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Path starting with `/api/`.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl Request {
    /// Build a request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A response with its raw status code and parsed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// JSON body, [`Value::Null`] when empty, a string when not JSON.
    pub body: Value,
}

impl Response {
    /// Build a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to a controller.
pub trait Transport {
    /// Send one request, attaching the token header when one is given.
    fn send(&self, token: Option<&str>, request: &Request) -> Result<Response>;
}

// =============================================================================
// ureq transport
// =============================================================================

/// HTTPS transport backed by a blocking `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
}

impl UreqTransport {
    /// Create a transport for `base_url`.
    ///
    /// `insecure` disables certificate verification, which controllers with
    /// self-signed certificates need.
    #[must_use]
    pub fn new(base_url: &str, insecure: bool, timeout: Duration) -> Self {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(insecure)
            .build();
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .tls_config(tls)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn with_token<B>(builder: ureq::RequestBuilder<B>, token: Option<&str>) -> ureq::RequestBuilder<B> {
    match token {
        Some(token) => builder.header(TOKEN_HEADER, token),
        None => builder,
    }
}

impl Transport for UreqTransport {
    fn send(&self, token: Option<&str>, request: &Request) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        log::trace!("{} {}", request.method, url);

        let result = match request.method {
            Method::Get => with_token(self.agent.get(&url), token).call(),
            Method::Delete => with_token(self.agent.delete(&url), token).call(),
            Method::Post | Method::Put | Method::Patch => {
                let builder = match request.method {
                    Method::Post => self.agent.post(&url),
                    Method::Put => self.agent.put(&url),
                    _ => self.agent.patch(&url),
                };
                let builder = with_token(builder, token);
                match &request.body {
                    Some(body) => builder.send_json(body),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::Network {
                message: e.to_string(),
            })?;

        log::trace!("{} {} -> {}", request.method, request.path, status);
        Ok(Response::new(status, parse_body(&text)))
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// =============================================================================
// Mock transport
// =============================================================================

type RouteKey = (Method, String);

/// Scripted transport for tests.
///
/// Responses are queued per method and path. Each call consumes the front of
/// the queue, except the last response which keeps answering. Unscripted
/// routes answer `404`.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<RouteKey, VecDeque<Response>>>>,
    calls: Arc<Mutex<Vec<Request>>>,
}

impl MockTransport {
    /// Create an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method path`.
    pub fn respond(&self, method: Method, path: impl Into<String>, status: u16, body: Value) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        routes
            .entry((method, path.into()))
            .or_default()
            .push_back(Response::new(status, body));
        self
    }

    /// Drop every queued response for `method path`.
    pub fn clear(&self, method: Method, path: &str) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        routes.remove(&(method, path.to_string()));
        self
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made to `method path`.
    #[must_use]
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Position of the first call to `method path`, if any.
    #[must_use]
    pub fn position(&self, method: Method, path: &str) -> Option<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .position(|r| r.method == method && r.path == path)
    }
}

impl Transport for MockTransport {
    fn send(&self, _token: Option<&str>, request: &Request) -> Result<Response> {
        self.calls.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let key = (request.method, request.path.clone());
        let response = match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        Ok(response.unwrap_or_else(|| Response::new(404, Value::Null)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_last_response_repeats() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, "/api/x", 409, Value::Null)
            .respond(Method::Get, "/api/x", 200, json!({"ok": true}));

        let req = Request::new(Method::Get, "/api/x");
        assert_eq!(mock.send(None, &req).unwrap().status, 409);
        assert_eq!(mock.send(None, &req).unwrap().status, 200);
        assert_eq!(mock.send(None, &req).unwrap().status, 200);
        assert_eq!(mock.count(Method::Get, "/api/x"), 3);
    }

    #[test]
    fn test_mock_unscripted_is_not_found() {
        let mock = MockTransport::new();
        let response = mock
            .send(None, &Request::new(Method::Delete, "/api/blueprints/1"))
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(mock.position(Method::Delete, "/api/blueprints/1"), Some(0));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("oops"), Value::String("oops".to_string()));
    }

    #[test]
    fn test_method_mutating() {
        assert!(!Method::Get.is_mutating());
        assert!(Method::Delete.is_mutating());
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }

    #[test]
    fn test_ureq_transport_base_url_trimmed() {
        let transport = UreqTransport::new("https://apstra.lab/", true, Duration::from_secs(5));
        assert_eq!(transport.base_url(), "https://apstra.lab");
    }
}
