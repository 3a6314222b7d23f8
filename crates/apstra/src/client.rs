//! Authenticated controller client.

use crate::error::{Error, Result};
use crate::poll::{self, Completion, LogCallback, PollOutcome, PollPolicy};
use crate::transport::{Method, Request, Response, Transport};
use crate::types::Credentials;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::cell::RefCell;

/// Default quota of permanent revisions per blueprint.
pub const DEFAULT_MAX_PERMANENT_REVISIONS: usize = 25;

/// Blocking client for one controller.
///
/// The session token is obtained lazily on the first call and renewed once
/// when the controller answers `401`.
pub struct Client {
    transport: Box<dyn Transport>,
    credentials: Credentials,
    token: RefCell<Option<String>>,
    pub(crate) policy: PollPolicy,
    pub(crate) max_permanent_revisions: usize,
}

impl Client {
    /// Create a client over `transport`.
    pub fn new(transport: Box<dyn Transport>, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
            token: RefCell::new(None),
            policy: PollPolicy::default(),
            max_permanent_revisions: DEFAULT_MAX_PERMANENT_REVISIONS,
        }
    }

    /// Use a custom retry/poll policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a custom permanent revision quota (at least one).
    #[must_use]
    pub fn with_max_permanent_revisions(mut self, max: usize) -> Self {
        self.max_permanent_revisions = max.max(1);
        self
    }

    /// The retry/poll policy in use.
    #[must_use]
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Log in and store the session token.
    pub fn login(&self) -> Result<()> {
        let request = Request::new(Method::Post, "/api/aaa/login").json(json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        }));
        let response = self.transport.send(None, &request)?;
        if !response.is_success() {
            return Err(Error::Auth(format!(
                "login as '{}' returned HTTP {}",
                self.credentials.username, response.status
            )));
        }

        let token = response
            .body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("login response without token".to_string()))?;
        log::debug!("Logged in as {}", self.credentials.username);
        *self.token.borrow_mut() = Some(token.to_string());
        Ok(())
    }

    fn token(&self) -> Result<String> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }
        self.login()?;
        self.token
            .borrow()
            .clone()
            .ok_or_else(|| Error::Auth("no session token".to_string()))
    }

    /// Send an authenticated request, returning the raw response.
    pub fn send(&self, request: &Request) -> Result<Response> {
        let token = self.token()?;
        let response = self.transport.send(Some(&token), request)?;
        if response.status != 401 {
            return Ok(response);
        }

        log::debug!("Session expired, logging in again");
        self.token.borrow_mut().take();
        let token = self.token()?;
        self.transport.send(Some(&token), request)
    }

    /// Send a request that must succeed with a `2xx` status.
    pub(crate) fn expect_success(&self, operation: &str, request: &Request) -> Result<Value> {
        let response = self.send(request)?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(Error::Terminal {
                operation: operation.to_string(),
                status: response.status,
                body: response.body.to_string(),
            })
        }
    }

    /// GET a path and deserialize the body.
    pub(crate) fn get_as<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T> {
        let body = self.expect_success(operation, &Request::new(Method::Get, path))?;
        Ok(serde_json::from_value(body)?)
    }

    /// GET a collection and return its `items` array.
    pub(crate) fn get_items(&self, operation: &str, path: &str) -> Result<Vec<Value>> {
        let body = self.expect_success(operation, &Request::new(Method::Get, path))?;
        match body.get("items") {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(Error::InvalidResponse(format!("{operation}: missing 'items'"))),
        }
    }

    /// Run an asynchronous operation through the shared poll protocol.
    pub(crate) fn run_async(
        &self,
        operation: &str,
        completion: Completion,
        initial: &Request,
        poll_request: &Request,
    ) -> Result<PollOutcome> {
        poll::run(
            &self.policy,
            Some(&LogCallback),
            operation,
            completion,
            || self.send(initial),
            || self.send(poll_request),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::MockTransport;

    /// Client over `mock` that logs in successfully and never sleeps.
    pub(crate) fn client(mock: &MockTransport) -> Client {
        mock.respond(Method::Post, "/api/aaa/login", 201, json!({"token": "t0k3n"}));
        Client::new(Box::new(mock.clone()), Credentials::new("admin", "admin"))
            .with_policy(PollPolicy::immediate())
    }

    #[test]
    fn test_login_is_lazy_and_cached() {
        let mock = MockTransport::new();
        let client = client(&mock);
        mock.respond(Method::Get, "/api/blueprints", 200, json!({"items": []}));

        client.get_items("list", "/api/blueprints").unwrap();
        client.get_items("list", "/api/blueprints").unwrap();

        assert_eq!(mock.count(Method::Post, "/api/aaa/login"), 1);
        assert_eq!(mock.count(Method::Get, "/api/blueprints"), 2);
    }

    #[test]
    fn test_login_rejected() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, "/api/aaa/login", 401, Value::Null);
        let client = Client::new(Box::new(mock.clone()), Credentials::new("admin", "bad"));

        let err = client.login().unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_expired_token_is_renewed_once() {
        let mock = MockTransport::new();
        let client = client(&mock);
        mock.respond(Method::Get, "/api/systems", 401, Value::Null)
            .respond(Method::Get, "/api/systems", 200, json!({"items": []}));

        let items = client.get_items("systems", "/api/systems").unwrap();
        assert!(items.is_empty());
        assert_eq!(mock.count(Method::Post, "/api/aaa/login"), 2);
        assert_eq!(mock.count(Method::Get, "/api/systems"), 2);
    }

    #[test]
    fn test_expect_success_terminal() {
        let mock = MockTransport::new();
        let client = client(&mock);
        mock.respond(Method::Get, "/api/blueprints/x", 500, json!({"error": "boom"}));

        let err = client
            .expect_success("get blueprint", &Request::new(Method::Get, "/api/blueprints/x"))
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_missing_items() {
        let mock = MockTransport::new();
        let client = client(&mock);
        mock.respond(Method::Get, "/api/blueprints", 200, json!({}));
        assert!(matches!(
            client.get_items("list", "/api/blueprints"),
            Err(Error::InvalidResponse(_))
        ));
    }
}
