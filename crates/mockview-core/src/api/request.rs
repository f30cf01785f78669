use reqwest::{Method, StatusCode};
use serde_json::Value;

/// How a request authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Attach the stored access token and recover from 401 with one refresh
    Bearer,
    /// Attach the stored access token but hand a 401 straight back
    BearerNoRefresh,
    /// Never attach a token (login, register)
    Anonymous,
}

/// Description of one outbound API call, independent of its attempt.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            auth: AuthMode::Bearer,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_json(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }

    pub fn without_refresh(mut self) -> Self {
        self.auth = AuthMode::BearerNoRefresh;
        self
    }

    pub fn attaches_token(&self) -> bool {
        self.auth != AuthMode::Anonymous
    }
}

/// Which send of a logical request this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    /// The single resend after a refresh; never recovered again
    Retry,
}

impl Attempt {
    /// Whether a response with `status` should trigger the refresh-and-resend path.
    pub fn may_recover(self, request: &ApiRequest, status: StatusCode) -> bool {
        self == Attempt::Initial
            && request.auth == AuthMode::Bearer
            && status == StatusCode::UNAUTHORIZED
    }
}
