use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::auth::StorageError;

/// A server-side validation message attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failure of a refresh exchange.
///
/// `Clone` because every caller awaiting the same in-flight exchange
/// receives its own copy of the outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The session was cleared (logout) while the exchange was in flight;
    /// its result was thrown away.
    #[error("Session ended during token refresh")]
    Superseded,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Request rejected: {0}")]
    BadRequest(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The access token was rejected and could not be renewed
    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential storage error: {0}")]
    Storage(#[from] StorageError),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Body keys that carry a general message rather than a field name
const MESSAGE_KEYS: [&str; 4] = ["error", "detail", "message", "non_field_errors"];

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            400 | 422 => match extract_field_errors(body) {
                Some(fields) => ApiError::Validation(fields),
                None => ApiError::BadRequest(message),
            },
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// Classify a failed login response.
    ///
    /// The login endpoint reports bad credentials as 401, or as 400 with an
    /// "invalid ..." message; field errors still pass through untouched.
    pub fn from_login_status(status: reqwest::StatusCode, body: &str) -> Self {
        match Self::from_status(status, body) {
            ApiError::Unauthorized => ApiError::InvalidCredentials(
                extract_message(body).unwrap_or_else(|| "Invalid email or password".to_string()),
            ),
            ApiError::BadRequest(message) if message.to_lowercase().contains("invalid") => {
                ApiError::InvalidCredentials(message)
            }
            other => other,
        }
    }

    /// True for failures that mean the session is gone and the user has
    /// to sign in again.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }

    /// Single message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::InvalidCredentials(_) => "Invalid email or password.".to_string(),
            ApiError::Validation(fields) => fields
                .first()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "Please check the form and try again.".to_string()),
            ApiError::BadRequest(message) => message.clone(),
            ApiError::NetworkError(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::RateLimited => "Too many requests. Please wait and try again.".to_string(),
            ApiError::SessionExpired => {
                "Your session has expired. Please log in again.".to_string()
            }
            ApiError::Unauthorized | ApiError::AccessDenied(_) => {
                "You are not allowed to do that.".to_string()
            }
            ApiError::NotFound(_) => "The requested resource was not found.".to_string(),
            ApiError::ServerError(_) | ApiError::InvalidResponse(_) => {
                "Something went wrong on our side. Please try again.".to_string()
            }
            ApiError::Storage(_) => "Unable to save your session on this device.".to_string(),
        }
    }
}

/// Pull a human-readable message out of a JSON error body.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    MESSAGE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(first_text))
}

/// Parse `{"field": ["msg", ...]}` / `{"field": "msg"}` bodies.
fn extract_field_errors(body: &str) -> Option<Vec<FieldError>> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    let fields: Vec<FieldError> = object
        .iter()
        .filter(|(key, _)| !MESSAGE_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| {
            first_text(value).map(|message| FieldError {
                field: key.clone(),
                message,
            })
        })
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}
