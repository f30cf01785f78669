//! API client for the mockview auth endpoints.
//!
//! This module provides the `ApiClient` struct, a thin typed layer over the
//! [`RequestGateway`]. It builds the requests, classifies error responses
//! and parses the JSON payloads.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::debug;

use super::gateway::RequestGateway;
use super::request::ApiRequest;
use super::ApiError;
use crate::models::{CredentialPair, TokenPayload, User};

// ============================================================================
// Constants
// ============================================================================

/// Default API base URL for local development servers
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "/v1/auth/login";
const REGISTER_PATH: &str = "/v1/auth/register";
const LOGOUT_PATH: &str = "/v1/auth/logout";
const DELETE_ACCOUNT_PATH: &str = "/v1/auth/delete-account";
const RESEND_VERIFICATION_PATH: &str = "/v1/auth/resend-verification";
const CURRENT_USER_PATH: &str = "/v1/auth/me";

/// Shown when the register endpoint answers without a message
pub const DEFAULT_SIGNUP_MESSAGE: &str = "Account created successfully. Please sign in.";

/// Shown when the resend endpoint answers without a message
pub const DEFAULT_RESEND_MESSAGE: &str = "Verification email sent.";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: User,
    tokens: TokenPayload,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Build the shared HTTP client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
pub fn build_http_client() -> Result<Client, ApiError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

#[derive(Clone)]
pub struct ApiClient {
    gateway: RequestGateway,
}

impl ApiClient {
    pub fn new(gateway: RequestGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    /// Authenticate with email and password.
    ///
    /// Sent without any stored token; a 401 here means bad credentials, not
    /// an expired session.
    pub async fn login(&self, email: &str, password: &str) -> Result<(CredentialPair, User), ApiError> {
        let request = ApiRequest::post(
            LOGIN_PATH,
            json!({ "email": email, "password": password }),
        )
        .anonymous();

        let response = self.gateway.execute(&request).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_login_status(status, &body));
        }

        let login: LoginResponse = Self::parse_json(response).await?;
        let refresh = login.tokens.refresh.ok_or_else(|| {
            ApiError::InvalidResponse("login response is missing the refresh token".to_string())
        })?;
        Ok((CredentialPair::new(login.tokens.access, refresh), login.user))
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<String, ApiError> {
        let request = ApiRequest::post(
            REGISTER_PATH,
            json!({
                "username": username,
                "email": email,
                "password": password,
                "confirm_password": password,
            }),
        )
        .anonymous();

        let response = self.check_response(&request).await?;
        Ok(Self::parse_message(response)
            .await
            .unwrap_or_else(|| DEFAULT_SIGNUP_MESSAGE.to_string()))
    }

    /// Invalidate `refresh_token` server-side.
    ///
    /// No refresh-and-retry: an expired access token at logout is not worth
    /// renewing.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let request =
            ApiRequest::post(LOGOUT_PATH, json!({ "refresh": refresh_token })).without_refresh();
        self.check_response(&request).await?;
        Ok(())
    }

    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.check_response(&ApiRequest::delete(DELETE_ACCOUNT_PATH))
            .await?;
        Ok(())
    }

    /// Ask the server to send another verification email.
    pub async fn resend_verification(&self, email: &str) -> Result<String, ApiError> {
        let request =
            ApiRequest::post(RESEND_VERIFICATION_PATH, json!({ "email": email })).anonymous();
        let response = self.check_response(&request).await?;
        Ok(Self::parse_message(response)
            .await
            .unwrap_or_else(|| DEFAULT_RESEND_MESSAGE.to_string()))
    }

    /// Fetch the signed-in account's profile
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let response = self
            .check_response(&ApiRequest::get(CURRENT_USER_PATH))
            .await?;
        Self::parse_json(response).await
    }

    /// Execute `request` and turn non-success statuses into errors.
    async fn check_response(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let response = self.gateway.execute(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(path = %request.path, status = status.as_u16(), "API request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Extract `message` from an optional JSON body.
    async fn parse_message(response: Response) -> Option<String> {
        let text = response.text().await.ok()?;
        serde_json::from_str::<MessageResponse>(&text)
            .unwrap_or_default()
            .message
            .filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"user":{"id":"1","username":"a"},"tokens":{"access":"A1","refresh":"R1"}}"#;
        let login: LoginResponse =
            serde_json::from_str(json).expect("Failed to parse login test JSON");
        assert_eq!(login.user.id, "1");
        assert_eq!(login.user.username, "a");
        assert_eq!(login.tokens.access, "A1");
        assert_eq!(login.tokens.refresh.as_deref(), Some("R1"));
    }

    #[test]
    fn test_message_response_tolerates_missing_field() {
        let parsed: MessageResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.message.is_none());
        let parsed: MessageResponse =
            serde_json::from_str(r#"{"message":"Check your inbox"}"#).unwrap();
        assert_eq!(parsed.message.as_deref(), Some("Check your inbox"));
    }
}
