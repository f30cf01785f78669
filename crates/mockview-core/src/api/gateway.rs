//! Entry point for every outbound API call.
//!
//! The gateway attaches the stored access token and, when the server
//! answers 401, drives one refresh through the [`RefreshCoordinator`]
//! followed by one resend. A failed refresh ends the session.

use std::sync::Arc;

use reqwest::{header, Client, Response};
use tracing::{debug, warn};

use super::request::{ApiRequest, Attempt};
use super::{ApiError, RefreshError};
use crate::auth::{CredentialStore, RefreshCoordinator, SessionState, SessionStateHandle};
use crate::navigation::{Navigator, Route};

/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct RequestGateway {
    client: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    refresher: Arc<RefreshCoordinator>,
    state: SessionStateHandle,
    navigator: Arc<dyn Navigator>,
}

impl RequestGateway {
    pub fn new(
        client: Client,
        base_url: &str,
        store: Arc<CredentialStore>,
        refresher: Arc<RefreshCoordinator>,
        state: SessionStateHandle,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            refresher,
            state,
            navigator,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    /// Send `request`, recovering once from an expired access token.
    ///
    /// Non-401 failures come back as plain responses for the caller to
    /// classify. `Err` means the request never produced a usable response:
    /// a transport failure, or a session that could not be renewed.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let token = if request.attaches_token() {
            self.store.access_token()
        } else {
            None
        };

        let response = self.send(request, token.as_deref(), Attempt::Initial).await?;
        if !Attempt::Initial.may_recover(request, response.status()) {
            return Ok(response);
        }

        let renewed = self.renew_access(token.as_deref()).await?;
        self.send(request, Some(&renewed), Attempt::Retry).await
    }

    async fn send(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        attempt: Attempt,
    ) -> Result<Response, ApiError> {
        let url = self.url(&request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), url.as_str())
            .header(header::ACCEPT, "application/json");

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            ?attempt,
            status = response.status().as_u16(),
            "API request completed"
        );
        Ok(response)
    }

    /// Produce an access token newer than `rejected`.
    async fn renew_access(&self, rejected: Option<&str>) -> Result<String, ApiError> {
        // A sibling request may already have refreshed while this one was in flight
        if let Some(current) = self.store.access_token() {
            if rejected != Some(current.as_str()) {
                debug!("Access token already renewed, resending");
                return Ok(current);
            }
        }

        match self.refresher.refresh().await {
            // Read back from the store: a logout after the exchange wins
            Ok(_) => self.store.access_token().ok_or(ApiError::SessionExpired),
            Err(RefreshError::Superseded) => Err(ApiError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "Could not renew session");
                self.end_session(&e);
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Forced logout after an unrecoverable refresh failure.
    fn end_session(&self, cause: &RefreshError) {
        if *cause == RefreshError::NoRefreshToken {
            // Clear leftovers such as a lone access token
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear credential store");
            }
        }

        let previous = self.state.set(SessionState::Unauthenticated);
        if previous != SessionState::Unauthenticated {
            self.navigator.navigate(Route::Login);
        }
    }
}
