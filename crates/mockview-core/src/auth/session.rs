use std::sync::Arc;

use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{CredentialStore, RefreshCoordinator, SessionState, SessionStateHandle};
use crate::api::{build_http_client, ApiClient, ApiError, RequestGateway};
use crate::models::User;
use crate::navigation::{Navigator, Route};

/// Owns the authentication state machine.
///
/// One instance per application, handed to whatever needs to sign in, sign
/// out or make authenticated requests.
pub struct SessionController {
    api: ApiClient,
    store: Arc<CredentialStore>,
    state: SessionStateHandle,
    navigator: Arc<dyn Navigator>,
}

impl SessionController {
    /// Create a controller talking to `base_url` with the default HTTP client.
    pub fn new(
        base_url: &str,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Ok(Self::with_client(build_http_client()?, base_url, store, navigator))
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let store = Arc::new(store);
        let state = SessionStateHandle::new();
        let refresher = Arc::new(RefreshCoordinator::new(
            client.clone(),
            base_url,
            Arc::clone(&store),
        ));
        let gateway = RequestGateway::new(
            client,
            base_url,
            Arc::clone(&store),
            refresher,
            state.clone(),
            Arc::clone(&navigator),
        );

        Self {
            api: ApiClient::new(gateway),
            store,
            state,
            navigator,
        }
    }

    // =========================================================================
    // Observers
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.get().is_authenticated()
    }

    pub fn is_initializing(&self) -> bool {
        self.state.get().is_initializing()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.get().user().cloned()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Gateway for other API consumers; shares this session's tokens.
    pub fn gateway(&self) -> &RequestGateway {
        self.api.gateway()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reconcile state with the credential store.
    ///
    /// Stored tokens plus a cached user are trusted as-is; the first 401
    /// will renew or end the session.
    pub fn initialize(&self) -> SessionState {
        let next = match (self.store.get(), self.store.cached_user()) {
            (Some(_), Some(user)) => {
                debug!(user_id = %user.id, "Restored session from credential store");
                SessionState::Authenticated(user)
            }
            (pair, user) => {
                if pair.is_some() || user.is_some() || self.store.is_partial() {
                    warn!("Incomplete stored session, clearing");
                    if let Err(e) = self.store.clear() {
                        warn!(error = %e, "Failed to clear credential store");
                    }
                } else {
                    debug!("No stored session");
                }
                SessionState::Unauthenticated
            }
        };

        self.state.set(next.clone());
        next
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let previous = self.state.set(SessionState::Authenticating);

        let (pair, user) = match self.api.login(email, password).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.restore_after_attempt(previous);
                return Err(e);
            }
        };

        if let Err(e) = self.store.store_session(&pair, &user) {
            warn!(error = %e, "Failed to persist session");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear credential store");
            }
            self.state.set(SessionState::Unauthenticated);
            return Err(e.into());
        }

        info!(user_id = %user.id, "Login successful");
        self.state.set(SessionState::Authenticated(user.clone()));
        Ok(user)
    }

    /// Register a new account. Does not sign the caller in; the account has
    /// to be verified first.
    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<String, ApiError> {
        let previous = self.state.set(SessionState::Authenticating);
        let result = self.api.register(username, email, password).await;
        self.restore_after_attempt(previous);

        match result {
            Ok(message) => {
                info!(username, "Account created");
                Ok(message)
            }
            Err(e) => {
                warn!(error = %e, "Signup failed");
                Err(e)
            }
        }
    }

    pub async fn resend_verification_email(&self, email: &str) -> Result<String, ApiError> {
        self.api.resend_verification(email).await
    }

    /// End the session. Always succeeds locally, whatever the server says.
    pub async fn logout(&self) {
        self.state.set(SessionState::LoggingOut);

        if let Some(refresh) = self.store.refresh_token() {
            if let Err(e) = self.api.logout(&refresh).await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
        self.state.set(SessionState::Unauthenticated);
        info!("Logged out");
        self.navigator.navigate(Route::Login);
    }

    pub async fn delete_account(&self) -> Result<(), ApiError> {
        let previous = self.state.set(SessionState::LoggingOut);

        if let Err(e) = self.api.delete_account().await {
            warn!(error = %e, "Account deletion failed");
            // A failed renewal already ended the session
            if !e.is_session_ended() {
                self.state.set(previous);
            }
            return Err(e);
        }

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
        self.state.set(SessionState::Unauthenticated);
        info!("Account deleted");
        self.navigator.navigate(Route::Signup);
        Ok(())
    }

    /// Re-fetch the profile from the server and update the cached copy.
    ///
    /// Fails with `SessionExpired` when the session was cleared or replaced
    /// while the request was in flight; the answer belongs to a session that
    /// no longer exists and is not cached.
    pub async fn reload_user(&self) -> Result<User, ApiError> {
        let generation = self.store.generation();
        let user = self.api.current_user().await?;

        if !self.store.set_cached_user_if_generation(generation, &user)? {
            debug!(user_id = %user.id, "Session changed during profile reload, discarding");
            return Err(ApiError::SessionExpired);
        }
        if self.state.get().is_authenticated() {
            self.state.set(SessionState::Authenticated(user.clone()));
        }
        Ok(user)
    }

    /// State to fall back to after a login/signup attempt that didn't
    /// produce a new session.
    fn restore_after_attempt(&self, previous: SessionState) {
        let next = match previous {
            SessionState::Authenticated(user) => SessionState::Authenticated(user),
            _ => SessionState::Unauthenticated,
        };
        self.state.set(next);
    }
}
