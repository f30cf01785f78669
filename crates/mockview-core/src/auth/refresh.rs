//! Single-flight exchange of the refresh token for a new access token.
//!
//! However many requests hit an expired access token at once, only one
//! refresh call reaches the server. Later callers join the in-flight
//! exchange and receive the same outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::CredentialStore;
use crate::api::RefreshError;
use crate::models::{CredentialPair, TokenPayload};

/// Path of the refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/v1/auth/refresh";

type RefreshOutcome = Result<CredentialPair, RefreshError>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;
/// In-flight exchange tagged with the store generation it started under
type PendingSlot = Mutex<Option<(u64, PendingRefresh)>>;

/// Refresh endpoint payload. Accepts both the nested and the flat shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RefreshResponse {
    Nested { tokens: TokenPayload },
    Flat(TokenPayload),
}

impl RefreshResponse {
    fn into_tokens(self) -> TokenPayload {
        match self {
            RefreshResponse::Nested { tokens } | RefreshResponse::Flat(tokens) => tokens,
        }
    }
}

/// Everything an exchange needs, detached from the coordinator so the
/// pending future doesn't keep it alive.
struct Exchange {
    client: Client,
    url: String,
    store: Arc<CredentialStore>,
    slot: Weak<PendingSlot>,
}

pub struct RefreshCoordinator {
    client: Client,
    url: String,
    store: Arc<CredentialStore>,
    pending: Arc<PendingSlot>,
    exchanges: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(client: Client, base_url: &str, store: Arc<CredentialStore>) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH),
            store,
            pending: Arc::new(Mutex::new(None)),
            exchanges: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<(u64, PendingRefresh)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Obtain a fresh credential pair, joining an in-flight exchange if
    /// there is one.
    pub async fn refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut slot = self.slot();
            let (pair, generation) = self.store.snapshot();
            match slot.as_ref() {
                Some((started, existing)) if *started == generation => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                _ => {
                    // An exchange from an ended session may still be pending;
                    // it settles on its own and is replaced here.
                    let Some(pair) = pair else {
                        return Err(RefreshError::NoRefreshToken);
                    };

                    self.exchanges.fetch_add(1, Ordering::Relaxed);
                    let exchange = Exchange {
                        client: self.client.clone(),
                        url: self.url.clone(),
                        store: Arc::clone(&self.store),
                        slot: Arc::downgrade(&self.pending),
                    };
                    let future = exchange.run(pair.refresh_token, generation).boxed().shared();
                    *slot = Some((generation, future.clone()));
                    future
                }
            }
        };

        pending.await
    }

    /// True while an exchange is outstanding
    pub fn is_refreshing(&self) -> bool {
        self.slot().is_some()
    }

    /// Number of exchanges sent to the server since construction
    pub fn exchanges_issued(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }
}

impl Exchange {
    async fn run(self, refresh_token: String, generation: u64) -> RefreshOutcome {
        let outcome = match self.request_tokens(&refresh_token).await {
            Ok(tokens) => self.persist(generation, tokens),
            Err(reason) => {
                warn!(reason = %reason, "Token refresh rejected");
                self.discard_session(generation, reason)
            }
        };

        // Settled: the next caller starts a new exchange, unless a newer
        // session already started its own
        if let Some(slot) = self.slot.upgrade() {
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(slot.as_ref(), Some((started, _)) if *started == generation) {
                slot.take();
            }
        }
        outcome
    }

    async fn request_tokens(&self, refresh_token: &str) -> Result<TokenPayload, String> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("server returned {}", status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {}", e))?;
        serde_json::from_str::<RefreshResponse>(&body)
            .map(RefreshResponse::into_tokens)
            .map_err(|e| format!("unexpected response: {}", e))
    }

    fn persist(&self, generation: u64, tokens: TokenPayload) -> RefreshOutcome {
        match self
            .store
            .apply_refresh(generation, &tokens.access, tokens.refresh.as_deref())
        {
            Ok(Some(pair)) => {
                info!(rotated = tokens.refresh.is_some(), "Access token refreshed");
                Ok(pair)
            }
            Ok(None) => Err(RefreshError::Superseded),
            Err(e) => self.discard_session(generation, format!("failed to store tokens: {}", e)),
        }
    }

    /// Drop the session this exchange belonged to, unless a logout already
    /// replaced it.
    fn discard_session(&self, generation: u64, reason: String) -> RefreshOutcome {
        match self.store.clear_if_generation(generation) {
            Ok(true) => Err(RefreshError::RefreshFailed(reason)),
            Ok(false) => Err(RefreshError::Superseded),
            Err(e) => {
                warn!(error = %e, "Failed to clear credentials after refresh failure");
                Err(RefreshError::RefreshFailed(reason))
            }
        }
    }
}
