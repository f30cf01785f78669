//! Durable storage for the session's tokens and cached profile.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::storage::{StorageBackend, StorageError, StorageResult};
use crate::models::{CredentialPair, User};

/// Storage key for the access token
pub const ACCESS_KEY: &str = "access";

/// Storage key for the refresh token
pub const REFRESH_KEY: &str = "refresh";

/// Storage key for the serialized user profile
pub const USER_KEY: &str = "user";

struct Inner {
    backend: Box<dyn StorageBackend>,
    /// Bumped on every `clear()`; lets in-flight refreshes detect a logout.
    generation: u64,
}

/// Session credentials plus the cached user, persisted through a
/// [`StorageBackend`].
///
/// Every public method is one critical section, so readers never observe
/// a half-written pair.
pub struct CredentialStore {
    inner: Mutex<Inner>,
}

impl CredentialStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                backend: Box::new(backend),
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a key, logging and treating backend failures as absent.
    fn read(inner: &Inner, key: &str) -> Option<String> {
        match inner.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read credential store");
                None
            }
        }
    }

    fn read_pair(inner: &Inner) -> Option<CredentialPair> {
        match (Self::read(inner, ACCESS_KEY), Self::read(inner, REFRESH_KEY)) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            (None, None) => None,
            (access, _) => {
                warn!(has_access = access.is_some(), "Ignoring partially stored credential pair");
                None
            }
        }
    }

    /// The stored pair, or `None` unless both halves are present
    pub fn get(&self) -> Option<CredentialPair> {
        Self::read_pair(&self.lock())
    }

    pub fn access_token(&self) -> Option<String> {
        self.get().map(|pair| pair.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get().map(|pair| pair.refresh_token)
    }

    /// True when one token is stored without the other.
    pub fn is_partial(&self) -> bool {
        let inner = self.lock();
        Self::read(&inner, ACCESS_KEY).is_some() != Self::read(&inner, REFRESH_KEY).is_some()
    }

    /// Replace both tokens.
    pub fn set(&self, pair: &CredentialPair) -> StorageResult<()> {
        let inner = self.lock();
        Self::write_pair(&inner, pair)
    }

    fn write_pair(inner: &Inner, pair: &CredentialPair) -> StorageResult<()> {
        let result = inner
            .backend
            .set(ACCESS_KEY, &pair.access_token)
            .and_then(|()| inner.backend.set(REFRESH_KEY, &pair.refresh_token));

        if let Err(e) = result {
            // Don't leave one half behind
            let _ = inner.backend.delete(ACCESS_KEY);
            let _ = inner.backend.delete(REFRESH_KEY);
            return Err(e);
        }
        Ok(())
    }

    /// Persist a complete session (tokens + profile) in one step.
    ///
    /// Starts a new generation, so exchanges begun under the previous
    /// session can neither write into nor clear this one.
    pub fn store_session(&self, pair: &CredentialPair, user: &User) -> StorageResult<()> {
        let mut inner = self.lock();
        inner.generation += 1;
        Self::write_pair(&inner, pair)?;
        let serialized = serde_json::to_string(user)?;
        inner.backend.set(USER_KEY, &serialized)?;
        debug!(user_id = %user.id, "Session stored");
        Ok(())
    }

    /// Apply the result of a refresh exchange.
    ///
    /// Only the access token is replaced unless `rotated_refresh` is given.
    /// Returns `Ok(None)` without writing when the store was cleared after
    /// `generation` was observed, or holds no refresh token anymore.
    pub fn apply_refresh(
        &self,
        generation: u64,
        access_token: &str,
        rotated_refresh: Option<&str>,
    ) -> StorageResult<Option<CredentialPair>> {
        let inner = self.lock();
        if inner.generation != generation {
            debug!(
                expected = generation,
                current = inner.generation,
                "Discarding refresh result for cleared session"
            );
            return Ok(None);
        }

        let Some(current_refresh) = Self::read(&inner, REFRESH_KEY) else {
            return Ok(None);
        };

        let pair = CredentialPair::new(
            access_token,
            rotated_refresh.map(str::to_string).unwrap_or(current_refresh),
        );
        Self::write_pair(&inner, &pair)?;
        Ok(Some(pair))
    }

    /// Remove tokens and cached user.
    ///
    /// The generation is bumped even when the backend fails, so pending
    /// refreshes never repopulate a session the caller meant to end.
    pub fn clear(&self) -> StorageResult<()> {
        Self::clear_locked(&mut self.lock())
    }

    fn clear_locked(inner: &mut Inner) -> StorageResult<()> {
        inner.generation += 1;

        let mut first_error: Option<StorageError> = None;
        for key in [ACCESS_KEY, REFRESH_KEY, USER_KEY] {
            if let Err(e) = inner.backend.delete(key) {
                warn!(key, error = %e, "Failed to delete credential");
                first_error.get_or_insert(e);
            }
        }
        debug!(generation = inner.generation, "Credential store cleared");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Clear only if nothing else cleared the store since `generation` was
    /// observed. Returns whether a clear happened.
    pub fn clear_if_generation(&self, generation: u64) -> StorageResult<bool> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return Ok(false);
        }
        Self::clear_locked(&mut inner).map(|()| true)
    }

    /// Current clear-generation
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// The stored pair together with the generation it was read under.
    pub fn snapshot(&self) -> (Option<CredentialPair>, u64) {
        let inner = self.lock();
        (Self::read_pair(&inner), inner.generation)
    }

    pub fn cached_user(&self) -> Option<User> {
        let inner = self.lock();
        let raw = Self::read(&inner, USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Cached user is unreadable");
                None
            }
        }
    }

    /// Replace the cached user only if the session observed at `generation`
    /// is still the stored one. Returns whether the write happened.
    pub fn set_cached_user_if_generation(&self, generation: u64, user: &User) -> StorageResult<bool> {
        let inner = self.lock();
        if inner.generation != generation || Self::read_pair(&inner).is_none() {
            debug!(
                expected = generation,
                current = inner.generation,
                "Not caching user for a session that ended"
            );
            return Ok(false);
        }
        let serialized = serde_json::to_string(user)?;
        inner.backend.set(USER_KEY, &serialized)?;
        Ok(true)
    }
}
