use std::fmt;

use serde::{Deserialize, Serialize};

/// Access + refresh token pair for the current session.
///
/// Persisted as a unit: a store holding only one half is treated as empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens never end up in logs.
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// `tokens` object as returned by the login and refresh endpoints.
///
/// `refresh` is optional because not every deployment rotates the refresh
/// token on each exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
