//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialStore`: durable token + profile storage over a `StorageBackend`
//! - `RefreshCoordinator`: single-flight access token renewal
//! - `SessionController`: the login/logout state machine
//! - `SessionState`: the observable authentication state
//!
//! Sessions persist across restarts and are trusted until the server
//! rejects the access token and a refresh fails.

pub mod credentials;
pub mod refresh;
pub mod session;
pub mod state;
pub mod storage;

pub use credentials::CredentialStore;
pub use refresh::RefreshCoordinator;
pub use session::SessionController;
pub use state::{SessionState, SessionStateHandle};
pub use storage::{
    FileBackend, KeyringBackend, MemoryBackend, StorageBackend, StorageError, StorageResult,
};
