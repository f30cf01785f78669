//! Core library for the mockview interview client.
//!
//! Owns the authentication session: persisted credentials, single-flight
//! token refresh, the request gateway every API call goes through, and the
//! session state machine the UI observes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mockview_core::{Config, RecordingNavigator, SessionController};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let session = SessionController::new(
//!     &config.api_base_url(),
//!     config.open_store()?,
//!     Arc::new(RecordingNavigator::new()),
//! )?;
//! session.initialize();
//! if !session.is_authenticated() {
//!     session.login("a@b.com", "pw123456").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, ApiError, ApiRequest, FieldError, RefreshError, RequestGateway};
pub use auth::{CredentialStore, RefreshCoordinator, SessionController, SessionState};
pub use config::{Config, StorageKind};
pub use guard::{RouteAccess, RouteGuard};
pub use models::{CredentialPair, User};
pub use navigation::{Navigator, RecordingNavigator, Route};
