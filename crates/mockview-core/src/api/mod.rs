//! REST API client module for the mockview backend.
//!
//! Every call goes through the `RequestGateway`, which attaches the bearer
//! access token and transparently renews it once on a 401. `ApiClient`
//! layers the typed auth endpoints on top.

pub mod client;
pub mod error;
pub mod gateway;
pub mod request;

pub use client::{build_http_client, ApiClient, DEFAULT_API_URL};
pub use error::{ApiError, FieldError, RefreshError};
pub use gateway::RequestGateway;
pub use request::{ApiRequest, Attempt, AuthMode};
