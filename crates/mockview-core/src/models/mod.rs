//! Data models shared between the API client and the session layer.
//!
//! - `User`: cached profile of the signed-in account
//! - `CredentialPair`: access + refresh token pair
//! - Wire payloads for the auth endpoints

pub mod tokens;
pub mod user;

pub use tokens::{CredentialPair, TokenPayload};
pub use user::User;
