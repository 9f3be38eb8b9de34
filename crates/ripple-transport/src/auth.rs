//! Authentication gate.
//!
//! Every connection attempt carries `token` and `userId` as query
//! parameters on the handshake request. Both must be present and non-empty
//! or the connection is refused before any handler sees it.
//!
//! This is presence-only validation, a structural precondition rather than
//! an authorization decision: the token is not verified against an identity
//! provider here.

use serde::Deserialize;
use thiserror::Error;

/// Raw handshake query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Opaque bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Claimed user identity.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Why a connection attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token in the handshake.
    #[error("Authentication error: missing token")]
    MissingToken,

    /// No user identity in the handshake.
    #[error("Authentication error: missing user identity")]
    MissingUserId,
}

/// Validated credentials, attached to the connection for its lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    token: String,
    user_id: String,
}

impl Credentials {
    /// Validate handshake parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if either credential is absent or empty.
    pub fn authenticate(params: ConnectParams) -> Result<Self, AuthError> {
        let token = params
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::MissingToken)?;
        let user_id = params
            .user_id
            .filter(|u| !u.trim().is_empty())
            .ok_or(AuthError::MissingUserId)?;

        Ok(Self { token, user_id })
    }

    /// The bearer token as supplied.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The authenticated user identity.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
