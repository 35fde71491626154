//! Auth session seam
//!
//! Token acquisition (RSA or certificate authentication) happens outside this
//! crate. The loop only needs a source of the current session and key manager
//! tokens and a way to ask for them to be renewed after the agent rejects them.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::AuthError;

/// Session and key manager tokens sent with every datafeed call
///
/// Both are wrapped in `SecretString`, so `Debug` output never contains them.
#[derive(Clone)]
pub struct AuthTokens {
    session_token: SecretString,
    key_manager_token: SecretString,
}

impl AuthTokens {
    pub fn new(session_token: impl Into<String>, key_manager_token: impl Into<String>) -> Self {
        Self {
            session_token: SecretString::from(session_token.into()),
            key_manager_token: SecretString::from(key_manager_token.into()),
        }
    }

    /// Expose the session token. Only call this when building a request.
    pub fn session_token(&self) -> &str {
        self.session_token.expose_secret()
    }

    /// Expose the key manager token. Only call this when building a request.
    pub fn key_manager_token(&self) -> &str {
        self.key_manager_token.expose_secret()
    }
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthTokens([REDACTED])")
    }
}

/// Source of authentication tokens for the datafeed transport
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Current tokens
    async fn tokens(&self) -> Result<AuthTokens, AuthError>;

    /// Renew tokens after the agent answered 401.
    ///
    /// The default does nothing, which suits sessions that cannot be renewed.
    async fn refresh(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Auth session over tokens that were acquired up front
#[derive(Debug, Clone)]
pub struct StaticAuthSession {
    tokens: AuthTokens,
}

impl StaticAuthSession {
    pub fn new(session_token: impl Into<String>, key_manager_token: impl Into<String>) -> Self {
        Self {
            tokens: AuthTokens::new(session_token, key_manager_token),
        }
    }
}

#[async_trait]
impl AuthSession for StaticAuthSession {
    async fn tokens(&self) -> Result<AuthTokens, AuthError> {
        Ok(self.tokens.clone())
    }
}
