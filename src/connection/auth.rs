//! Credential handling for DeltaStream connections.
//!
//! Every request carries a bearer token obtained from a [`TokenProvider`].
//! Acquiring and refreshing tokens is the provider's business; the driver
//! asks for a token per request and never caches it.

use crate::error::{ConnectionError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return the token to send with the next request.
    ///
    /// # Errors
    ///
    /// Returns an error if no token can be obtained.
    async fn token(&self) -> Result<String>;
}

/// A fixed API token.
///
/// The token is never displayed and its bytes are zeroed on drop.
#[derive(Clone)]
pub struct StaticToken {
    secret: Arc<SecretString>,
}

impl StaticToken {
    /// Wrap a token.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::MissingToken` if the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, ConnectionError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ConnectionError::MissingToken);
        }
        Ok(Self {
            secret: Arc::new(SecretString::new(token)),
        })
    }

    pub(crate) fn expose(&self) -> &str {
        self.secret.as_str()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.expose().to_string())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// String whose bytes are zeroed on drop.
struct SecretString {
    data: Vec<u8>,
}

impl SecretString {
    fn new(s: String) -> Self {
        Self {
            data: s.into_bytes(),
        }
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.data).unwrap_or_default()
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        for byte in &mut self.data {
            *byte = 0;
        }
    }
}
