//! Access-credential boundary.
//!
//! The SDK never owns or refreshes tokens. The host application's
//! authentication store implements [`CredentialProvider`]; the connection
//! manager queries it fresh on every `connect()` so a rotated token is
//! picked up without reconstructing the client.

use secrecy::SecretString;

/// Read-only source of the access token used to open the live connection.
pub trait CredentialProvider: Send + Sync + 'static {
    /// The current access token, or `None` when no session is active.
    ///
    /// A `None` return refuses the connection attempt outright; the SDK does
    /// not retry, since retrying without credentials cannot succeed.
    fn access_token(&self) -> Option<SecretString>;
}

/// Provider backed by a fixed token. Intended for CLI tools and tests; web
/// hosts should bridge their real authentication store instead.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: SecretString,
}

impl StaticCredentials {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> Option<SecretString> {
        Some(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret as _;

    use super::*;

    #[test]
    fn static_credentials_always_yield_token() {
        let provider = StaticCredentials::new("tok-123");
        let token = provider.access_token().expect("token should be present");
        assert_eq!(token.expose_secret(), "tok-123");
    }
}
