//! Request signing for the stream endpoint.
//!
//! The feed accepts either user-context OAuth 1.0a signatures or an
//! app-only bearer token. Both are applied to the outgoing request before a
//! session is opened, so a signing failure never tears down a running
//! session.

mod oauth1;

pub use oauth1::OAuth1Signer;

use secrecy::{ExposeSecret, SecretString};

use crate::errors::{StreamError, StreamResult};
use crate::transport::HttpRequest;

/// Authentication provider trait.
///
/// `url` is the absolute endpoint URL without its query string.
#[cfg_attr(test, mockall::automock)]
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to the request.
    fn apply_auth(&self, url: &str, request: &mut HttpRequest) -> StreamResult<()>;

    /// Get the authentication scheme name.
    fn scheme(&self) -> &str;

    /// Validate the credentials.
    fn validate(&self) -> StreamResult<()>;
}

/// App-only bearer token authentication.
pub struct BearerAuth {
    token: SecretString,
}

impl BearerAuth {
    /// Creates a new bearer token provider.
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }

    /// Creates from a string token.
    pub fn from_string(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    /// Gets a hint of the token for debugging (last 4 characters).
    pub fn key_hint(&self) -> String {
        hint(self.token.expose_secret())
    }
}

/// Masks all but the last four characters of a credential.
pub(crate) fn hint(value: &str) -> String {
    let count = value.chars().count();
    if count > 4 {
        let tail: String = value.chars().skip(count - 4).collect();
        format!("...{tail}")
    } else {
        "****".to_string()
    }
}

impl AuthProvider for BearerAuth {
    fn apply_auth(&self, _url: &str, request: &mut HttpRequest) -> StreamResult<()> {
        request.headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.token.expose_secret()),
        );
        Ok(())
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> StreamResult<()> {
        if self.token.expose_secret().trim().is_empty() {
            return Err(StreamError::authentication("Bearer token cannot be empty"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("token", &"[REDACTED]")
            .field("key_hint", &self.key_hint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_auth_apply() {
        let auth = BearerAuth::from_string("AAAAtoken1234");
        let mut request = HttpRequest::post("1.1/statuses/filter.json");

        auth.apply_auth("https://stream.twitter.com/1.1/statuses/filter.json", &mut request)
            .unwrap();

        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer AAAAtoken1234".to_string())
        );
        assert_eq!(auth.scheme(), "Bearer");
    }

    #[test]
    fn test_bearer_auth_validate() {
        assert!(BearerAuth::from_string("AAAAtoken").validate().is_ok());
        assert!(matches!(
            BearerAuth::from_string("  ").validate(),
            Err(StreamError::Authentication { .. })
        ));
    }

    #[test]
    fn test_key_hint() {
        assert_eq!(BearerAuth::from_string("AAAAtoken1234").key_hint(), "...1234");
        assert_eq!(BearerAuth::from_string("abc").key_hint(), "****");
    }

    #[test]
    fn test_key_hint_multibyte_token() {
        assert_eq!(BearerAuth::from_string("jeton-clé-éèàü").key_hint(), "...éèàü");
        assert_eq!(BearerAuth::from_string("ключ").key_hint(), "****");
        let debug = format!("{:?}", BearerAuth::from_string("секретный-ключ"));
        assert!(debug.contains("...ключ"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", BearerAuth::from_string("AAAAsecret-token"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("AAAAsecret"));
    }
}
