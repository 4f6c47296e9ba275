//! OAuth 1.0a request signing (HMAC-SHA1).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

use super::AuthProvider;
use crate::errors::{StreamError, StreamResult};
use crate::transport::HttpRequest;

/// RFC 3986 encoding: everything except ALPHA / DIGIT / "-" / "." / "_" / "~".
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// User-context OAuth 1.0a signer.
///
/// Each request gets a fresh nonce and timestamp. The signature covers the
/// method, the endpoint URL without its query, and every query parameter.
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: SecretString,
    access_token: String,
    access_token_secret: SecretString,
}

impl OAuth1Signer {
    /// Creates a signer from the four account credentials.
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: SecretString,
        access_token: impl Into<String>,
        access_token_secret: SecretString,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret,
            access_token: access_token.into(),
            access_token_secret,
        }
    }

    /// Builds the `Authorization` header value for a request.
    ///
    /// # Errors
    ///
    /// Fails if the system clock is before the Unix epoch.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> StreamResult<String> {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| StreamError::authentication(format!("Failed to get timestamp: {e}")))?
            .as_secs()
            .to_string();

        self.authorization_with(method, url, params, &generate_nonce(), &timestamp)
    }

    /// Builds the header with a caller-supplied nonce and timestamp.
    pub(crate) fn authorization_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> StreamResult<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.access_token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        // Parameters are sorted after encoding.
        let mut encoded: Vec<(String, String)> = oauth_params
            .iter()
            .chain(params.iter())
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(url),
            percent_encode(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            percent_encode(self.consumer_secret.expose_secret()),
            percent_encode(self.access_token_secret.expose_secret())
        );

        let signature = hmac_sha1(&signing_key, &base_string)?;
        oauth_params.push(("oauth_signature".to_string(), signature));

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {header}"))
    }

    fn key_hint(&self) -> String {
        super::hint(&self.consumer_key)
    }
}

impl AuthProvider for OAuth1Signer {
    fn apply_auth(&self, url: &str, request: &mut HttpRequest) -> StreamResult<()> {
        let header = self.authorization(request.method.as_str(), url, &request.query)?;
        request.headers.insert("Authorization".to_string(), header);
        Ok(())
    }

    fn scheme(&self) -> &str {
        "OAuth"
    }

    fn validate(&self) -> StreamResult<()> {
        let missing: Vec<&str> = [
            ("consumer key", self.consumer_key.is_empty()),
            ("consumer secret", self.consumer_secret.expose_secret().is_empty()),
            ("access token", self.access_token.is_empty()),
            ("access token secret", self.access_token_secret.expose_secret().is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StreamError::authentication(format!(
                "OAuth credentials are empty: {}",
                missing.join(", ")
            )))
        }
    }
}

impl std::fmt::Debug for OAuth1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Signer")
            .field("consumer_key", &self.key_hint())
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}

/// Percent-encodes a string according to RFC 3986.
fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// 32 hex characters of randomness.
fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hmac_sha1(key: &str, data: &str) -> StreamResult<String> {
    type HmacSha1 = Hmac<Sha1>;

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| StreamError::authentication(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> OAuth1Signer {
        OAuth1Signer::new(
            "xvz1evFS4wEEPTGEFPHBog",
            SecretString::new("kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string()),
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            SecretString::new("LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string()),
        )
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("hello world"), "hello%20world");
        assert_eq!(percent_encode("foo=bar&baz"), "foo%3Dbar%26baz");
        assert_eq!(percent_encode("rust,tokio"), "rust%2Ctokio");
        assert_eq!(percent_encode("test-value_123.txt~"), "test-value_123.txt~");
        assert_eq!(percent_encode("caf\u{e9}"), "caf%C3%A9");
    }

    #[test]
    fn test_known_signature() {
        // Published reference request for HMAC-SHA1 user-context signing.
        let header = signer()
            .authorization_with(
                "post",
                "https://api.twitter.com/1.1/statuses/update.json",
                &[
                    ("include_entities".to_string(), "true".to_string()),
                    (
                        "status".to_string(),
                        "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
                    ),
                ],
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
                "1318622958",
            )
            .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_timestamp=\"1318622958\""));
    }

    #[test]
    fn test_nonce_is_fresh() {
        let a = generate_nonce();
        let b = generate_nonce();

        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_apply_auth_signs_query() {
        let mut request = HttpRequest::post("1.1/statuses/filter.json")
            .with_query("track", "rust,tokio");

        signer()
            .apply_auth("https://stream.twitter.com/1.1/statuses/filter.json", &mut request)
            .unwrap();

        let header = request.headers.get("Authorization").unwrap();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature="));
        assert!(!header.contains("track"));
    }

    #[test]
    fn test_validate_names_empty_fields() {
        let signer = OAuth1Signer::new(
            "key",
            SecretString::new(String::new()),
            "",
            SecretString::new("s".to_string()),
        );

        let err = signer.validate().unwrap_err().to_string();
        assert!(err.contains("consumer secret"));
        assert!(err.contains("access token"));
        assert!(!err.contains("consumer key"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains("kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw"));
        assert!(!debug.contains("370773112"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_debug_with_multibyte_consumer_key() {
        let signer = OAuth1Signer::new(
            "clé-consommateur-ü",
            SecretString::new("cs".to_string()),
            "at",
            SecretString::new("ats".to_string()),
        );

        let debug = format!("{:?}", signer);
        assert!(debug.contains("...ur-ü"));
    }
}
