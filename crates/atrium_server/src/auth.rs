//! Credential verification for the connection handshake.
//!
//! Connections present an opaque bearer token as a handshake query
//! parameter. Verification is the only identity operation in the core: it
//! yields the stable user identifier every other component keys on, or
//! fails, in which case the connection is closed with no state created.
//! Display names are deliberately not read from the credential; the
//! membership tracker fetches them from the profile directory.

use crate::error::ServerError;
use crate::ident::UserId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a connection credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The stable user identifier
    pub sub: String,
    /// Expiry as seconds since the Unix epoch
    pub exp: i64,
}

/// Verifies an opaque credential and yields a stable user identifier.
///
/// Implementations must be stateless with respect to connections: a
/// verification failure has no observable side effect.
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `credential` and returns the identifier it vouches for.
    fn verify(&self, credential: &str) -> Result<UserId, ServerError>;
}

/// HS256 token verifier backed by a shared secret.
///
/// Failure messages are generic on purpose; the concrete cause is logged
/// server-side only.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Creates a verifier for the given shared secret.
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Issues a credential for `user_id` valid for `ttl_secs` seconds.
    ///
    /// Used by development tooling and tests; production deployments mint
    /// credentials in the account service, not here.
    pub fn issue(&self, user_id: &UserId, ttl_secs: i64) -> Result<String, ServerError> {
        let claims = Claims {
            sub: user_id.0.clone(),
            exp: chrono::Utc::now().timestamp() + ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServerError::Internal(format!("Token issuing failed: {e}")))
    }
}

impl IdentityVerifier for TokenVerifier {
    fn verify(&self, credential: &str) -> Result<UserId, ServerError> {
        let data = decode::<Claims>(credential, &self.decoding_key, &self.validation).map_err(
            |e| {
                tracing::debug!("Credential rejected: {e}");
                ServerError::Authentication("invalid or expired credential".to_string())
            },
        )?;
        Ok(UserId(data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_token_yields_subject() {
        let verifier = TokenVerifier::new("test-secret");
        let token = verifier.issue(&UserId::from("u1"), 60).expect("issuable");

        let user = verifier.verify(&token).expect("valid credential");
        assert_eq!(user, UserId::from("u1"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenVerifier::new("secret-a");
        let verifier = TokenVerifier::new("secret-b");
        let token = issuer.issue(&UserId::from("u1"), 60).expect("issuable");

        assert!(matches!(
            verifier.verify(&token),
            Err(ServerError::Authentication(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = TokenVerifier::new("test-secret");
        let token = verifier.issue(&UserId::from("u1"), -120).expect("issuable");

        assert!(matches!(
            verifier.verify(&token),
            Err(ServerError::Authentication(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let verifier = TokenVerifier::new("test-secret");
        assert!(matches!(
            verifier.verify("not-a-token"),
            Err(ServerError::Authentication(_))
        ));
    }
}
