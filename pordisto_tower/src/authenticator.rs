use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use pordisto::{Principal, DEFAULT_NAME_CLAIM};
use serde_json::{Map, Value};
use thiserror::Error;

/// A bearer token the gateway refused to accept
///
/// Carries the underlying validation failure as its source so verbose
/// error handlers can report the full chain.
#[derive(Debug, Error)]
#[error("bearer token rejected")]
pub struct AuthenticationError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl AuthenticationError {
    /// Wraps the underlying cause of a rejection
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthenticationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::new(err)
    }
}

/// Validates a raw bearer token and hands off the resulting principal
///
/// This is the authentication boundary of the pipeline: implementations
/// own signature, issuer, audience, and lifetime checks, and produce a
/// [`Principal`] that may still be role-incomplete. Everything downstream
/// of this trait (augmentation, policy evaluation) is provider-agnostic.
pub trait Authenticator: Send + Sync {
    /// Validates the token, producing the authenticated principal
    fn authenticate(&self, token: &str) -> Result<Principal, AuthenticationError>;
}

/// An [`Authenticator`] backed by the `jsonwebtoken` crate
///
/// Validates the token signature against a fixed decoding key and checks
/// `iss`, `aud`, and `exp`. The claim mapped to the principal's display
/// name defaults to `sub` and can be reconfigured to match the provider.
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
    name_claim: String,
}

impl fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material must not leak into logs
        f.debug_struct("JwtAuthenticator")
            .field("validation", &self.validation)
            .field("name_claim", &self.name_claim)
            .finish()
    }
}

impl JwtAuthenticator {
    /// Constructs an authenticator for one issuer and audience
    pub fn new(
        decoding_key: DecodingKey,
        algorithm: Algorithm,
        issuer: &str,
        audience: &str,
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);

        Self {
            decoding_key,
            validation,
            name_claim: DEFAULT_NAME_CLAIM.to_owned(),
        }
    }

    /// Reconfigures which claim becomes the principal's display name
    pub fn with_name_claim(mut self, claim: impl Into<String>) -> Self {
        self.name_claim = claim.into();
        self
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Principal, AuthenticationError> {
        let data =
            jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)?;

        Ok(Principal::from_claims(data.claims, &self.name_claim))
    }
}
