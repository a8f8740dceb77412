//! Role claim augmentation from the identity provider's userinfo endpoint
//!
//! Some identity providers omit role claims from the access tokens they
//! mint, reporting membership only through the OpenID Connect userinfo
//! endpoint. Augmentation bridges that gap: once per request, after token
//! validation succeeds and before any policy is evaluated, a principal
//! with no role claims is completed from userinfo. The policy stage never
//! proceeds while an augmentation is still in flight.
//!
//! Provider failures are deliberately suppressed: the request continues
//! with zero role claims and, to downstream authorization, is
//! indistinguishable from a user who genuinely holds no roles. The
//! [`Augmentation`] result keeps the two cases distinguishable to callers
//! and tests even though the authorization outcome is the same.

use std::time::Duration;

use serde::Deserialize;

use crate::{principal::Principal, role::RoleSet};

/// Upper bound on a single userinfo request
///
/// The wait is per-request and independent across requests, but it must
/// still be bounded so a hung provider cannot stall a request forever.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The provider's claims document; only role membership is consumed
#[derive(Debug, Deserialize)]
struct UserinfoDocument {
    #[serde(default)]
    role: RoleSet,
}

/// A client for the identity provider's userinfo endpoint
///
/// Holds a connection pool and the resolved endpoint URL; construct one at
/// startup and share it across requests.
#[derive(Clone, Debug)]
pub struct UserinfoClient {
    endpoint: String,
    client: reqwest::Client,
}

/// Configures and constructs a [`UserinfoClient`]
#[derive(Debug)]
#[must_use]
pub struct UserinfoClientBuilder {
    authority: String,
    timeout: Duration,
    danger_accept_invalid_certs: bool,
}

impl UserinfoClientBuilder {
    /// Overrides the bounded timeout applied to each userinfo request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables TLS certificate validation for userinfo requests
    ///
    /// Strictly for non-production use against providers with self-signed
    /// certificates; validation stays strict unless this is called with
    /// `true`.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Builds the client
    pub fn build(self) -> Result<UserinfoClient, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pordisto/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .build()?;

        Ok(UserinfoClient::from_client(&self.authority, client))
    }
}

impl UserinfoClient {
    /// Starts building a client for the given authority base URL
    pub fn builder(authority: impl Into<String>) -> UserinfoClientBuilder {
        UserinfoClientBuilder {
            authority: authority.into(),
            timeout: DEFAULT_TIMEOUT,
            danger_accept_invalid_certs: false,
        }
    }

    /// Constructs a client with default options
    pub fn new(authority: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::builder(authority).build()
    }

    /// Constructs a client around an existing `reqwest` client
    ///
    /// The caller keeps responsibility for bounding request time on the
    /// provided client.
    pub fn from_client(authority: &str, client: reqwest::Client) -> Self {
        Self {
            endpoint: format!("{}/userinfo", authority.trim_end_matches('/')),
            client,
        }
    }

    /// The fully resolved userinfo endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches the role claims reported for the holder of `token`
    ///
    /// A single attempt with no retry; an unreachable provider or an error
    /// status surfaces as the error.
    pub async fn fetch_role_claims(&self, token: &str) -> Result<RoleSet, reqwest::Error> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await?;
        response.error_for_status_ref()?;

        let document = response.json::<UserinfoDocument>().await?;
        Ok(document.role)
    }

    /// Completes a principal's role claims from the userinfo endpoint
    ///
    /// Runs at most one outbound call: a principal that already carries
    /// role claims is left untouched and no request is made. Fetched roles
    /// are unioned into the principal, never replacing existing membership.
    ///
    /// Provider errors are suppressed here by design: the error is logged,
    /// the principal keeps zero role claims, and the request proceeds to
    /// policy evaluation, where the missing roles will read as an ordinary
    /// denial rather than a server fault.
    pub async fn augment(&self, principal: &mut Principal, token: &str) -> Augmentation {
        if principal.has_role_claims() {
            tracing::trace!("principal already carries role claims; skipping userinfo");
            return Augmentation::Skipped;
        }

        match self.fetch_role_claims(token).await {
            Ok(roles) if roles.is_empty() => {
                tracing::debug!("userinfo reported no role claims for principal");
                Augmentation::NoRolesClaimed
            }
            Ok(roles) => {
                principal.grant_roles(roles.clone());
                Augmentation::RolesFound(roles)
            }
            Err(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(
                    error,
                    userinfo.endpoint = %self.endpoint,
                    "userinfo request failed; continuing with no role claims",
                );
                Augmentation::ProviderError
            }
        }
    }
}

/// The outcome of one augmentation attempt
///
/// `NoRolesClaimed` and `ProviderError` produce identical authorization
/// behavior downstream; they are kept distinct so that callers, logs, and
/// tests can tell a quiet provider from a broken one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Augmentation {
    /// The provider reported roles and they were granted to the principal
    RolesFound(RoleSet),

    /// The provider answered but reported no role membership
    NoRolesClaimed,

    /// The provider was unreachable or answered with an error status;
    /// the failure was suppressed and the principal keeps zero role claims
    ProviderError,

    /// The principal already carried role claims; no call was made
    Skipped,
}
