//! Process-wide authorization configuration
//!
//! Everything here is read once at startup and shared read-only for the
//! life of the process. The variable names mirror the deployment
//! environment of the wider system: `ID_SERVER_URL` points at the OpenID
//! Connect authority and `CLIENT_ID` is the audience value this API
//! expects to find in inbound tokens.

use std::env;

use thiserror::Error;

use crate::resolver::{PolicyResolver, RoleMapping};

/// Environment variable naming the identity provider's base URL (required)
pub const ID_SERVER_URL_VAR: &str = "ID_SERVER_URL";

/// Environment variable naming the expected token audience (required)
pub const CLIENT_ID_VAR: &str = "CLIENT_ID";

/// Environment variable naming the claim mapped to the display name (optional)
pub const NAME_CLAIM_VAR: &str = "NAME_CLAIM";

/// Environment variable carrying the logical-to-physical role table (optional)
///
/// Comma-separated `Logical=physical` pairs, e.g.
/// `Administrator=realm-admin,SecurityGuard=realm-guard`.
pub const ROLE_NAMES_VAR: &str = "ROLE_NAMES";

/// Environment variable relaxing TLS certificate validation (optional)
///
/// Strictly for non-production use against identity providers with
/// self-signed certificates. Anything other than `1` or `true` leaves
/// validation strict.
pub const DANGER_ACCEPT_INVALID_CERTS_VAR: &str = "DANGER_ACCEPT_INVALID_CERTS";

/// The default claim used for the principal's display name
pub const DEFAULT_NAME_CLAIM: &str = "sub";

/// A configuration value that was missing or malformed at startup
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value was absent or empty
    #[error("please configure the `{0}` environment variable")]
    MissingValue(&'static str),

    /// A `ROLE_NAMES` entry did not have the `Logical=physical` shape
    #[error("malformed `ROLE_NAMES` entry `{0}`; expected `Logical=physical`")]
    MalformedRoleMapping(String),
}

/// Startup configuration for the authorization pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    /// Base URL of the OpenID Connect authority
    pub authority: String,

    /// Audience value expected in inbound tokens
    pub audience: String,

    /// Claim mapped to the principal's display name
    pub name_claim: String,

    /// Logical-to-physical role translation table, when configured
    pub role_mapping: Option<RoleMapping>,

    /// Whether outbound TLS certificate validation is relaxed
    pub danger_accept_invalid_certs: bool,
}

impl AuthConfig {
    /// Loads configuration from the process environment
    ///
    /// Fails when either required value (`ID_SERVER_URL`, `CLIENT_ID`) is
    /// absent or empty; callers are expected to treat that as fatal and
    /// exit nonzero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingValue(var))
        };

        let authority = required(ID_SERVER_URL_VAR)?;
        let audience = required(CLIENT_ID_VAR)?;

        let name_claim = lookup(NAME_CLAIM_VAR)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAME_CLAIM.to_owned());

        let role_mapping = match lookup(ROLE_NAMES_VAR) {
            Some(raw) if !raw.trim().is_empty() => Some(parse_role_mapping(&raw)?),
            _ => None,
        };

        let danger_accept_invalid_certs = lookup(DANGER_ACCEPT_INVALID_CERTS_VAR)
            .map(|value| {
                let value = value.trim();
                value == "1" || value.eq_ignore_ascii_case("true")
            })
            .unwrap_or(false);

        if danger_accept_invalid_certs {
            tracing::warn!(
                "TLS certificate validation is DISABLED for identity provider calls; \
                 never run production this way"
            );
        }

        Ok(Self {
            authority,
            audience,
            name_claim,
            role_mapping,
            danger_accept_invalid_certs,
        })
    }

    /// Builds the policy resolver described by this configuration
    pub fn resolver(&self) -> PolicyResolver {
        let resolver = PolicyResolver::new();
        match &self.role_mapping {
            Some(mapping) => resolver.with_role_mapping(mapping.clone()),
            None => resolver,
        }
    }

    /// Builds the userinfo client described by this configuration
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn userinfo_client(&self) -> Result<crate::userinfo::UserinfoClient, reqwest::Error> {
        crate::userinfo::UserinfoClient::builder(&self.authority)
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .build()
    }
}

fn parse_role_mapping(raw: &str) -> Result<RoleMapping, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(logical, physical)| (logical.trim(), physical.trim()))
                .filter(|(logical, physical)| !logical.is_empty() && !physical.is_empty())
                .ok_or_else(|| ConfigError::MalformedRoleMapping(entry.to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            pairs
                .iter()
                .find(|(name, _)| *name == var)
                .map(|(_, value)| (*value).to_owned())
        }
    }

    #[test]
    fn loads_a_minimal_environment() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            (ID_SERVER_URL_VAR, "https://id.example.com/realms/condo"),
            (CLIENT_ID_VAR, "condo-api"),
        ]))
        .unwrap();

        assert_eq!(config.authority, "https://id.example.com/realms/condo");
        assert_eq!(config.audience, "condo-api");
        assert_eq!(config.name_claim, DEFAULT_NAME_CLAIM);
        assert_eq!(config.role_mapping, None);
        assert!(!config.danger_accept_invalid_certs);
    }

    #[test]
    fn missing_authority_is_fatal() {
        let err = AuthConfig::from_lookup(lookup_from(&[(CLIENT_ID_VAR, "condo-api")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingValue(ID_SERVER_URL_VAR));
    }

    #[test]
    fn blank_audience_is_treated_as_missing() {
        let err = AuthConfig::from_lookup(lookup_from(&[
            (ID_SERVER_URL_VAR, "https://id.example.com"),
            (CLIENT_ID_VAR, "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingValue(CLIENT_ID_VAR));
    }

    #[test]
    fn parses_the_role_mapping_table() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            (ID_SERVER_URL_VAR, "https://id.example.com"),
            (CLIENT_ID_VAR, "condo-api"),
            (
                ROLE_NAMES_VAR,
                "Administrator=realm-admin, SecurityGuard=realm-guard",
            ),
        ]))
        .unwrap();

        let mapping = config.role_mapping.unwrap();
        assert_eq!(
            mapping.physical("Administrator").map(|r| r.as_str()),
            Some("realm-admin")
        );
        assert_eq!(
            mapping.physical("SecurityGuard").map(|r| r.as_str()),
            Some("realm-guard")
        );
    }

    #[test]
    fn rejects_a_malformed_role_mapping_entry() {
        let err = AuthConfig::from_lookup(lookup_from(&[
            (ID_SERVER_URL_VAR, "https://id.example.com"),
            (CLIENT_ID_VAR, "condo-api"),
            (ROLE_NAMES_VAR, "Administrator"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::MalformedRoleMapping("Administrator".to_owned())
        );
    }

    #[test]
    fn danger_flag_defaults_to_strict_validation() {
        let strict = AuthConfig::from_lookup(lookup_from(&[
            (ID_SERVER_URL_VAR, "https://id.example.com"),
            (CLIENT_ID_VAR, "condo-api"),
            (DANGER_ACCEPT_INVALID_CERTS_VAR, "no"),
        ]))
        .unwrap();
        assert!(!strict.danger_accept_invalid_certs);

        let relaxed = AuthConfig::from_lookup(lookup_from(&[
            (ID_SERVER_URL_VAR, "https://id.example.com"),
            (CLIENT_ID_VAR, "condo-api"),
            (DANGER_ACCEPT_INVALID_CERTS_VAR, "true"),
        ]))
        .unwrap();
        assert!(relaxed.danger_accept_invalid_certs);
    }
}
