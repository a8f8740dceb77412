//! Role-based authorization for APIs secured by an OpenID Connect
//! identity provider
//!
//! Endpoints declare the roles they accept; the declaration is flattened
//! into a policy identifier at route registration time, resolved back into
//! an executable [`AuthPolicy`] per request, and evaluated against the
//! roles held by the request's [`Principal`]. When the inbound access
//! token carries no role claims, the principal is completed once per
//! request from the identity provider's userinfo endpoint before any
//! policy runs.
//!
//! This crate holds the pure pieces: the role vocabulary, the policy name
//! codec, the resolver, the evaluator, and the userinfo augmentation
//! client. Wiring them into an HTTP stack lives in the companion
//! middleware crates.
//!
//! # Example
//!
//! ```
//! use pordisto::{Policy, PolicyName, PolicyResolver, RoleName, roles};
//!
//! let resolver = PolicyResolver::new();
//!
//! // Route registration: the declared roles become an identifier…
//! let name = PolicyName::encode([&RoleName::new("SecurityGuard".to_string())]);
//!
//! // …and each request resolves and evaluates it.
//! let policy = resolver.resolve(&name).expect("identifier was produced by encode");
//! # use pordisto::Principal;
//! let mut principal = Principal::default();
//! principal.grant_roles(roles!["SecurityGuard"]);
//! assert!(policy.evaluate(&principal).is_ok());
//! ```
//!
//! # Feature flags
//!
//! The userinfo augmentation client calls out over HTTPS via `reqwest`
//! and is gated behind the `reqwest` feature, enabled by default.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod config;
mod policy;
mod policy_name;
mod principal;
mod resolver;
pub mod role;
#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod userinfo;

pub use config::{
    AuthConfig, ConfigError, CLIENT_ID_VAR, DANGER_ACCEPT_INVALID_CERTS_VAR,
    DEFAULT_NAME_CLAIM, ID_SERVER_URL_VAR, NAME_CLAIM_VAR, ROLE_NAMES_VAR,
};
pub use policy::{InsufficientRole, Policy, RoleRequirement};
pub use policy_name::{PolicyName, PolicyNameRef, ROLE_REQUIRED_PREFIX};
pub use principal::Principal;
pub use resolver::{AuthPolicy, PolicyResolver, RoleMapping, UnknownPolicy};
pub use role::{HasRoles, RoleName, RoleNameRef, RoleSet, ROLE_CLAIM};
