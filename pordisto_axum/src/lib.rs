//! Axum endpoint guards that declare, per handler, the roles a caller
//! must hold.
//!
//! A guard names its acceptable roles once; the declaration is flattened
//! into a policy identifier when the guard type is first used, and every
//! request resolves that identifier against the application's
//! [`PolicyResolver`] and evaluates the result against the authenticated
//! [`Principal`]. Guards expect two things on the request: the principal
//! attached by the bearer authentication layer, and a [`SharedResolver`]
//! attached as an extension.
//!
//! # Full example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{routing::{get, post}, Extension, Router};
//! use jsonwebtoken::{Algorithm, DecodingKey};
//! use pordisto::AuthConfig;
//! use pordisto_axum::{role_guards, Authenticated, SharedResolver};
//! use pordisto_tower::{Authenticator, JwtAuthenticator, RoleAuthorizer};
//!
//! role_guards! {
//!     guard AdminOnly = ["Administrator"];
//!     guard GateStaff = ["Administrator", "SecurityGuard"];
//! }
//!
//! async fn list_residents(guard: AdminOnly) -> String {
//!     format!("hello, {}", guard.principal().name().unwrap_or("administrator"))
//! }
//!
//! async fn entry_log(_: GateStaff) -> &'static str {
//!     "the gate log"
//! }
//!
//! async fn whoami(Authenticated(principal): Authenticated) -> String {
//!     principal.name().unwrap_or("anonymous").to_owned()
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::from_env()?;
//!     let authenticator: Arc<dyn Authenticator> = Arc::new(JwtAuthenticator::new(
//!         DecodingKey::from_secret(b"dev-only-secret"),
//!         Algorithm::HS256,
//!         &config.authority,
//!         &config.audience,
//!     ));
//!     let authorizer = RoleAuthorizer::new().with_terse_error_handler::<axum::body::Body>();
//!
//!     let app = Router::new()
//!         .route("/residents", get(list_residents))
//!         .route("/vehicles/entries/log", get(entry_log))
//!         .route("/me", get(whoami))
//!         .layer(authorizer.authentication_layer(authenticator, config.userinfo_client()?))
//!         .layer(Extension(SharedResolver::new(config.resolver())));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

use std::{error::Error, fmt, ops::Deref, sync::Arc};

use axum_core::response::{IntoResponse, Response};
use http::StatusCode;
use pordisto::{AuthPolicy, PolicyNameRef, PolicyResolver, Principal};

mod macros;

/// The policy identifier a guard type stores on its routes
pub trait EndpointRolePolicy {
    /// The identifier resolved and evaluated on each request to a guarded
    /// endpoint
    fn policy_name() -> &'static PolicyNameRef;
}

/// The application's policy resolver, shared with guards through the
/// request extensions
///
/// Attach one with `Extension(SharedResolver::new(resolver))` when
/// building the router.
#[derive(Clone, Debug)]
pub struct SharedResolver(Arc<PolicyResolver>);

impl SharedResolver {
    /// Wraps a resolver for sharing across requests
    pub fn new(resolver: PolicyResolver) -> Self {
        Self(Arc::new(resolver))
    }
}

impl Deref for SharedResolver {
    type Target = PolicyResolver;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// An extractor admitting any authenticated principal
///
/// This is the default policy as an extractor: authentication alone is
/// enough, no role is demanded. It consumes the principal from the
/// request extensions and hands it to the handler.
#[derive(Clone, Debug)]
pub struct Authenticated(pub Principal);

#[async_trait::async_trait]
impl<S> axum_core::extract::FromRequestParts<S> for Authenticated
where
    S: Sync,
{
    type Rejection = AuthFailed;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        __private::from_request_authenticated(parts).map(Self)
    }
}

/// An error indicating that the request could not be authorized
#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub enum AuthFailed {
    /// No principal was attached to the request; the bearer
    /// authentication layer is missing or ran below the guard
    MissingPrincipal,

    /// No [`SharedResolver`] extension was attached to the request
    MissingResolver,

    /// The guard's policy identifier is unknown to the resolver
    UnknownPolicy {
        /// The identifier that failed to resolve
        name: &'static str,
    },

    /// The principal's roles did not satisfy the endpoint's policy
    ///
    /// If a policy is carried, the error response will include the list
    /// of acceptable roles.
    InsufficientRole {
        /// The denied policy, carried only when verbose errors are enabled
        policy: Option<AuthPolicy>,
    },
}

impl fmt::Display for AuthFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailed::MissingPrincipal => f.write_str("authenticated principal missing"),
            AuthFailed::MissingResolver => f.write_str("policy resolver missing"),
            AuthFailed::UnknownPolicy { name } => {
                write!(f, "no policy registered for identifier `{name}`")
            }
            AuthFailed::InsufficientRole { policy: None } => f.write_str("insufficient role"),
            AuthFailed::InsufficientRole {
                policy: Some(policy),
            } => {
                f.write_str("insufficient role")?;
                if let AuthPolicy::RoleRequired(requirement) = policy {
                    f.write_str("; one of the following roles is required: [")?;
                    let mut first = true;
                    for role in requirement.roles() {
                        if !first {
                            f.write_str(", ")?;
                        }
                        write!(f, "{role}")?;
                        first = false;
                    }
                    f.write_str("]")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for AuthFailed {}

impl IntoResponse for AuthFailed {
    fn into_response(self) -> Response {
        match &self {
            AuthFailed::MissingPrincipal | AuthFailed::MissingResolver => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            AuthFailed::UnknownPolicy { .. } => {
                // A misconfigured route, not a caller problem
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            AuthFailed::InsufficientRole { .. } => {
                (StatusCode::FORBIDDEN, self.to_string()).into_response()
            }
        }
    }
}

/// Add this type as an extension to produce verbose errors when a guard
/// denies a request
///
/// When this extension is not present, denials carry no role listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerboseAuthErrors;

#[doc(hidden)]
pub mod __private {
    use http::request::Parts;
    pub use once_cell::sync::OnceCell;
    pub use pordisto::{PolicyName, PolicyNameRef, Principal, RoleName};
    use pordisto::Policy;

    use crate::{AuthFailed, SharedResolver, VerboseAuthErrors};

    pub fn from_request(
        parts: &mut Parts,
        name: &'static PolicyNameRef,
    ) -> Result<Principal, AuthFailed> {
        let principal = parts
            .extensions
            .remove::<Principal>()
            .ok_or(AuthFailed::MissingPrincipal)?;

        let resolver = parts
            .extensions
            .get::<SharedResolver>()
            .ok_or(AuthFailed::MissingResolver)?;

        let policy = resolver.resolve(name).ok_or(AuthFailed::UnknownPolicy {
            name: name.as_str(),
        })?;

        policy.evaluate(&principal).map_err(|_| {
            if parts.extensions.get::<VerboseAuthErrors>().is_some() {
                AuthFailed::InsufficientRole {
                    policy: Some(policy.clone()),
                }
            } else {
                AuthFailed::InsufficientRole { policy: None }
            }
        })?;

        Ok(principal)
    }

    pub fn from_request_authenticated(parts: &mut Parts) -> Result<Principal, AuthFailed> {
        parts
            .extensions
            .remove::<Principal>()
            .ok_or(AuthFailed::MissingPrincipal)
    }
}
