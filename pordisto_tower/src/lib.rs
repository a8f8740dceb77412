//! Tower middleware that authenticates bearer tokens, completes role
//! claims from the identity provider, and enforces role policies per
//! route.
//!
//! Each request moves through a fixed sequence: the authentication layer
//! validates the bearer token (401 on failure, before anything else
//! runs), completes the principal's role claims from the userinfo
//! endpoint when the token carried none, and attaches the principal to
//! the request; route-level policy layers then evaluate the resolved
//! requirement against the principal (403 on denial). Policy identifiers
//! are resolved when the layer is built, so a misspelled identifier fails
//! at route registration rather than on the first request.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{routing::post, Router};
//! use jsonwebtoken::{Algorithm, DecodingKey};
//! use pordisto::{AuthConfig, PolicyNameRef};
//! use pordisto_tower::{Authenticator, JwtAuthenticator, RoleAuthorizer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::from_env()?;
//! let resolver = config.resolver();
//! let userinfo = config.userinfo_client()?;
//!
//! let authenticator: Arc<dyn Authenticator> = Arc::new(
//!     JwtAuthenticator::new(
//!         DecodingKey::from_secret(b"dev-only-secret"),
//!         Algorithm::HS256,
//!         &config.authority,
//!         &config.audience,
//!     )
//!     .with_name_claim(config.name_claim.clone()),
//! );
//!
//! let authorizer = RoleAuthorizer::new().with_terse_error_handler::<axum::body::Body>();
//!
//! let app: Router = Router::new()
//!     .route(
//!         "/vehicles/entries",
//!         post(register_entry).layer(authorizer.policy_layer(
//!             &resolver,
//!             PolicyNameRef::from_str("ROLE_REQUIRED:SecurityGuard"),
//!         )?),
//!     )
//!     .layer(authorizer.authentication_layer(authenticator, userinfo));
//! # let _ = app;
//! # Ok(())
//! # }
//! # async fn register_entry() {}
//! ```

use std::{fmt, marker::PhantomData, sync::Arc};

use http::Response;
use pordisto::{
    userinfo::UserinfoClient, AuthPolicy, PolicyNameRef, PolicyResolver, RoleRequirement,
    RoleSet, UnknownPolicy,
};
use tower_http::{
    auth::AsyncRequireAuthorizationLayer, validate_request::ValidateRequestHeaderLayer,
};

mod authenticate;
mod authenticator;
mod authorize;
pub mod util;

pub use authenticate::AuthenticateBearer;
pub use authenticator::{AuthenticationError, Authenticator, JwtAuthenticator};
pub use authorize::RequireRoles;

/// Handler for responding to failures while authenticating a bearer token
pub trait OnAuthenticationError {
    /// The body type returned on an error
    type Body;

    /// Response when the authorization header is absent or not a bearer token
    fn on_missing_or_malformed(&self) -> Response<Self::Body>;

    /// Response when the token was rejected by the authentication gateway
    fn on_token_rejected(&self, error: AuthenticationError) -> Response<Self::Body>;
}

/// Handler for responding to failures while evaluating a role policy
pub trait OnAuthorizationError {
    /// The body type returned on an error
    type Body;

    /// Response when no principal was attached to the request
    ///
    /// This indicates a wiring mistake: a policy layer ran without an
    /// authentication layer above it.
    fn on_missing_principal(&self) -> Response<Self::Body>;

    /// Response when the held roles do not satisfy the policy
    fn on_policy_failure(&self, held: &RoleSet, policy: &AuthPolicy) -> Response<Self::Body>;
}

/// Builder for layers that authenticate bearer tokens and enforce role
/// policies
pub struct RoleAuthorizer<OnError> {
    on_error: OnError,
}

impl<OnError> Clone for RoleAuthorizer<OnError>
where
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            on_error: self.on_error.clone(),
        }
    }
}

impl<OnError> Copy for RoleAuthorizer<OnError> where OnError: Copy {}

impl<OnError> fmt::Debug for RoleAuthorizer<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleAuthorizer")
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl RoleAuthorizer<()> {
    /// Constructs a new authorizer with no error handler attached
    #[inline]
    pub fn new() -> Self {
        Self { on_error: () }
    }

    /// Attaches a custom error handler to generate responses in the event
    /// of an authentication or authorization failure
    #[inline]
    pub fn with_error_handler<OnError>(self, on_error: OnError) -> RoleAuthorizer<OnError> {
        RoleAuthorizer { on_error }
    }

    /// Attaches the default terse error handler: [`TerseErrorHandler`]
    ///
    /// Generates responses carrying the relevant status code and
    /// `www-authenticate` header with an empty body
    #[inline]
    pub fn with_terse_error_handler<ResBody: Default>(
        self,
    ) -> RoleAuthorizer<TerseErrorHandler<ResBody>> {
        RoleAuthorizer {
            on_error: TerseErrorHandler::new(),
        }
    }

    /// Attaches the default verbose error handler: [`VerboseErrorHandler`]
    ///
    /// Generates the same responses as the terse handler but includes a
    /// failure description, and the acceptable roles on a denial, in the
    /// `www-authenticate` header
    #[inline]
    pub fn with_verbose_error_handler<ResBody: Default>(
        self,
    ) -> RoleAuthorizer<VerboseErrorHandler<ResBody>> {
        RoleAuthorizer {
            on_error: VerboseErrorHandler::new(),
        }
    }
}

impl Default for RoleAuthorizer<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<OnError> RoleAuthorizer<OnError>
where
    OnError: Clone,
{
    /// Layer that authenticates the bearer token on every request
    ///
    /// Token validation is delegated to the given [`Authenticator`]; on
    /// success the principal's role claims are completed once from the
    /// userinfo endpoint and the principal is attached to the request
    /// extensions for the policy layers below.
    pub fn authentication_layer(
        &self,
        authenticator: Arc<dyn Authenticator>,
        userinfo: UserinfoClient,
    ) -> AsyncRequireAuthorizationLayer<AuthenticateBearer<OnError>> {
        AsyncRequireAuthorizationLayer::new(AuthenticateBearer::new(
            authenticator,
            userinfo,
            self.on_error.clone(),
        ))
    }

    /// Layer enforcing a pre-built role requirement on a route
    pub fn role_layer(
        &self,
        requirement: RoleRequirement,
    ) -> ValidateRequestHeaderLayer<RequireRoles<OnError>> {
        ValidateRequestHeaderLayer::custom(RequireRoles::new(
            AuthPolicy::RoleRequired(requirement),
            self.on_error.clone(),
        ))
    }

    /// Layer enforcing the policy named by `name`, resolved immediately
    ///
    /// Resolution happens here, at route registration time; an identifier
    /// unknown to the resolver is a configuration error reported before
    /// the route ever serves a request.
    pub fn policy_layer(
        &self,
        resolver: &PolicyResolver,
        name: &PolicyNameRef,
    ) -> Result<ValidateRequestHeaderLayer<RequireRoles<OnError>>, UnknownPolicy> {
        let policy = resolver.resolve_required(name)?;
        Ok(ValidateRequestHeaderLayer::custom(RequireRoles::new(
            policy,
            self.on_error.clone(),
        )))
    }

    /// Layer enforcing the resolver's default policy: any authenticated
    /// principal is allowed
    pub fn default_policy_layer(
        &self,
        resolver: &PolicyResolver,
    ) -> ValidateRequestHeaderLayer<RequireRoles<OnError>> {
        ValidateRequestHeaderLayer::custom(RequireRoles::new(
            resolver.default_policy(),
            self.on_error.clone(),
        ))
    }
}

/// Responds to failures with a status code and `www-authenticate` header
/// only, revealing nothing about the cause
pub struct TerseErrorHandler<ResBody> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> TerseErrorHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for TerseErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TerseErrorHandler")
    }
}

impl<ResBody> Default for TerseErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<ResBody> Clone for TerseErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for TerseErrorHandler<ResBody> {}

impl<ResBody> OnAuthenticationError for TerseErrorHandler<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_missing_or_malformed(&self) -> Response<Self::Body> {
        tracing::debug!("bearer authentication failed: authorization token is missing or malformed");
        util::unauthorized("")
    }

    #[inline]
    fn on_token_rejected(&self, _: AuthenticationError) -> Response<Self::Body> {
        tracing::debug!("bearer authentication failed: token rejected");
        util::unauthorized("")
    }
}

impl<ResBody> OnAuthorizationError for TerseErrorHandler<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_missing_principal(&self) -> Response<Self::Body> {
        tracing::debug!("role policy ran without a principal on the request");
        util::forbidden("", None)
    }

    #[inline]
    fn on_policy_failure(&self, _: &RoleSet, _: &AuthPolicy) -> Response<Self::Body> {
        util::forbidden("", None)
    }
}

/// Responds to failures with a status code and a `www-authenticate`
/// header describing the failure and, on a denial, the acceptable roles
pub struct VerboseErrorHandler<ResBody> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> VerboseErrorHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for VerboseErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerboseErrorHandler")
    }
}

impl<ResBody> Default for VerboseErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<ResBody> Clone for VerboseErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for VerboseErrorHandler<ResBody> {}

impl<ResBody> OnAuthenticationError for VerboseErrorHandler<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_missing_or_malformed(&self) -> Response<Self::Body> {
        let message = "authorization token is missing or malformed";
        tracing::debug!("bearer authentication failed: {message}");
        util::unauthorized(message)
    }

    #[inline]
    fn on_token_rejected(&self, error: AuthenticationError) -> Response<Self::Body> {
        use std::fmt::Write;

        let mut description = String::new();
        let mut err: &dyn std::error::Error = &error;
        write!(&mut description, "{err}").unwrap();
        while let Some(next) = err.source() {
            write!(&mut description, ": {next}").unwrap();
            err = next;
        }
        tracing::debug!("bearer authentication failed: {description}");
        util::unauthorized(&description)
    }
}

impl<ResBody> OnAuthorizationError for VerboseErrorHandler<ResBody>
where
    ResBody: Default,
{
    type Body = ResBody;

    #[inline]
    fn on_missing_principal(&self) -> Response<Self::Body> {
        let message = "request reached a role policy without an authenticated principal";
        tracing::debug!("{message}");
        util::forbidden(message, None)
    }

    #[inline]
    fn on_policy_failure(&self, held: &RoleSet, policy: &AuthPolicy) -> Response<Self::Body> {
        tracing::debug!(?held, "held roles do not satisfy the endpoint's role policy");
        util::forbidden(
            "held roles do not satisfy the endpoint's role policy",
            Some(policy),
        )
    }
}
