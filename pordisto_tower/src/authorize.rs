use std::fmt;

use http::{Request, Response};
use pordisto::{AuthPolicy, HasRoles, Policy, Principal};
use tower_http::validate_request::ValidateRequest;

use crate::OnAuthorizationError;

/// Evaluates one resolved policy against the request's principal
///
/// Expects the [`Principal`] to have been attached to the request
/// extensions by [`AuthenticateBearer`][crate::AuthenticateBearer] (or
/// otherwise) before this layer runs. A denial is answered with a 403; it
/// is an ordinary negative outcome, not a fault.
pub struct RequireRoles<OnError> {
    policy: AuthPolicy,
    on_error: OnError,
}

impl<OnError> Clone for RequireRoles<OnError>
where
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<OnError> fmt::Debug for RequireRoles<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequireRoles")
            .field("policy", &self.policy)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<OnError> RequireRoles<OnError> {
    pub(crate) fn new(policy: AuthPolicy, on_error: OnError) -> Self {
        Self { policy, on_error }
    }
}

impl<B, OnError> ValidateRequest<B> for RequireRoles<OnError>
where
    OnError: OnAuthorizationError,
    OnError::Body: Default,
{
    type ResponseBody = OnError::Body;

    fn validate(&mut self, request: &mut Request<B>) -> Result<(), Response<Self::ResponseBody>> {
        let principal = request
            .extensions()
            .get::<Principal>()
            .ok_or_else(|| self.on_error.on_missing_principal())?;

        tracing::trace!(held = ?principal.roles(), policy = ?self.policy, "evaluating role policy");

        self.policy
            .evaluate(principal)
            .map_err(|_| self.on_error.on_policy_failure(principal.roles(), &self.policy))?;

        Ok(())
    }
}
