//! Role requirements and their evaluation

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::role::{HasRoles, RoleName, RoleSet};

/// A rule against which a request's granted access will be evaluated
pub trait Policy {
    /// The request type evaluated by this policy
    type Request;

    /// The error returned when this policy denies a request
    type Denial: fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Evaluates the request, producing an allow or deny effect
    ///
    /// A denial is a plain negative result; it carries no panic or other
    /// control-flow side effect.
    fn evaluate(&self, request: &Self::Request) -> Result<(), Self::Denial>;
}

impl<T> Policy for &'_ T
where
    T: Policy,
{
    type Request = T::Request;
    type Denial = T::Denial;

    fn evaluate(&self, request: &Self::Request) -> Result<(), Self::Denial> {
        T::evaluate(self, request)
    }
}

impl<T> Policy for Arc<T>
where
    T: Policy,
{
    type Request = T::Request;
    type Denial = T::Denial;

    fn evaluate(&self, request: &Self::Request) -> Result<(), Self::Denial> {
        T::evaluate(self, request)
    }
}

/// Indicates the requester held none of the roles accepted by a requirement
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Error)]
#[error("insufficient role")]
pub struct InsufficientRole;

/// The set of roles acceptable for one endpoint
///
/// A requirement is satisfied when the identity holds at least one of the
/// required roles; it does not demand all of them. Membership is exact and
/// case-sensitive, with no normalization of either side. A requirement
/// with no roles denies every request.
///
/// Requirements are built once, at route registration time, and reused
/// unchanged across every request to that endpoint.
///
/// # Example
///
/// ```
/// use pordisto::{Policy, RoleRequirement, roles};
///
/// let requirement = RoleRequirement::new(["Administrator", "SecurityGuard"]);
///
/// assert!(requirement.evaluate(&roles!["SecurityGuard"]).is_ok());
/// assert!(requirement.evaluate(&roles!["Resident"]).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct RoleRequirement {
    roles: RoleSet,
}

impl RoleRequirement {
    /// Constructs a requirement accepting any of the given roles
    pub fn new<I>(roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RoleName>,
    {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    /// The roles accepted by this requirement
    #[inline]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }
}

impl From<RoleSet> for RoleRequirement {
    #[inline]
    fn from(roles: RoleSet) -> Self {
        Self { roles }
    }
}

impl Policy for RoleRequirement {
    type Request = RoleSet;
    type Denial = InsufficientRole;

    fn evaluate(&self, held: &Self::Request) -> Result<(), Self::Denial> {
        let allowed = held.iter().any(|role| self.roles.contains(role));

        if allowed {
            Ok(())
        } else {
            Err(InsufficientRole)
        }
    }
}

impl HasRoles for RoleRequirement {
    #[inline]
    fn roles(&self) -> &RoleSet {
        &self.roles
    }
}
