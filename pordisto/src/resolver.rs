//! Resolution of policy identifiers into executable policies

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    policy::{InsufficientRole, Policy, RoleRequirement},
    policy_name::{PolicyName, PolicyNameRef},
    principal::Principal,
    role::{HasRoles, RoleName},
};

/// An executable authorization policy bound to the bearer scheme
///
/// Endpoints name their policy with a string identifier; resolution turns
/// that identifier into one of these variants exactly once per lookup, so
/// evaluation never re-parses strings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum AuthPolicy {
    /// Allow any authenticated principal, with no role restriction
    Authenticated,

    /// Require the principal to hold at least one of a set of roles
    RoleRequired(RoleRequirement),
}

impl Policy for AuthPolicy {
    type Request = Principal;
    type Denial = InsufficientRole;

    fn evaluate(&self, principal: &Self::Request) -> Result<(), Self::Denial> {
        match self {
            // The principal's existence is the proof of authentication
            AuthPolicy::Authenticated => Ok(()),
            AuthPolicy::RoleRequired(requirement) => requirement.evaluate(principal.roles()),
        }
    }
}

/// The logical-to-physical role name table
///
/// Endpoint authors declare roles by logical name (`Administrator`); the
/// identity provider may be provisioned with differently spelled physical
/// roles (`realm-admin`). When a mapping is configured, resolution
/// translates each decoded logical name through it and logical names absent
/// from the table are dropped from the requirement. Without a mapping,
/// names pass through untouched.
///
/// The table is populated once from configuration at startup and read-only
/// afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleMapping {
    physical_by_logical: HashMap<String, RoleName>,
}

impl RoleMapping {
    /// Constructs an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a logical-to-physical translation
    pub fn map(mut self, logical: impl Into<String>, physical: impl Into<RoleName>) -> Self {
        self.physical_by_logical
            .insert(logical.into(), physical.into());
        self
    }

    /// Looks up the physical role for a logical name
    pub fn physical(&self, logical: &str) -> Option<&RoleName> {
        self.physical_by_logical.get(logical)
    }

    /// Whether the mapping contains no translations
    pub fn is_empty(&self) -> bool {
        self.physical_by_logical.is_empty()
    }
}

impl<L, P> FromIterator<(L, P)> for RoleMapping
where
    L: Into<String>,
    P: Into<RoleName>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (L, P)>,
    {
        Self {
            physical_by_logical: iter
                .into_iter()
                .map(|(logical, physical)| (logical.into(), physical.into()))
                .collect(),
        }
    }
}

/// Indicates that a policy identifier resolved to nothing
///
/// Surfacing this at route registration time turns a misspelled identifier
/// into a startup failure instead of a request-time surprise.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no policy registered for identifier `{name}`")]
pub struct UnknownPolicy {
    name: String,
}

impl UnknownPolicy {
    /// The identifier that failed to resolve
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Resolves policy identifiers into executable policies
///
/// Resolution is a two-stage pure lookup: identifiers carrying the
/// role-requirement prefix are decoded (and optionally translated through
/// the configured [`RoleMapping`]); anything else falls through to the
/// table of built-in policies. An identifier known to neither stage
/// resolves to `None`; resolution never errors and never panics.
///
/// # Example
///
/// ```
/// use pordisto::{AuthPolicy, PolicyName, PolicyNameRef, PolicyResolver, RoleName, RoleRequirement};
///
/// let resolver = PolicyResolver::new();
///
/// let name = PolicyName::encode([&RoleName::new("Administrator".to_string())]);
/// let policy = resolver.resolve(&name).unwrap();
/// assert_eq!(
///     policy,
///     AuthPolicy::RoleRequired(RoleRequirement::new(["Administrator"]))
/// );
///
/// assert_eq!(resolver.resolve(PolicyNameRef::from_str("SomeUnrelatedPolicy")), None);
/// ```
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct PolicyResolver {
    mapping: Option<RoleMapping>,
    built_in: HashMap<String, AuthPolicy>,
}

impl PolicyResolver {
    /// Constructs a resolver with no role mapping and no built-in policies
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the logical-to-physical role mapping
    ///
    /// An empty mapping is treated as absent, leaving the identity
    /// translation in place.
    pub fn with_role_mapping(mut self, mapping: RoleMapping) -> Self {
        self.mapping = if mapping.is_empty() {
            None
        } else {
            Some(mapping)
        };
        self
    }

    /// Registers a built-in policy under a fixed identifier
    ///
    /// Built-ins are the backup stage of resolution, consulted only for
    /// identifiers that do not carry the role-requirement prefix.
    pub fn with_built_in(mut self, name: impl Into<String>, policy: AuthPolicy) -> Self {
        self.built_in.insert(name.into(), policy);
        self
    }

    /// Resolves a policy identifier
    ///
    /// Never panics; an identifier known to neither resolution stage
    /// yields `None`.
    pub fn resolve(&self, name: &PolicyNameRef) -> Option<AuthPolicy> {
        if let Some(logical_roles) = name.decode() {
            let requirement = match &self.mapping {
                Some(mapping) => RoleRequirement::new(
                    logical_roles
                        .iter()
                        .filter_map(|role| mapping.physical(role.as_str()))
                        .cloned(),
                ),
                None => RoleRequirement::new(logical_roles),
            };

            return Some(AuthPolicy::RoleRequired(requirement));
        }

        self.built_in.get(name.as_str()).cloned()
    }

    /// Resolves a policy identifier, failing loudly when it is unknown
    ///
    /// Intended for route registration: a configuration mistake surfaces
    /// when the route is built rather than on the first request to it.
    pub fn resolve_required(&self, name: &PolicyNameRef) -> Result<AuthPolicy, UnknownPolicy> {
        self.resolve(name).ok_or_else(|| UnknownPolicy {
            name: name.as_str().to_owned(),
        })
    }

    /// The policy applied to endpoints that declare no explicit policy
    ///
    /// Always "require an authenticated principal" on the bearer scheme.
    pub fn default_policy(&self) -> AuthPolicy {
        AuthPolicy::Authenticated
    }

    /// The policy applied to endpoints with no authorization declaration at all
    ///
    /// None: such endpoints carry no implicit restriction.
    pub fn fallback_policy(&self) -> Option<AuthPolicy> {
        None
    }

    /// Encodes roles and resolves the result in one step
    ///
    /// Convenience for registration glue that holds a role list rather
    /// than a pre-encoded identifier.
    pub fn policy_for_roles<'a, I>(&self, roles: I) -> AuthPolicy
    where
        I: IntoIterator<Item = &'a RoleName>,
    {
        let name = PolicyName::encode(roles);
        self.resolve(&name)
            .expect("encoded role identifiers always resolve")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles;

    fn requirement(names: &[&str]) -> AuthPolicy {
        AuthPolicy::RoleRequired(RoleRequirement::new(names.iter().copied()))
    }

    #[test]
    fn resolves_an_encoded_single_role() {
        let resolver = PolicyResolver::new();
        let name = PolicyName::encode([&RoleName::new("Administrator".to_string())]);

        assert_eq!(
            resolver.resolve(&name),
            Some(requirement(&["Administrator"]))
        );
    }

    #[test]
    fn resolves_with_case_insensitive_prefix() {
        let resolver = PolicyResolver::new();

        assert_eq!(
            resolver.resolve(PolicyNameRef::from_str("role_required:a,b")),
            Some(requirement(&["a", "b"]))
        );
    }

    #[test]
    fn unknown_names_resolve_to_none_without_panicking() {
        let resolver = PolicyResolver::new();
        assert_eq!(
            resolver.resolve(PolicyNameRef::from_str("SomeUnrelatedPolicy")),
            None
        );
    }

    #[test]
    fn unprefixed_names_fall_through_to_built_ins() {
        let resolver = PolicyResolver::new()
            .with_built_in("RequireSignedIn", AuthPolicy::Authenticated);

        assert_eq!(
            resolver.resolve(PolicyNameRef::from_str("RequireSignedIn")),
            Some(AuthPolicy::Authenticated)
        );
    }

    #[test]
    fn built_ins_do_not_shadow_the_role_prefix() {
        let resolver = PolicyResolver::new().with_built_in(
            "ROLE_REQUIRED:Administrator",
            AuthPolicy::Authenticated,
        );

        // Prefix stage wins; the built-in entry is unreachable.
        assert_eq!(
            resolver.resolve(PolicyNameRef::from_str("ROLE_REQUIRED:Administrator")),
            Some(requirement(&["Administrator"]))
        );
    }

    #[test]
    fn mapping_translates_logical_names() {
        let resolver = PolicyResolver::new().with_role_mapping(
            RoleMapping::new()
                .map("Administrator", "realm-admin")
                .map("SecurityGuard", "realm-guard"),
        );

        let name = PolicyName::encode([
            &RoleName::new("Administrator".to_string()),
            &RoleName::new("SecurityGuard".to_string()),
        ]);

        assert_eq!(
            resolver.resolve(&name),
            Some(requirement(&["realm-admin", "realm-guard"]))
        );
    }

    #[test]
    fn mapping_drops_unknown_logical_names() {
        let resolver = PolicyResolver::new()
            .with_role_mapping(RoleMapping::new().map("Administrator", "realm-admin"));

        let name = PolicyName::encode([
            &RoleName::new("Administrator".to_string()),
            &RoleName::new("Mystery".to_string()),
        ]);

        assert_eq!(resolver.resolve(&name), Some(requirement(&["realm-admin"])));
    }

    #[test]
    fn absent_mapping_is_the_identity_transform() {
        let resolver = PolicyResolver::new().with_role_mapping(RoleMapping::new());

        let name = PolicyName::encode([&RoleName::new("Administrator".to_string())]);
        assert_eq!(
            resolver.resolve(&name),
            Some(requirement(&["Administrator"]))
        );
    }

    #[test]
    fn resolve_required_reports_the_failing_identifier() {
        let resolver = PolicyResolver::new();
        let err = resolver
            .resolve_required(PolicyNameRef::from_str("Nonexistent"))
            .unwrap_err();
        assert_eq!(err.name(), "Nonexistent");
    }

    #[test]
    fn default_policy_requires_authentication_only() {
        let resolver = PolicyResolver::new();
        assert_eq!(resolver.default_policy(), AuthPolicy::Authenticated);
        assert_eq!(resolver.fallback_policy(), None);
    }

    #[test]
    fn authenticated_policy_ignores_roles() {
        let principal = Principal::default();
        assert!(AuthPolicy::Authenticated.evaluate(&principal).is_ok());
    }

    #[test]
    fn role_policy_denies_a_roleless_principal() {
        let policy = requirement(&["Administrator"]);
        let principal = Principal::default();
        assert!(policy.evaluate(&principal).is_err());

        let mut privileged = Principal::default();
        privileged.grant_roles(roles!["Administrator"]);
        assert!(policy.evaluate(&privileged).is_ok());
    }
}
