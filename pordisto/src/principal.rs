//! The authenticated identity attached to a request

use serde_json::{Map, Value};

use crate::role::{HasRoles, RoleSet, ROLE_CLAIM};

/// The validated identity attached to a request
///
/// A principal is produced by the bearer authentication gateway once a
/// token's signature, issuer, and audience have checked out. At that point
/// it may still be role-incomplete: some providers omit role claims from
/// access tokens. Role claims are then granted at most once, by the
/// userinfo augmentation step, after which the principal is read-only for
/// the rest of the request and dropped at request end.
#[derive(Clone, Debug, Default)]
pub struct Principal {
    name: Option<String>,
    roles: RoleSet,
    claims: Map<String, Value>,
}

impl Principal {
    /// Builds a principal from a validated token's claims object
    ///
    /// The claim named by `name_claim` (conventionally `sub`) becomes the
    /// principal's display name when it is present as a string. Role
    /// membership is read from the `role` claim, accepting both the bare
    /// string and the array form. All claims, including those two, remain
    /// available verbatim through [`claims`][Self::claims] for downstream
    /// consumers.
    pub fn from_claims(claims: Map<String, Value>, name_claim: &str) -> Self {
        let name = claims
            .get(name_claim)
            .and_then(Value::as_str)
            .map(str::to_owned);

        let roles = claims
            .get(ROLE_CLAIM)
            .cloned()
            .map(|value| serde_json::from_value::<RoleSet>(value).unwrap_or_default())
            .unwrap_or_default();

        Self {
            name,
            roles,
            claims,
        }
    }

    /// The principal's display name, when the configured name claim was present
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the principal already carries one or more role claims
    #[inline]
    pub fn has_role_claims(&self) -> bool {
        !self.roles.is_empty()
    }

    /// Grants additional roles to the principal
    ///
    /// Granted roles are unioned with any roles already held; existing
    /// membership is never removed or replaced.
    pub fn grant_roles(&mut self, roles: RoleSet) {
        self.roles.extend(roles);
    }

    /// The full claims object carried by the validated token
    #[inline]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Looks up a single claim by its type
    #[inline]
    pub fn claim(&self, claim_type: &str) -> Option<&Value> {
        self.claims.get(claim_type)
    }
}

impl HasRoles for Principal {
    #[inline]
    fn roles(&self) -> &RoleSet {
        &self.roles
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::roles;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn maps_the_configured_name_claim() {
        let principal = Principal::from_claims(
            claims(json!({ "sub": "b3f2", "preferred_username": "olivia" })),
            "preferred_username",
        );
        assert_eq!(principal.name(), Some("olivia"));
    }

    #[test]
    fn missing_name_claim_leaves_name_unset() {
        let principal = Principal::from_claims(claims(json!({ "sub": "b3f2" })), "name");
        assert_eq!(principal.name(), None);
    }

    #[test]
    fn reads_roles_from_string_or_array_claims() {
        let single = Principal::from_claims(
            claims(json!({ "sub": "a", "role": "Administrator" })),
            "sub",
        );
        assert_eq!(single.roles(), &roles!["Administrator"]);

        let many = Principal::from_claims(
            claims(json!({ "sub": "a", "role": ["Administrator", "SecurityGuard"] })),
            "sub",
        );
        assert_eq!(many.roles(), &roles!["Administrator", "SecurityGuard"]);
    }

    #[test]
    fn token_without_role_claim_yields_no_roles() {
        let principal = Principal::from_claims(claims(json!({ "sub": "a" })), "sub");
        assert!(!principal.has_role_claims());
    }

    #[test]
    fn granted_roles_union_with_existing_membership() {
        let mut principal = Principal::from_claims(
            claims(json!({ "sub": "a", "role": "Resident" })),
            "sub",
        );
        principal.grant_roles(roles!["Administrator"]);
        assert_eq!(principal.roles(), &roles!["Resident", "Administrator"]);
    }

    #[test]
    fn token_claims_stay_available_downstream() {
        let principal = Principal::from_claims(
            claims(json!({ "sub": "a", "unit": "7B", "role": "Resident" })),
            "sub",
        );
        assert_eq!(principal.claim("unit"), Some(&json!("7B")));
        assert_eq!(principal.claim("role"), Some(&json!("Resident")));
    }
}
