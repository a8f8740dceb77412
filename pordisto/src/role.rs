//! Role vocabulary types

use std::{collections::hash_set, iter::FromIterator};

use ahash::AHashSet;
use aliri_braid::braid;
use serde::{Deserialize, Serialize};

/// The claim type under which an identity provider reports role membership
pub const ROLE_CLAIM: &str = "role";

/// The name of a role granted to an identity
///
/// Role names are opaque identifiers. The set of valid names is decided by
/// the identity provider's configuration, not by this crate, so no grammar
/// is enforced here. Names are compared exactly and case-sensitively.
///
/// Names containing a comma (`,`) cannot be carried inside an encoded
/// [`PolicyName`][crate::PolicyName] and are unsupported there; see the
/// policy name documentation for the details of that contract.
#[braid(serde, ref_doc = "A borrowed reference to a [`RoleName`]")]
pub struct RoleName;

/// The set of roles granted to an identity
///
/// Identity providers are inconsistent about the JSON shape of the `role`
/// claim: a single membership may arrive as a bare string, while multiple
/// memberships arrive as an array. Both forms deserialize into this set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<RoleClaimDto>", into = "RoleClaimDto")]
pub struct RoleSet(AHashSet<RoleName>);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RoleClaimDto {
    One(RoleName),
    Many(Vec<RoleName>),
}

impl From<Option<RoleClaimDto>> for RoleSet {
    fn from(dto: Option<RoleClaimDto>) -> Self {
        match dto {
            Some(RoleClaimDto::One(role)) => Self::single(role),
            Some(RoleClaimDto::Many(roles)) => roles.into_iter().collect(),
            None => Self::empty(),
        }
    }
}

impl From<RoleSet> for RoleClaimDto {
    fn from(roles: RoleSet) -> Self {
        RoleClaimDto::Many(roles.0.into_iter().collect())
    }
}

impl RoleSet {
    /// Produces a set containing no roles
    #[inline]
    pub fn empty() -> Self {
        Self(AHashSet::new())
    }

    /// Constructs a set containing a single role
    #[inline]
    pub fn single(role: RoleName) -> Self {
        let mut set = Self::empty();
        set.insert(role);
        set
    }

    /// Adds a role to the set
    #[inline]
    pub fn insert(&mut self, role: RoleName) {
        self.0.insert(role);
    }

    /// Checks whether the set contains the given role, comparing exactly
    #[inline]
    pub fn contains(&self, role: &RoleNameRef) -> bool {
        self.0.contains(role)
    }

    /// Checks whether the set contains no roles
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of roles in the set
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Produces an iterator over the roles in this set
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &RoleNameRef> {
        self.into_iter()
    }
}

impl IntoIterator for RoleSet {
    type Item = RoleName;
    type IntoIter = <AHashSet<RoleName> as IntoIterator>::IntoIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a set of borrowed role names
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: hash_set::Iter<'a, RoleName>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a RoleNameRef;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|x| x.as_ref())
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a RoleNameRef;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            iter: self.0.iter(),
        }
    }
}

impl<R> Extend<R> for RoleSet
where
    R: Into<RoleName>,
{
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = R>,
    {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl<R> FromIterator<R> for RoleSet
where
    R: Into<RoleName>,
{
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = R>,
    {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

/// Indicates that the type carries a set of granted roles
pub trait HasRoles {
    /// Roles granted to the underlying identity, generally reported in the
    /// `role` claim
    fn roles(&self) -> &RoleSet;
}

impl HasRoles for RoleSet {
    #[inline]
    fn roles(&self) -> &RoleSet {
        self
    }
}

/// Constructs a [`RoleSet`] from a list of role names
///
/// ```
/// use pordisto::roles;
///
/// let staff = roles!["Administrator", "SecurityGuard"];
/// assert_eq!(staff.len(), 2);
///
/// let nobody = roles![];
/// assert!(nobody.is_empty());
/// ```
#[macro_export]
macro_rules! roles {
    () => { $crate::RoleSet::empty() };
    ($($role:expr),+ $(,)?) => {{
        let mut set = $crate::RoleSet::empty();
        $(
            set.insert($crate::RoleName::from($role));
        )+
        set
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_single_string_claim() {
        let roles: RoleSet = serde_json::from_str(r#""Administrator""#).unwrap();
        assert_eq!(roles, roles!["Administrator"]);
    }

    #[test]
    fn deserializes_array_claim() {
        let roles: RoleSet =
            serde_json::from_str(r#"["Administrator", "SecurityGuard"]"#).unwrap();
        assert_eq!(roles, roles!["Administrator", "SecurityGuard"]);
    }

    #[test]
    fn deserializes_null_claim_as_empty() {
        let roles: RoleSet = serde_json::from_str("null").unwrap();
        assert!(roles.is_empty());
    }

    #[test]
    fn membership_is_case_sensitive() {
        let roles = roles!["Administrator"];
        assert!(roles.contains(RoleNameRef::from_str("Administrator")));
        assert!(!roles.contains(RoleNameRef::from_str("administrator")));
    }

    #[test]
    fn duplicate_names_collapse() {
        let roles = roles!["Administrator", "Administrator"];
        assert_eq!(roles.len(), 1);
    }
}
