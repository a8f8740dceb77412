//! Encoding of role requirements into policy identifiers
//!
//! Endpoints declare the roles they require as a list of names. At route
//! registration time that list is flattened into a single policy identifier
//! string of the form `ROLE_REQUIRED:<role1>,<role2>,...`. At request time
//! the identifier is decoded back into the same list, which keeps
//! per-request resolution stateless and pure given the identifier.

use aliri_braid::braid;

use crate::role::RoleName;

/// The prefix marking a policy identifier as an encoded role requirement
///
/// Matching against the prefix is ASCII case-insensitive on lookup, but
/// encoding always produces this canonical casing.
pub const ROLE_REQUIRED_PREFIX: &str = "ROLE_REQUIRED:";

/// An identifier naming the authorization policy an endpoint requires
///
/// Identifiers produced by [`PolicyName::encode`] carry a role requirement.
/// Any other identifier is expected to name a built-in policy known to the
/// [`PolicyResolver`][crate::PolicyResolver].
#[braid(serde, ref_doc = "A borrowed reference to a [`PolicyName`]")]
pub struct PolicyName;

impl PolicyName {
    /// Encodes an ordered list of role names into a policy identifier
    ///
    /// The input order is preserved: `ROLE_REQUIRED:a,b` and
    /// `ROLE_REQUIRED:b,a` are distinct identifiers even though they decode
    /// to the same requirement.
    ///
    /// Role names containing a comma cannot survive this encoding and are
    /// unsupported; no escaping is performed and the resulting identifier
    /// will decode into a different role list. Callers own that contract.
    ///
    /// ```
    /// use pordisto::{PolicyName, RoleName};
    ///
    /// let name = PolicyName::encode([
    ///     &RoleName::new("Administrator".to_string()),
    ///     &RoleName::new("SecurityGuard".to_string()),
    /// ]);
    /// assert_eq!(name.as_str(), "ROLE_REQUIRED:Administrator,SecurityGuard");
    /// ```
    pub fn encode<'a, I>(roles: I) -> Self
    where
        I: IntoIterator<Item = &'a RoleName>,
    {
        let mut encoded = String::from(ROLE_REQUIRED_PREFIX);
        for (idx, role) in roles.into_iter().enumerate() {
            if idx > 0 {
                encoded.push(',');
            }
            encoded.push_str(role.as_str());
        }
        Self::new(encoded)
    }
}

impl PolicyNameRef {
    /// Checks whether this identifier carries an encoded role requirement
    ///
    /// The prefix comparison is ASCII case-insensitive.
    pub fn is_role_required(&self) -> bool {
        let bytes = self.as_str().as_bytes();
        bytes.len() >= ROLE_REQUIRED_PREFIX.len()
            && bytes[..ROLE_REQUIRED_PREFIX.len()]
                .eq_ignore_ascii_case(ROLE_REQUIRED_PREFIX.as_bytes())
    }

    /// Decodes the role names carried by this identifier
    ///
    /// Returns `None` when the identifier does not start with
    /// [`ROLE_REQUIRED_PREFIX`]. The returned list preserves the encoded
    /// order, so `decode(encode(roles)) == roles` for any list of
    /// comma-free role names.
    pub fn decode(&self) -> Option<Vec<RoleName>> {
        if !self.is_role_required() {
            return None;
        }

        let remainder = &self.as_str()[ROLE_REQUIRED_PREFIX.len()..];
        Some(remainder.split(',').map(|s| RoleName::new(s.to_owned())).collect())
    }
}
