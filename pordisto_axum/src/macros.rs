//! Macros for declaring the roles an endpoint requires

/// Constructs an extractor that admits only principals holding one of the
/// declared roles.
///
/// The declared role list is flattened into a policy identifier the first
/// time the guard is used; each request then resolves that identifier
/// through the application's [`SharedResolver`][crate::SharedResolver]
/// and evaluates the result against the authenticated principal. Holding
/// any one of the declared roles is sufficient.
///
/// ```
/// use pordisto_axum::role_guard;
///
/// role_guard!(AdminOnly; ["Administrator"]);
/// ```
///
/// Declaring several roles accepts a caller holding any of them:
///
/// ```
/// use pordisto_axum::role_guard;
///
/// role_guard!(GateStaff; ["Administrator", "SecurityGuard"]);
/// ```
///
/// The guard is then used as a handler argument. It consumes the
/// principal from the request extensions and hands it to the handler:
///
/// ```
/// use pordisto_axum::role_guard;
///
/// role_guard!(AdminOnly; ["Administrator"]);
///
/// async fn list_residents(guard: AdminOnly) -> String {
///     format!("hello, {}", guard.principal().name().unwrap_or("administrator"))
/// }
///
/// // Or ignore the principal when the handler does not need it
/// async fn remove_vehicle(_: AdminOnly) -> &'static str {
///     "removed"
/// }
/// ```
// A procedural macro could generate nicer documentation for the guard
// types, but a declarative one keeps the dependency tree flat.
#[macro_export]
macro_rules! role_guard {
    ($vis:vis $i:ident; $role:literal) => {
        $crate::role_guard!($vis $i; [$role]);
    };
    ($vis:vis $i:ident; [$($role:literal),+ $(,)?]) => {
        /// Admits only principals holding one of the accepted roles
        ///
        /// Note: This extractor will _consume_ the principal from the
        /// request extensions. Place any extractors that may need to copy
        /// data from the principal before this extractor in handler
        /// definitions.
        ///
        /// In the event of a denial, more verbose messages can be
        /// generated by adding [`pordisto_axum::VerboseAuthErrors`] to the
        /// `extensions` of the request.
        ///
        /// Accepted roles:
        $(
            #[doc = concat!("* `", $role, "`")]
        )+
        #[derive(Debug)]
        $vis struct $i($vis $crate::__private::Principal);

        impl $i {
            #[allow(dead_code)]
            $vis fn into_principal(self) -> $crate::__private::Principal {
                self.0
            }

            #[allow(dead_code)]
            $vis fn principal(&self) -> &$crate::__private::Principal {
                &self.0
            }
        }

        impl $crate::EndpointRolePolicy for $i {
            fn policy_name() -> &'static $crate::__private::PolicyNameRef {
                static NAME: $crate::__private::OnceCell<$crate::__private::PolicyName> =
                    $crate::__private::OnceCell::new();
                ::core::ops::Deref::deref(NAME.get_or_init(|| {
                    $crate::__private::PolicyName::encode([
                        $(
                            &$crate::__private::RoleName::from($role)
                        ),+
                    ])
                }))
            }
        }

        #[::axum::async_trait]
        impl<S> ::axum::extract::FromRequestParts<S> for $i
        where
            S: Sync,
        {
            type Rejection = $crate::AuthFailed;

            async fn from_request_parts(
                req: &mut ::axum::http::request::Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                $crate::__private::from_request(
                    req,
                    <Self as $crate::EndpointRolePolicy>::policy_name(),
                )
                .map(Self)
            }
        }
    };
}

/// Convenience macro for services that need to define many guards.
///
/// # Example
///
/// ```
/// use pordisto_axum::role_guards;
///
/// role_guards! {
///     guard AdminOnly = ["Administrator"];
///     guard GuardOnly = ["SecurityGuard"];
///     guard GateStaff = ["Administrator", "SecurityGuard"];
/// }
/// ```
///
/// The above defines a guard type for each declaration, identical to
/// invoking [`role_guard!`] once per line.
#[macro_export]
macro_rules! role_guards {
    ($($vis:vis guard $i:ident = $roles:tt);* $(;)?) => {
        $(
            $crate::role_guard!($vis $i; $roles);
        )*
    };
}

#[cfg(test)]
mod tests {
    use axum::{extract::FromRequestParts, http::request::Parts, http::Request};
    use pordisto::{roles, HasRoles, PolicyResolver, Principal, RoleMapping, RoleSet};

    use crate::{AuthFailed, EndpointRolePolicy, SharedResolver, VerboseAuthErrors};

    role_guard!(AdminOnly; ["Administrator"]);

    role_guards! {
        guard GuardOnly = ["SecurityGuard"];
        guard GateStaff = ["Administrator", "SecurityGuard"];
    }

    fn principal_with(roles: RoleSet) -> Principal {
        let mut principal = Principal::default();
        principal.grant_roles(roles);
        principal
    }

    fn request_parts(principal: Option<Principal>, resolver: Option<PolicyResolver>) -> Parts {
        let mut parts = Request::new(()).into_parts().0;
        if let Some(principal) = principal {
            parts.extensions.insert(principal);
        }
        if let Some(resolver) = resolver {
            parts.extensions.insert(SharedResolver::new(resolver));
        }
        parts
    }

    #[test]
    fn guards_encode_their_declaration_in_order() {
        assert_eq!(AdminOnly::policy_name().as_str(), "ROLE_REQUIRED:Administrator");
        assert_eq!(
            GateStaff::policy_name().as_str(),
            "ROLE_REQUIRED:Administrator,SecurityGuard"
        );
    }

    #[tokio::test]
    async fn guard_without_principal_reports_missing_principal() {
        let mut parts = request_parts(None, Some(PolicyResolver::new()));
        match AdminOnly::from_request_parts(&mut parts, &()).await {
            Err(AuthFailed::MissingPrincipal) => {}
            other => panic!("expected missing principal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn guard_without_resolver_reports_missing_resolver() {
        let principal = principal_with(roles!["Administrator"]);
        let mut parts = request_parts(Some(principal), None);
        match AdminOnly::from_request_parts(&mut parts, &()).await {
            Err(AuthFailed::MissingResolver) => {}
            other => panic!("expected missing resolver, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn guard_admits_a_principal_holding_the_role() {
        let principal = principal_with(roles!["Administrator"]);
        let mut parts = request_parts(Some(principal), Some(PolicyResolver::new()));

        let guard = AdminOnly::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(guard.principal().roles(), &roles!["Administrator"]);
    }

    #[tokio::test]
    async fn guard_denies_a_principal_without_the_role() {
        let principal = principal_with(roles!["Resident"]);
        let mut parts = request_parts(Some(principal), Some(PolicyResolver::new()));

        match AdminOnly::from_request_parts(&mut parts, &()).await {
            Err(AuthFailed::InsufficientRole { policy: None }) => {}
            other => panic!("expected a terse denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn multi_role_guard_accepts_either_role() {
        for held in ["Administrator", "SecurityGuard"] {
            let principal = principal_with(roles![held]);
            let mut parts = request_parts(Some(principal), Some(PolicyResolver::new()));
            GateStaff::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn verbose_denials_carry_the_denied_policy() {
        let principal = principal_with(roles!["Resident"]);
        let mut parts = request_parts(Some(principal), Some(PolicyResolver::new()));
        parts.extensions.insert(VerboseAuthErrors);

        match GuardOnly::from_request_parts(&mut parts, &()).await {
            Err(err @ AuthFailed::InsufficientRole { policy: Some(_) }) => {
                assert!(err.to_string().contains("SecurityGuard"));
            }
            other => panic!("expected a verbose denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn guards_translate_logical_names_through_the_mapping() {
        let resolver = PolicyResolver::new()
            .with_role_mapping(RoleMapping::new().map("Administrator", "realm-admin"));

        // The provider grants physical names, so only those satisfy the guard.
        let physical = principal_with(roles!["realm-admin"]);
        let mut parts = request_parts(Some(physical), Some(resolver.clone()));
        AdminOnly::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        let logical = principal_with(roles!["Administrator"]);
        let mut parts = request_parts(Some(logical), Some(resolver));
        assert!(AdminOnly::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn authenticated_extractor_requires_only_a_principal() {
        use crate::Authenticated;

        let principal = principal_with(roles![]);
        let mut parts = request_parts(Some(principal), None);
        let Authenticated(principal) =
            Authenticated::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(!principal.has_role_claims());

        let mut empty = request_parts(None, None);
        match Authenticated::from_request_parts(&mut empty, &()).await {
            Err(AuthFailed::MissingPrincipal) => {}
            other => panic!("expected missing principal, got {other:?}"),
        }
    }
}
