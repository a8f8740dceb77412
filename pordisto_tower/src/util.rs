//! Utilities for generating HTTP responses on authorization failures

use http::{header, HeaderValue, Response, StatusCode};
use pordisto::AuthPolicy;

/// Build a `401 Unauthorized` response with the appropriate
/// `www-authenticate` header
///
/// The description provided will be automatically escaped to make sure it
/// is header-friendly.
///
/// The prepared response will have the form:
///
/// ```http
/// HTTP/1.1 401 Unauthorized
/// www-authenticate: Bearer error="invalid_token" error_description="{description}"
/// ```
///
/// `error_description` is omitted if `description` is empty.
pub fn unauthorized<Body: Default>(description: &str) -> Response<Body> {
    let mut resp = Response::new(Body::default());
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp.headers_mut()
        .insert(header::WWW_AUTHENTICATE, invalid_token(description));
    resp
}

/// Build a `403 Forbidden` response with the appropriate
/// `www-authenticate` header(s)
///
/// The description provided will be automatically escaped to make sure it
/// is header-friendly.
///
/// When no policy is given, or the policy accepts no role at all, the
/// prepared response will have the form:
///
/// ```http
/// HTTP/1.1 403 Forbidden
/// www-authenticate: Bearer error="insufficient_role" error_description="{description}"
/// ```
///
/// When a role-requiring policy is given, a `www-authenticate` header is
/// added for each role the policy would have accepted:
///
/// ```http
/// HTTP/1.1 403 Forbidden
/// www-authenticate: Bearer error="insufficient_role" error_description="{description}" role="SecurityGuard"
/// www-authenticate: Bearer error="insufficient_role" error_description="{description}" role="Administrator"
/// ```
///
/// `error_description` is omitted if `description` is empty.
pub fn forbidden<Body: Default>(description: &str, policy: Option<&AuthPolicy>) -> Response<Body> {
    let mut resp = Response::new(Body::default());
    *resp.status_mut() = StatusCode::FORBIDDEN;

    match policy {
        Some(AuthPolicy::RoleRequired(requirement)) if !requirement.roles().is_empty() => {
            for role in requirement.roles() {
                resp.headers_mut().append(
                    header::WWW_AUTHENTICATE,
                    insufficient_role(description, role.as_str()),
                );
            }
        }
        _ => {
            resp.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                insufficient_role_no_policy(description),
            );
        }
    }

    resp
}

fn invalid_token(description: &str) -> HeaderValue {
    if description.is_empty() {
        HeaderValue::from_static(r#"Bearer error="invalid_token""#)
    } else {
        HeaderValue::try_from(format!(
            r#"Bearer error="invalid_token" error_description="{}""#,
            description.escape_default()
        ))
        .expect("escaped description is a valid header value")
    }
}

// Role names are opaque strings, so unlike the description they cannot be
// assumed header-safe and are escaped as well.
fn insufficient_role(description: &str, role: &str) -> HeaderValue {
    if description.is_empty() {
        HeaderValue::try_from(format!(
            r#"Bearer error="insufficient_role" role="{}""#,
            role.escape_default()
        ))
        .expect("escaped role is a valid header value")
    } else {
        HeaderValue::try_from(format!(
            r#"Bearer error="insufficient_role" error_description="{}" role="{}""#,
            description.escape_default(),
            role.escape_default()
        ))
        .expect("escaped description and role are a valid header value")
    }
}

fn insufficient_role_no_policy(description: &str) -> HeaderValue {
    if description.is_empty() {
        HeaderValue::from_static(r#"Bearer error="insufficient_role""#)
    } else {
        HeaderValue::try_from(format!(
            r#"Bearer error="insufficient_role" error_description="{}""#,
            description.escape_default()
        ))
        .expect("escaped description is a valid header value")
    }
}
