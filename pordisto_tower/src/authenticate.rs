use std::{fmt, future::Future, pin::Pin, sync::Arc};

use http::{header, HeaderMap, Request, Response};
use pordisto::userinfo::UserinfoClient;
use tower_http::auth::AsyncAuthorizeRequest;

use crate::{Authenticator, OnAuthenticationError};

/// Authenticates the bearer token on each request and attaches the
/// resulting [`Principal`][pordisto::Principal] to the request extensions
///
/// An invalid or missing token terminates the request here with a 401
/// before any augmentation or policy work happens. For an accepted token,
/// the userinfo augmentation completes before the request is released to
/// the inner service, so every downstream policy sees the final claim set.
pub struct AuthenticateBearer<OnError> {
    authenticator: Arc<dyn Authenticator>,
    userinfo: UserinfoClient,
    on_error: OnError,
}

impl<OnError> Clone for AuthenticateBearer<OnError>
where
    OnError: Clone,
{
    fn clone(&self) -> Self {
        Self {
            authenticator: Arc::clone(&self.authenticator),
            userinfo: self.userinfo.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<OnError> fmt::Debug for AuthenticateBearer<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateBearer")
            .field("userinfo", &self.userinfo)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl<OnError> AuthenticateBearer<OnError> {
    pub(crate) fn new(
        authenticator: Arc<dyn Authenticator>,
        userinfo: UserinfoClient,
        on_error: OnError,
    ) -> Self {
        Self {
            authenticator,
            userinfo,
            on_error,
        }
    }
}

impl<B, OnError> AsyncAuthorizeRequest<B> for AuthenticateBearer<OnError>
where
    B: Send + 'static,
    OnError: OnAuthenticationError + Clone + Send + Sync + 'static,
    OnError::Body: Default,
{
    type RequestBody = B;
    type ResponseBody = OnError::Body;
    type Future =
        Pin<Box<dyn Future<Output = Result<Request<B>, Response<OnError::Body>>> + Send>>;

    fn authorize(&mut self, mut request: Request<B>) -> Self::Future {
        let authenticator = Arc::clone(&self.authenticator);
        let userinfo = self.userinfo.clone();
        let on_error = self.on_error.clone();

        Box::pin(async move {
            let token = match bearer_token(request.headers()) {
                Some(token) => token.to_owned(),
                None => return Err(on_error.on_missing_or_malformed()),
            };

            let mut principal = match authenticator.authenticate(&token) {
                Ok(principal) => principal,
                Err(error) => {
                    tracing::debug!("bearer token validation failed");
                    return Err(on_error.on_token_rejected(error));
                }
            };

            // Runs at most one userinfo call; errors there are suppressed
            // and the principal proceeds with the roles it has. Policy
            // evaluation below this layer only starts once this completes.
            userinfo.augment(&mut principal, &token).await;

            tracing::trace!("bearer token accepted");
            request.extensions_mut().insert(principal);

            Ok(request)
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    if auth.len() <= 7 || !auth.as_bytes()[..7].eq_ignore_ascii_case(b"bearer ") {
        return None;
    }

    Some(auth[7..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn extracts_the_raw_token() {
        assert_eq!(
            bearer_token(&headers_with("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn scheme_match_is_case_insensitive() {
        assert_eq!(bearer_token(&headers_with("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("BEARER abc")), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers_with("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
