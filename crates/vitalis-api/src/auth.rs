use axum::http::{header::AUTHORIZATION, HeaderMap};

use vitalis_persist::IdentityResolver;

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// User id behind the request's bearer token, if any
///
/// Missing, rejected or unverifiable tokens all make the caller anonymous.
pub async fn resolve_user(identity: &dyn IdentityResolver, headers: &HeaderMap) -> Option<String> {
    let token = bearer_token(headers)?;

    match identity.resolve(token).await {
        Ok(Some(user_id)) => Some(user_id),
        Ok(None) => {
            tracing::debug!("Bearer token not accepted, treating caller as anonymous");
            None
        }
        Err(e) => {
            tracing::warn!("Identity lookup failed, treating caller as anonymous: {}", e);
            None
        }
    }
}
