use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use subtle::ConstantTimeEq;

use crate::error::LiveAgentError;
use crate::router::LiveAgentState;

/// Check a presented key against the configured service key.
/// Accepts either:
/// - Header: `Authorization: Bearer <key>`
/// - Header: `x-api-key: <key>`
/// - Query string: `?key=...`
///
/// An empty configured key disables the check.
pub fn ensure_authorized(
    expected: &str,
    bearer: Option<&str>,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<(), LiveAgentError> {
    if expected.is_empty() {
        return Ok(());
    }
    let matches = |candidate: &str| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()));

    if bearer.is_some_and(matches) {
        return Ok(());
    }

    if headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(matches)
    {
        return Ok(());
    }

    if let Some(qs) = query {
        for (k, v) in url::form_urlencoded::parse(qs.as_bytes()) {
            if k == "key" && matches(&v) {
                return Ok(());
            }
        }
    }

    Err(LiveAgentError::Unauthorized)
}

#[derive(Debug, Clone, Copy)]
pub struct RequireKeyAuth;

impl FromRequestParts<LiveAgentState> for RequireKeyAuth {
    type Rejection = LiveAgentError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &LiveAgentState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts.headers.typed_get::<Authorization<Bearer>>();
        ensure_authorized(
            &state.config.service_key,
            bearer.as_ref().map(|auth| auth.token()),
            &parts.headers,
            parts.uri.query(),
        )?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn empty_key_disables_check() {
        assert!(ensure_authorized("", None, &HeaderMap::new(), None).is_ok());
    }

    #[test]
    fn key_accepted_from_each_location() {
        let empty = HeaderMap::new();
        assert!(ensure_authorized("pwd", Some("pwd"), &empty, None).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("pwd"));
        assert!(ensure_authorized("pwd", None, &headers, None).is_ok());

        assert!(ensure_authorized("pwd", None, &empty, Some("limit=5&key=pwd")).is_ok());
    }

    #[test]
    fn wrong_or_missing_key_is_rejected() {
        let empty = HeaderMap::new();
        assert!(matches!(
            ensure_authorized("pwd", Some("nope"), &empty, Some("key=bad")),
            Err(LiveAgentError::Unauthorized)
        ));
        assert!(ensure_authorized("pwd", None, &empty, None).is_err());
    }
}
