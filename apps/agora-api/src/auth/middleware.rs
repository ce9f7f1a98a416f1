use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::session::SESSION_COOKIE;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated user extracted from the `session_id` cookie.
///
/// Use as an Axum extractor in any handler that requires authentication:
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse { ... }
/// ```
///
/// A missing cookie, an unknown token, and an expired token all reject
/// with the same 401 — the caller cannot distinguish them. A storage
/// failure during resolution is a 500, not a 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

        let user_id = state
            .sessions
            .resolve(token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

        Ok(AuthUser { user_id })
    }
}

/// Pull the session token out of the `Cookie` header, if present.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(COOKIE)?.to_str().ok()?;

    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_session_token_single_cookie() {
        let headers = headers_with_cookie("session_id=ses_abc123");
        assert_eq!(session_token(&headers), Some("ses_abc123"));
    }

    #[test]
    fn test_session_token_among_other_cookies() {
        let headers = headers_with_cookie("theme=dark; session_id=ses_abc123; lang=en");
        assert_eq!(session_token(&headers), Some("ses_abc123"));
    }

    #[test]
    fn test_session_token_missing() {
        let headers = headers_with_cookie("theme=dark");
        assert_eq!(session_token(&headers), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
