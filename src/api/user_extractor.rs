use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::UserContext;

/// Header set by the authenticating proxy in front of the registry.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Axum extractor for the caller identity.
///
/// Authentication happens upstream; requests that reach us without an
/// identity header are rejected with 401.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)
    }
}

fn caller_from_headers(headers: &HeaderMap) -> Option<UserContext> {
    let user_id = header_value(headers, USER_ID_HEADER).filter(|id| !id.is_empty())?;
    Some(UserContext::with_name(user_id, header_value(headers, USER_NAME_HEADER)))
}

fn header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn test_caller_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_static("admin"),
        );
        headers.insert(
            HeaderName::from_static(USER_NAME_HEADER),
            HeaderValue::from_static("Admin User"),
        );

        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller.user_id, "admin");
        assert_eq!(caller.user_name.as_deref(), Some("Admin User"));
    }

    #[test]
    fn test_missing_or_blank_identity() {
        assert!(caller_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_static("  "),
        );
        assert!(caller_from_headers(&headers).is_none());
    }
}
