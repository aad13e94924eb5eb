use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::model::{RequestContext, UserContext};

/// Axum extractor for the request context.
///
/// The user is taken from request headers:
/// - X-User-Id: user identifier; without it the request is anonymous
/// - X-User-Email: optional user email
/// - X-User-Name: optional user display name
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(context_from_headers(&parts.headers))
    }
}

pub fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let user = extract_header_value(headers, "x-user-id").map(|user_id| {
        UserContext::with_details(
            user_id,
            extract_header_value(headers, "x-user-email"),
            extract_header_value(headers, "x-user-name"),
        )
    });

    RequestContext {
        user,
        headers: headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect(),
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}
