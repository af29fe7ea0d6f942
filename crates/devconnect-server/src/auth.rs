//! Resolves the caller of an authenticated route.
//!
//! Tokens are issued elsewhere; by the time a request reaches this server
//! the caller's user id travels either as `Authorization: Bearer <id>` or as
//! `X-User-Id: <id>`. The id must belong to a registered user.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use devconnect_shared::types::UserId;

use crate::api::AppState;
use crate::error::ServerError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

fn caller_id(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    bearer
        .or_else(|| headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = caller_id(&parts.headers).ok_or(ServerError::Unauthenticated)?;
        let id = UserId::parse(raw).map_err(|_| ServerError::Unauthenticated)?;

        let known = state.db.lock().await.find_user(&id)?.is_some();
        if !known {
            tracing::debug!(user = %id, "Rejected request from unknown user");
            return Err(ServerError::Unauthenticated);
        }
        Ok(CurrentUser(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_caller_id_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(caller_id(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(caller_id(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(caller_id(&headers), Some("xyz"));
    }

    #[test]
    fn test_non_bearer_authorization_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(caller_id(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(caller_id(&headers), None);
    }
}
