use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;
use rdk::Error;

use crate::into_response;

/// Header carrying the authenticated user id, set by the session layer in front of the server
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| into_response(Error::Authentication("Missing user id".to_string())))?
            .to_str()
            .map_err(|_| {
                into_response(Error::Authentication(
                    "Invalid user id header value".to_string(),
                ))
            })?
            .trim();

        if user_id.is_empty() {
            return Err(into_response(Error::Authentication(
                "Missing user id".to_string(),
            )));
        }

        Ok(UserId(user_id.to_string()))
    }
}
