use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::AppError;

/// Header carrying the caller's id, set by the upstream auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller. Extraction fails with 401 when the header is
/// missing or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Auth("Unauthorized".to_string()))?;

        Ok(CurrentUser { id: id.to_string() })
    }
}
