use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use crate::error::AppError;

/// Header set by the authentication gateway once the caller is verified
pub const AUTHOR_HEADER: &str = "x-author-id";

/// The already authenticated author of a request.
pub struct AuthorId(pub i32);

impl<S> FromRequestParts<S> for AuthorId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts.headers.get(AUTHOR_HEADER).ok_or((
            "Authentication required, please log in again.",
            StatusCode::UNAUTHORIZED,
        ))?;

        let id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .ok_or((
                "Unauthorized, the author identity is malformed.",
                StatusCode::UNAUTHORIZED,
            ))?;

        Ok(AuthorId(id))
    }
}
