use axum::extract::{FromRequest, Request, rejection::JsonRejection};

use crate::error::AppError;

/// Request body extractor for submissions. Works like [`axum::Json`], but a
/// body that cannot be read renders as the usual `{ code, msg }` error.
pub struct Submission<T>(pub T);

impl<S, T> FromRequest<S> for Submission<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(reject)?;

        Ok(Self(value))
    }
}

fn reject(rejection: JsonRejection) -> AppError {
    let code = match &rejection {
        JsonRejection::JsonSyntaxError(_) => "MALFORMED_BODY",
        JsonRejection::JsonDataError(_) => "INVALID_BODY",
        JsonRejection::MissingJsonContentType(_) => "UNSUPPORTED_MEDIA_TYPE",
        _ => "UNREADABLE_BODY",
    };
    tracing::debug!(code, reason = %rejection.body_text(), "Rejected submission body");

    AppError::Request {
        code,
        msg: rejection.body_text(),
        status: rejection.status(),
    }
}
