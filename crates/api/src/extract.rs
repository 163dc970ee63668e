//! Request extractors shared by the handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;

use parkprint_core::error::CoreError;

use crate::error::AppError;

/// JSON body extractor that reports deserialization failures through the
/// standard `{error, code}` envelope.
///
/// Axum's plain [`Json`] rejects a missing or malformed body with a
/// plain-text 422 before the handler runs. A missing required field is a
/// validation failure like any other, so it must surface as a 400
/// `VALIDATION_ERROR` instead.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Core(CoreError::Validation(rejection.body_text())))?;
        Ok(AppJson(value))
    }
}
