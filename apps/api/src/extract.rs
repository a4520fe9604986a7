use axum::extract::FromRequest;

use crate::errors::AppError;

/// `axum::Json`, but a body that fails to parse is answered with the usual
/// error envelope instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
