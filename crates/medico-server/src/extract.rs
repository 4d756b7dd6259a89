//! Request extractors.

use axum::extract::FromRequest;

use crate::error::ApiError;

/// `Json` whose rejections render as `400 {"detail": ...}`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
