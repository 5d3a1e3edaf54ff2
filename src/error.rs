use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::guard::LoginError;

pub const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";
pub const INVALID_TOKEN: &str = "Token is invalid or expired";

#[derive(Debug)]
pub enum AppError {
    Unauthorized(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };
        (status, Json(json!({ "detail": message }))).into_response()
    }
}

// Blocked and bad credentials look identical to the client.
impl From<LoginError> for AppError {
    fn from(_: LoginError) -> Self {
        AppError::Unauthorized(NO_ACTIVE_ACCOUNT)
    }
}
