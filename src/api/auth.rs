use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::accounts::store::Account;
use crate::error::{AppError, INVALID_TOKEN, NO_ACTIVE_ACCOUNT};
use crate::state::AppState;
use crate::token::store::TokenKind;

/// The active account behind a live `Authorization: Bearer` access token.
pub struct CurrentAccount(pub Account);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header_value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::Unauthorized("Missing Authorization header"))?;

    let value = header_value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header value"))?;

    value
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Expected Bearer token"))
}

impl FromRequestParts<Arc<AppState>> for CurrentAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let subject = state
            .tokens
            .lock()
            .await
            .validate(token, TokenKind::Access)
            .map(|t| t.subject.clone())
            .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;

        let account = state
            .accounts
            .read()
            .await
            .find(&subject)
            .filter(|a| a.is_active)
            .cloned()
            .ok_or(AppError::Unauthorized(NO_ACTIVE_ACCOUNT))?;

        Ok(CurrentAccount(account))
    }
}
