use axum::http::HeaderMap;
use axum::http::header;

use crate::state::AppState;
use crate::token::store::TokenKind;

const COOKIE_NAME: &str = "careernav_admin";

pub fn get_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|c| {
            c.trim()
                .strip_prefix(COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|v| v.to_string())
        })
}

pub fn set_session_cookie(token: &str) -> String {
    format!("{COOKIE_NAME}={token}; HttpOnly; SameSite=Strict; Path=/admin")
}

pub fn clear_session_cookie() -> String {
    format!("{COOKIE_NAME}=; HttpOnly; SameSite=Strict; Path=/admin; Max-Age=0")
}

pub async fn has_session(state: &AppState, headers: &HeaderMap) -> bool {
    match get_session_token(headers) {
        Some(token) => state
            .tokens
            .lock()
            .await
            .validate(&token, TokenKind::AdminSession)
            .is_some(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_session_token() {
        let mut headers = HeaderMap::new();
        assert!(get_session_token(&headers).is_none());

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; careernav_admin=abc123; other=1"),
        );
        assert_eq!(get_session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_prefixed_cookie_name_is_not_a_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("careernav_admin_old=abc123"),
        );
        assert!(get_session_token(&headers).is_none());
    }
}
