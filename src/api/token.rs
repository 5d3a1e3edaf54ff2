use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AppError, INVALID_TOKEN};
use crate::guard::ClientAddress;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ObtainPairRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub username: String,
    pub access: String,
    pub refresh: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    token: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

pub async fn obtain_pair(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ObtainPairRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    let address = ClientAddress::resolve(&headers, peer.ip(), state.trust_forwarded_for);

    let accounts = &state.accounts;
    let (username, password) = (&request.username, &request.password);
    let account = state
        .guard
        .authenticate(&address, move || async move {
            accounts.read().await.verify(username, password)
        })
        .await?;

    let (access, refresh) = state.tokens.lock().await.issue_pair(&account.username);
    tracing::info!(username = %account.username, %address, "issued token pair");

    Ok(Json(TokenPairResponse {
        username: account.username,
        access: access.token,
        refresh: refresh.token,
    }))
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<Value>, AppError> {
    if state.tokens.lock().await.verify(&request.token) {
        Ok(Json(json!({})))
    } else {
        Err(AppError::Unauthorized(INVALID_TOKEN))
    }
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let access = state
        .tokens
        .lock()
        .await
        .refresh(&request.refresh)
        .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;
    Ok(Json(RefreshResponse {
        access: access.token,
    }))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::*;
    use crate::error::NO_ACTIVE_ACCOUNT;
    use crate::state::test_support::test_state;

    const PEER: &str = "198.51.100.20:40000";

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let mut request = builder.body(body).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(PEER.parse::<SocketAddr>().unwrap()));

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(app: &Router, password: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        send(
            app,
            "POST",
            "/api/token/pair",
            headers,
            Some(json!({ "username": "superuser_test", "password": password })),
        )
        .await
    }

    #[tokio::test]
    async fn test_login_works() {
        let test = test_state();
        let app = crate::build_router(test.state.clone());

        let (status, pair) = login(&app, "iamasuperuser", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pair["username"], "superuser_test");

        let access = pair["access"].as_str().unwrap();
        let (status, _) = send(
            &app,
            "POST",
            "/api/token/verify",
            &[],
            Some(json!({ "token": access })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, refreshed) = send(
            &app,
            "POST",
            "/api/token/refresh",
            &[],
            Some(json!({ "refresh": pair["refresh"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(refreshed["access"].is_string());
    }

    #[tokio::test]
    async fn test_bad_tokens_rejected() {
        let test = test_state();
        let app = crate::build_router(test.state.clone());

        let (status, _) = send(
            &app,
            "POST",
            "/api/token/verify",
            &[],
            Some(json!({ "token": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            "POST",
            "/api/token/refresh",
            &[],
            Some(json!({ "refresh": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_blocked_after_10_tries() {
        for failures in 0..=11 {
            let test = test_state();
            let app = crate::build_router(test.state.clone());

            for _ in 0..failures {
                let (status, body) = login(&app, "wrong", &[]).await;
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body["detail"], NO_ACTIVE_ACCOUNT);
            }
            let (status, body) = login(&app, "iamasuperuser", &[]).await;

            if failures <= 10 {
                assert_eq!(status, StatusCode::OK, "after {failures} failures");
            } else {
                assert_eq!(status, StatusCode::UNAUTHORIZED, "after {failures} failures");
                assert_eq!(body["detail"], NO_ACTIVE_ACCOUNT);
            }
        }
    }

    #[tokio::test]
    async fn test_blocked_address_does_not_affect_others() {
        let test = test_state();
        let app = crate::build_router(test.state.clone());

        for _ in 0..11 {
            login(&app, "wrong", &[]).await;
        }
        let (status, _) = login(&app, "iamasuperuser", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = login(&app, "iamasuperuser", &[("x-forwarded-for", "203.0.113.5")]).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ipv6_rotation_does_not_bypass_guard() {
        let test = test_state();
        let app = crate::build_router(test.state.clone());

        for host in 1..=11 {
            let forwarded = format!("2001:db8::{host:x}");
            let (status, _) = login(&app, "wrong", &[("x-forwarded-for", forwarded.as_str())]).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, _) = login(&app, "iamasuperuser", &[("x-forwarded-for", "2001:db8::ffff")]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = login(&app, "iamasuperuser", &[("x-forwarded-for", "2001:db8:1::1")]).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_me_requires_access_token() {
        let test = test_state();
        let app = crate::build_router(test.state.clone());

        let (status, _) = send(&app, "GET", "/api/me", &[], None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, pair) = send(
            &app,
            "POST",
            "/api/token/pair",
            &[],
            Some(json!({ "username": "mentor_test", "password": "iamamentor" })),
        )
        .await;

        let refresh = format!("Bearer {}", pair["refresh"].as_str().unwrap());
        let (status, _) = send(&app, "GET", "/api/me", &[("authorization", refresh.as_str())], None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let access = format!("Bearer {}", pair["access"].as_str().unwrap());
        let (status, profile) =
            send(&app, "GET", "/api/me", &[("authorization", access.as_str())], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["username"], "mentor_test");
        assert_eq!(profile["permissions"], json!(["mentor"]));
    }

    #[tokio::test]
    async fn test_deactivated_account_cannot_log_in() {
        let test = test_state();
        let app = crate::build_router(test.state.clone());
        test.state
            .accounts
            .write()
            .await
            .deactivate("superuser_test")
            .unwrap();

        let (status, body) = login(&app, "iamasuperuser", &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], NO_ACTIVE_ACCOUNT);
    }
}
