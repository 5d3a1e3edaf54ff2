use std::net::SocketAddr;
use std::sync::Arc;

use askama::Template;
use axum::Form;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::Utc;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::accounts::store::{Account, NewAccount, Role};
use crate::admin::session::{clear_session_cookie, get_session_token, has_session, set_session_cookie};
use crate::guard::policy::AttemptState;
use crate::guard::{AttemptRecord, ClientAddress, Screening};
use crate::state::AppState;
use crate::token::store::TokenKind;

// Templates

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    accounts: Vec<AccountRow>,
    failed_logins: Vec<FailedLoginRow>,
    message: Option<String>,
}

struct AccountRow {
    username: String,
    email: String,
    roles: String,
    active: bool,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        let roles: Vec<&str> = [
            (account.is_superuser, "superuser"),
            (account.is_mentor, "mentor"),
            (account.is_jobseeker, "jobseeker"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        AccountRow {
            username: account.username.clone(),
            email: account.email.clone(),
            roles: roles.join(", "),
            active: account.is_active,
        }
    }
}

struct FailedLoginRow {
    address: String,
    last_updated: String,
    attempts: u32,
    state: &'static str,
    blocked: bool,
}

// Form structs

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct AddAccountForm {
    username: String,
    password: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    role: Role,
}

#[derive(Deserialize)]
pub struct ClearFailedLoginForm {
    address: String,
}

fn login_page(status: StatusCode, error: Option<&str>) -> Response {
    let html = LoginTemplate {
        error: error.map(str::to_string),
    }
    .render()
    .unwrap_or_default();
    (status, Html(html)).into_response()
}

async fn render_dashboard(state: &AppState, message: Option<String>) -> Response {
    let accounts = state
        .accounts
        .read()
        .await
        .list()
        .iter()
        .map(AccountRow::from)
        .collect();

    let records = match state.guard.records().await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Failed to list failed logins: {:?}", e);
            Vec::new()
        }
    };
    let now = Utc::now();
    let policy = state.guard.policy();
    let failed_logins = records
        .iter()
        .map(|r: &AttemptRecord| {
            let state = policy.state(Some(r), now);
            FailedLoginRow {
                address: r.address.clone(),
                last_updated: r.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                attempts: r.attempts,
                state: state.as_str(),
                blocked: state == AttemptState::Blocked,
            }
        })
        .collect();

    let html = DashboardTemplate {
        accounts,
        failed_logins,
        message,
    }
    .render()
    .unwrap_or_default();
    Html(html).into_response()
}

fn credentials_match(expected: &str, given: &str) -> bool {
    expected.as_bytes().ct_eq(given.as_bytes()).into()
}

// Handlers

pub async fn admin_login_page() -> Response {
    login_page(StatusCode::OK, None)
}

pub async fn admin_login_submit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    const LOGIN_FAILED: &str = "Invalid username or password.";
    let address = ClientAddress::resolve(&headers, addr.ip(), state.trust_forwarded_for);

    let screening = match state.guard.is_blocked(&address).await {
        Ok(screening) => screening,
        Err(e) => {
            tracing::warn!(%address, "Failed to check login attempts: {:?}", e);
            Screening::default()
        }
    };
    if screening.blocked {
        return login_page(StatusCode::UNAUTHORIZED, Some(LOGIN_FAILED));
    }

    let username_ok = credentials_match(&state.admin_config.username, &form.username);
    let password_ok = credentials_match(&state.admin_config.password, &form.password);
    if username_ok && password_ok {
        let session = state
            .tokens
            .lock()
            .await
            .issue(&form.username, TokenKind::AdminSession);
        tracing::info!(%address, "Admin signed in");
        let cookie = set_session_cookie(&session.token);
        (
            [(header::SET_COOKIE, cookie)],
            Redirect::to("/admin"),
        )
            .into_response()
    } else {
        if let Err(e) = state.guard.report_failure(&address, screening.record).await {
            tracing::warn!(%address, "Failed to record login failure: {:?}", e);
        }
        login_page(StatusCode::UNAUTHORIZED, Some(LOGIN_FAILED))
    }
}

pub async fn admin_dashboard(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !has_session(&state, &headers).await {
        return Redirect::to("/admin/login").into_response();
    }
    render_dashboard(&state, None).await
}

pub async fn admin_logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = get_session_token(&headers) {
        state.tokens.lock().await.remove(&token);
    }
    let cookie = clear_session_cookie();
    (
        [(header::SET_COOKIE, cookie)],
        Redirect::to("/admin/login"),
    )
        .into_response()
}

pub async fn admin_add_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<AddAccountForm>,
) -> Response {
    if !has_session(&state, &headers).await {
        return Redirect::to("/admin/login").into_response();
    }

    let result = state.accounts.write().await.add(NewAccount {
        username: form.username,
        password: form.password,
        email: form.email,
        first_name: form.first_name,
        last_name: form.last_name,
        role: form.role,
    });
    let message = match result {
        Ok(account) => format!("Account created: {}", account.username),
        Err(e) => {
            tracing::error!("Failed to add account: {:?}", e);
            format!("Could not create account: {e}")
        }
    };
    render_dashboard(&state, Some(message)).await
}

pub async fn admin_deactivate_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Response {
    if !has_session(&state, &headers).await {
        return Redirect::to("/admin/login").into_response();
    }

    if let Err(e) = state.accounts.write().await.deactivate(&username) {
        tracing::error!("Failed to deactivate account: {:?}", e);
    }
    Redirect::to("/admin").into_response()
}

pub async fn admin_clear_failed_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ClearFailedLoginForm>,
) -> Response {
    if !has_session(&state, &headers).await {
        return Redirect::to("/admin/login").into_response();
    }

    let message = match state.guard.clear(&form.address).await {
        Ok(true) => format!("Cleared failed logins for {}", form.address),
        Ok(false) => format!("No failed logins recorded for {}", form.address),
        Err(e) => {
            tracing::error!("Failed to clear failed login: {:?}", e);
            "Could not clear failed logins".to_string()
        }
    };
    render_dashboard(&state, Some(message)).await
}

pub async fn admin_purge_failed_logins(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if !has_session(&state, &headers).await {
        return Redirect::to("/admin/login").into_response();
    }

    let message = match state.guard.purge_stale().await {
        Ok(purged) => format!("Purged {purged} stale failed-login records"),
        Err(e) => {
            tracing::error!("Failed to purge failed logins: {:?}", e);
            "Could not purge failed logins".to_string()
        }
    };
    render_dashboard(&state, Some(message)).await
}
