use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod accounts;
mod admin;
mod api;
mod config;
mod error;
mod guard;
mod state;
mod token;

use accounts::store::AccountStore;
use config::{Config, LedgerConfig};
use guard::ledger::{FileLedger, Ledger, MemoryLedger};
use guard::{GuardPolicy, LoginGuard};
use state::AppState;
use token::store::TokenStore;

const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let accounts = AccountStore::load_or_create(&config.accounts_path)?;
    let ledger = match &config.ledger {
        LedgerConfig::Memory => {
            tracing::warn!("Failed-login ledger is in memory and will not survive a restart");
            Ledger::Memory(MemoryLedger::new())
        }
        LedgerConfig::File(path) => Ledger::File(FileLedger::load_or_create(path)?),
    };
    let policy = GuardPolicy::new(
        config.login.max_attempts,
        chrono::Duration::seconds(config.login.window_secs),
    );

    let state = Arc::new(AppState {
        guard: LoginGuard::new(ledger, policy),
        accounts: tokio::sync::RwLock::new(accounts),
        tokens: tokio::sync::Mutex::new(TokenStore::new()),
        admin_config: config.admin,
        trust_forwarded_for: config.login.trust_forwarded_for,
    });

    tokio::spawn(cleanup_expired_tokens(state.clone()));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("careernav-auth listening on {}", config.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Token API
        .route("/api/token/pair", post(api::token::obtain_pair))
        .route("/api/token/verify", post(api::token::verify))
        .route("/api/token/refresh", post(api::token::refresh))
        .route("/api/me", get(api::profile::me))
        // Admin routes
        .route("/admin", get(admin::routes::admin_dashboard))
        .route(
            "/admin/login",
            get(admin::routes::admin_login_page).post(admin::routes::admin_login_submit),
        )
        .route("/admin/logout", post(admin::routes::admin_logout))
        .route("/admin/accounts", post(admin::routes::admin_add_account))
        .route(
            "/admin/accounts/{username}/deactivate",
            post(admin::routes::admin_deactivate_account),
        )
        .route(
            "/admin/failed-logins/clear",
            post(admin::routes::admin_clear_failed_login),
        )
        .route(
            "/admin/failed-logins/purge",
            post(admin::routes::admin_purge_failed_logins),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn cleanup_expired_tokens(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(TOKEN_CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        let removed = state.tokens.lock().await.cleanup_expired();
        if removed > 0 {
            tracing::debug!(removed, "Dropped expired tokens");
        }
    }
}
