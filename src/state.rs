use tokio::sync::{Mutex, RwLock};

use crate::accounts::store::AccountStore;
use crate::config::AdminConfig;
use crate::guard::{Ledger, LoginGuard};
use crate::token::store::TokenStore;

pub struct AppState {
    pub guard: LoginGuard<Ledger>,
    pub accounts: RwLock<AccountStore>,
    pub tokens: Mutex<TokenStore>,
    pub admin_config: AdminConfig,
    pub trust_forwarded_for: bool,
}
