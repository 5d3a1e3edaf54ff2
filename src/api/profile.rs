use axum::Json;
use serde::Serialize;

use crate::accounts::permission::Permission;
use crate::api::auth::CurrentAccount;

#[derive(Debug, Serialize)]
pub struct Profile {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_jobseeker: bool,
    pub is_mentor: bool,
    pub is_superuser: bool,
    pub permissions: Vec<&'static str>,
}

pub async fn me(CurrentAccount(account): CurrentAccount) -> Json<Profile> {
    let permissions = Permission::granted(&account);
    Json(Profile {
        username: account.username,
        email: account.email,
        first_name: account.first_name,
        last_name: account.last_name,
        is_jobseeker: account.is_jobseeker,
        is_mentor: account.is_mentor,
        is_superuser: account.is_superuser,
        permissions,
    })
}
