use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Salted SHA-256 of a password, both parts hex encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordDigest {
    salt: String,
    digest: String,
}

impl PasswordDigest {
    pub fn new(password: &str) -> Self {
        let salt: [u8; 16] = rand::thread_rng().r#gen();
        PasswordDigest {
            salt: hex::encode(salt),
            digest: hex::encode(digest(&salt, password)),
        }
    }

    pub fn matches(&self, password: &str) -> bool {
        let (Ok(salt), Ok(expected)) = (hex::decode(&self.salt), hex::decode(&self.digest)) else {
            return false;
        };
        digest(&salt, password).ct_eq(expected.as_slice()).into()
    }
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Jobseeker,
    Mentor,
    Superuser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub is_jobseeker: bool,
    pub is_mentor: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub password: PasswordDigest,
    pub created_at: DateTime<Utc>,
}

pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountsFile {
    accounts: Vec<Account>,
}

pub struct AccountStore {
    file_path: PathBuf,
    accounts: Vec<Account>,
}

impl AccountStore {
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        let accounts = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: AccountsFile = serde_json::from_str(&content)?;
            file.accounts
        } else {
            Vec::new()
        };

        Ok(AccountStore {
            file_path: path.to_path_buf(),
            accounts,
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        let file = AccountsFile {
            accounts: self.accounts.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }

    /// Returns the account when the username exists, is active and the
    /// password matches.
    pub fn verify(&self, username: &str, password: &str) -> Option<Account> {
        self.find(username)
            .filter(|a| a.is_active && a.password.matches(password))
            .cloned()
    }

    pub fn find(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username == username)
    }

    pub fn add(&mut self, new: NewAccount) -> anyhow::Result<Account> {
        let username = new.username.trim().to_string();
        if username.is_empty() {
            anyhow::bail!("username must not be empty");
        }
        if !username.chars().all(is_username_char) {
            anyhow::bail!("username may only contain letters, digits and @ . + - _");
        }
        if new.password.is_empty() {
            anyhow::bail!("password must not be empty");
        }
        if self.find(&username).is_some() {
            anyhow::bail!("username {username:?} is already taken");
        }

        let account = Account {
            id: Uuid::new_v4(),
            username,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            is_jobseeker: new.role == Role::Jobseeker,
            is_mentor: new.role == Role::Mentor,
            is_superuser: new.role == Role::Superuser,
            is_active: true,
            password: PasswordDigest::new(&new.password),
            created_at: Utc::now(),
        };
        self.accounts.push(account.clone());
        self.save()?;
        Ok(account)
    }

    pub fn deactivate(&mut self, username: &str) -> anyhow::Result<bool> {
        if let Some(account) = self.accounts.iter_mut().find(|a| a.username == username) {
            account.is_active = false;
            self.save()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn list(&self) -> &[Account] {
        &self.accounts
    }
}

// Usernames appear as a URL path segment in the admin console.
fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

#[cfg(test)]
pub(crate) fn new_account(username: &str, password: &str, role: Role) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        password: password.to_string(),
        email: format!("{username}@test.com"),
        first_name: String::new(),
        last_name: "Test".to_string(),
        role,
    }
}
