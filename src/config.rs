use std::path::PathBuf;
use std::str::FromStr;

use crate::guard::policy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_SECS, MAX_WINDOW_SECS};

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub accounts_path: PathBuf,
    pub ledger: LedgerConfig,
    pub login: LoginConfig,
    pub admin: AdminConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerConfig {
    Memory,
    File(PathBuf),
}

#[derive(Clone)]
pub struct LoginConfig {
    pub max_attempts: u32,
    pub window_secs: i64,
    pub trust_forwarded_for: bool,
}

#[derive(Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let admin_id = std::env::var("CAREERNAV_ADMIN_ID")
            .map_err(|_| anyhow::anyhow!("CAREERNAV_ADMIN_ID environment variable is required"))?;
        let admin_password = std::env::var("CAREERNAV_ADMIN_PASSWORD").map_err(|_| {
            anyhow::anyhow!("CAREERNAV_ADMIN_PASSWORD environment variable is required")
        })?;

        Ok(Config {
            bind_addr: {
                let port = std::env::var("CAREERNAV_PORT").unwrap_or_else(|_| "8080".to_string());
                std::env::var("CAREERNAV_BIND_ADDR")
                    .unwrap_or_else(|_| format!("0.0.0.0:{}", port))
            },
            accounts_path: PathBuf::from(
                std::env::var("CAREERNAV_ACCOUNTS_PATH")
                    .unwrap_or_else(|_| "./accounts.json".to_string()),
            ),
            ledger: parse_ledger(
                &std::env::var("CAREERNAV_LEDGER_PATH")
                    .unwrap_or_else(|_| "./failed_logins.json".to_string()),
            ),
            login: LoginConfig {
                max_attempts: env_or("CAREERNAV_LOGIN_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
                window_secs: check_window(env_or(
                    "CAREERNAV_LOGIN_WINDOW_SECS",
                    DEFAULT_WINDOW_SECS,
                )?)?,
                trust_forwarded_for: env_or("CAREERNAV_TRUST_FORWARDED_FOR", true)?,
            },
            admin: AdminConfig {
                username: admin_id,
                password: admin_password,
            },
        })
    }
}

fn parse_ledger(value: &str) -> LedgerConfig {
    match value.trim() {
        "memory" => LedgerConfig::Memory,
        path => LedgerConfig::File(PathBuf::from(path)),
    }
}

fn check_window(secs: i64) -> anyhow::Result<i64> {
    if !(1..=MAX_WINDOW_SECS).contains(&secs) {
        anyhow::bail!(
            "CAREERNAV_LOGIN_WINDOW_SECS must be between 1 and {MAX_WINDOW_SECS}, got {secs}"
        );
    }
    Ok(secs)
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid value {raw:?} for {key}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ledger() {
        assert_eq!(parse_ledger("memory"), LedgerConfig::Memory);
        assert_eq!(
            parse_ledger("/var/lib/careernav/failed_logins.json"),
            LedgerConfig::File(PathBuf::from("/var/lib/careernav/failed_logins.json"))
        );
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value::<u32>("CAREERNAV_LOGIN_MAX_ATTEMPTS", " 25 ").unwrap(), 25);
        assert!(!parse_value::<bool>("CAREERNAV_TRUST_FORWARDED_FOR", "false").unwrap());
        let err = parse_value::<u32>("CAREERNAV_LOGIN_MAX_ATTEMPTS", "ten").unwrap_err();
        assert!(err.to_string().contains("CAREERNAV_LOGIN_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_check_window() {
        assert_eq!(check_window(DEFAULT_WINDOW_SECS).unwrap(), 3600);
        assert_eq!(check_window(MAX_WINDOW_SECS).unwrap(), MAX_WINDOW_SECS);
        assert!(check_window(0).is_err());
        assert!(check_window(-3600).is_err());
        assert!(check_window(10_000_000_000_000).is_err());
        assert!(check_window(i64::MAX).is_err());
    }
}
