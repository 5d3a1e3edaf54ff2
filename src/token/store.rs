use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    AdminSession,
}

impl TokenKind {
    fn lifetime(self) -> Duration {
        match self {
            TokenKind::Access => Duration::minutes(5),
            TokenKind::Refresh => Duration::days(1),
            TokenKind::AdminSession => Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub subject: String,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
}

impl IssuedToken {
    fn new(subject: &str, kind: TokenKind) -> Self {
        IssuedToken {
            token: generate_token(),
            subject: subject.to_string(),
            kind,
            issued_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() - self.issued_at > self.kind.lifetime()
    }
}

/// Opaque bearer tokens held in memory. Restarting the server signs
/// everyone out.
pub struct TokenStore {
    tokens: HashMap<String, IssuedToken>,
}

impl TokenStore {
    pub fn new() -> Self {
        TokenStore {
            tokens: HashMap::new(),
        }
    }

    pub fn issue(&mut self, subject: &str, kind: TokenKind) -> IssuedToken {
        let token = IssuedToken::new(subject, kind);
        self.tokens.insert(token.token.clone(), token.clone());
        token
    }

    /// Issues an access/refresh pair for `subject`.
    pub fn issue_pair(&mut self, subject: &str) -> (IssuedToken, IssuedToken) {
        (
            self.issue(subject, TokenKind::Access),
            self.issue(subject, TokenKind::Refresh),
        )
    }

    pub fn validate(&self, token: &str, kind: TokenKind) -> Option<&IssuedToken> {
        self.tokens
            .get(token)
            .filter(|t| t.kind == kind && !t.is_expired())
    }

    /// True for any live access or refresh token.
    pub fn verify(&self, token: &str) -> bool {
        self.validate(token, TokenKind::Access).is_some()
            || self.validate(token, TokenKind::Refresh).is_some()
    }

    /// Trades a live refresh token for a new access token.
    pub fn refresh(&mut self, refresh_token: &str) -> Option<IssuedToken> {
        let subject = self
            .validate(refresh_token, TokenKind::Refresh)?
            .subject
            .clone();
        Some(self.issue(&subject, TokenKind::Access))
    }

    pub fn remove(&mut self, token: &str) {
        self.tokens.remove(token);
    }

    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| !t.is_expired());
        before - self.tokens.len()
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.r#gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backdate(store: &mut TokenStore, token: &str, age: Duration) {
        if let Some(t) = store.tokens.get_mut(token) {
            t.issued_at = Utc::now() - age;
        }
    }

    #[test]
    fn test_issue_pair_and_validate() {
        let mut store = TokenStore::new();
        let (access, refresh) = store.issue_pair("jobseeker_test");
        assert_ne!(access.token, refresh.token);
        assert_eq!(access.token.len(), 64);
        assert!(store.validate(&access.token, TokenKind::Access).is_some());
        assert!(store.validate(&access.token, TokenKind::Refresh).is_none());
        assert!(store.verify(&access.token));
        assert!(store.verify(&refresh.token));
        assert!(!store.verify("nonexistent"));
    }

    #[test]
    fn test_admin_session_is_not_an_api_token() {
        let mut store = TokenStore::new();
        let session = store.issue("admin", TokenKind::AdminSession);
        assert!(!store.verify(&session.token));
        assert!(store
            .validate(&session.token, TokenKind::AdminSession)
            .is_some());
    }

    #[test]
    fn test_refresh_issues_access_for_same_subject() {
        let mut store = TokenStore::new();
        let (access, refresh) = store.issue_pair("mentor_test");
        let fresh = store.refresh(&refresh.token).unwrap();
        assert_eq!(fresh.subject, "mentor_test");
        assert_eq!(fresh.kind, TokenKind::Access);
        assert!(store.refresh(&access.token).is_none());
    }

    #[test]
    fn test_expiry() {
        let mut store = TokenStore::new();
        let (access, refresh) = store.issue_pair("mentor_test");
        backdate(&mut store, &access.token, Duration::minutes(6));
        assert!(!store.verify(&access.token));
        assert!(store.verify(&refresh.token));

        backdate(&mut store, &refresh.token, Duration::days(2));
        assert!(store.refresh(&refresh.token).is_none());
        assert_eq!(store.cleanup_expired(), 2);
    }

    #[test]
    fn test_remove() {
        let mut store = TokenStore::new();
        let session = store.issue("admin", TokenKind::AdminSession);
        store.remove(&session.token);
        assert!(store
            .validate(&session.token, TokenKind::AdminSession)
            .is_none());
    }
}
