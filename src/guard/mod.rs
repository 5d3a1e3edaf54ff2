pub mod address;
pub mod ledger;
pub mod policy;

use std::future::Future;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub use address::ClientAddress;
pub use ledger::{AttemptLedger, AttemptRecord, Ledger};
pub use policy::GuardPolicy;

/// Result of checking an address before its credentials are looked at.
#[derive(Debug, Clone, Default)]
pub struct Screening {
    pub blocked: bool,
    /// The record as stored after the check, handed back to `report_failure`.
    pub record: Option<AttemptRecord>,
}

/// Outcome of `record_attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Rejected { attempts: u32 },
    Blocked { attempts: u32 },
}

/// Why a guarded login did not go through. Callers must render both the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginError {
    Blocked,
    InvalidCredentials,
}

/// Failed-login throttling keyed by client address.
///
/// Read-modify-write sequences on the ledger are serialized through
/// `write_lock`, so concurrent failures from one address are never lost.
pub struct LoginGuard<L> {
    ledger: L,
    policy: GuardPolicy,
    write_lock: Mutex<()>,
}

impl<L: AttemptLedger> LoginGuard<L> {
    pub fn new(ledger: L, policy: GuardPolicy) -> Self {
        LoginGuard {
            ledger,
            policy,
            write_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    /// Checks whether `address` is currently blocked.
    ///
    /// A blocked check is itself counted: the attempt counter is bumped and
    /// the window restarts.
    pub async fn is_blocked(&self, address: &ClientAddress) -> anyhow::Result<Screening> {
        let key = address.key();
        let _write = self.write_lock.lock().await;
        let record = self.ledger.get(&key).await?;

        match self.policy.extend_block(record.as_ref(), Utc::now()) {
            Some(extended) => {
                self.ledger.upsert(extended.clone()).await?;
                warn!(
                    %address,
                    attempts = extended.attempts,
                    "login attempt from blocked address"
                );
                Ok(Screening {
                    blocked: true,
                    record: Some(extended),
                })
            }
            None => Ok(Screening {
                blocked: false,
                record,
            }),
        }
    }

    /// Records a failed login and returns the new attempt count.
    ///
    /// `existing` is the record returned by `is_blocked` for the same address;
    /// when given, the ledger is not read again.
    pub async fn report_failure(
        &self,
        address: &ClientAddress,
        existing: Option<AttemptRecord>,
    ) -> anyhow::Result<u32> {
        let key = address.key();
        let _write = self.write_lock.lock().await;
        let record = match existing.filter(|r| r.address == key) {
            Some(record) => Some(record),
            None => self.ledger.get(&key).await?,
        };

        let next = self.policy.after_failure(&key, record, Utc::now());
        let attempts = next.attempts;
        self.ledger.upsert(next).await?;
        info!(%address, attempts, "failed login recorded");
        Ok(attempts)
    }

    /// Applies the outcome of one credential check in a single ledger update.
    ///
    /// The block check is repeated under the write lock, so an address that
    /// crossed the threshold while its credentials were being verified is
    /// reported as `Blocked` even if `succeeded` is true.
    pub async fn record_attempt(
        &self,
        address: &ClientAddress,
        succeeded: bool,
    ) -> anyhow::Result<Decision> {
        let key = address.key();
        let _write = self.write_lock.lock().await;
        let record = self.ledger.get(&key).await?;
        let now = Utc::now();

        if let Some(extended) = self.policy.extend_block(record.as_ref(), now) {
            let attempts = extended.attempts;
            self.ledger.upsert(extended).await?;
            warn!(%address, attempts, "login attempt from blocked address");
            return Ok(Decision::Blocked { attempts });
        }
        if succeeded {
            return Ok(Decision::Allowed);
        }

        let next = self.policy.after_failure(&key, record, now);
        let attempts = next.attempts;
        self.ledger.upsert(next).await?;
        info!(%address, attempts, "failed login recorded");
        Ok(Decision::Rejected { attempts })
    }

    /// Runs `verify` behind the guard.
    ///
    /// Blocked addresses are refused before `verify` runs. A `None` from
    /// `verify` is recorded as a failure; success leaves the ledger alone.
    /// Ledger errors are logged and otherwise ignored.
    pub async fn authenticate<T, F, Fut>(
        &self,
        address: &ClientAddress,
        verify: F,
    ) -> Result<T, LoginError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        match self.is_blocked(address).await {
            Ok(screening) if screening.blocked => return Err(LoginError::Blocked),
            Ok(_) => {}
            Err(err) => warn!(%address, "failed to check login attempts: {err:#}"),
        }

        if let Some(value) = verify().await {
            return Ok(value);
        }

        match self.record_attempt(address, false).await {
            Ok(Decision::Blocked { .. }) => Err(LoginError::Blocked),
            Ok(_) => Err(LoginError::InvalidCredentials),
            Err(err) => {
                warn!(%address, "failed to record login failure: {err:#}");
                Err(LoginError::InvalidCredentials)
            }
        }
    }

    pub async fn records(&self) -> anyhow::Result<Vec<AttemptRecord>> {
        self.ledger.list().await
    }

    /// Drops the record for one ledger key, lifting any block on it.
    pub async fn clear(&self, key: &str) -> anyhow::Result<bool> {
        let _write = self.write_lock.lock().await;
        self.ledger.remove(key).await
    }

    /// Drops records that have already aged out of the window.
    pub async fn purge_stale(&self) -> anyhow::Result<usize> {
        let _write = self.write_lock.lock().await;
        match self.policy.cutoff(Utc::now()) {
            Some(cutoff) => self.ledger.purge_before(cutoff).await,
            None => Ok(0),
        }
    }
}
