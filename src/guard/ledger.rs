use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub address: String,
    pub last_updated: DateTime<Utc>,
    pub attempts: u32,
}

impl AttemptRecord {
    pub fn new(address: impl Into<String>, now: DateTime<Utc>) -> Self {
        AttemptRecord {
            address: address.into(),
            last_updated: now,
            attempts: 1,
        }
    }
}

/// Storage for failed-login records, one per normalized address.
///
/// A missing record is reported as `Ok(None)`, never as an error.
pub trait AttemptLedger: Send + Sync {
    fn get(
        &self,
        address: &str,
    ) -> impl Future<Output = anyhow::Result<Option<AttemptRecord>>> + Send;

    fn upsert(&self, record: AttemptRecord) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn list(&self) -> impl Future<Output = anyhow::Result<Vec<AttemptRecord>>> + Send;

    fn remove(&self, address: &str) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Drops every record last updated before `cutoff`.
    fn purge_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<usize>> + Send;
}

fn sorted(records: &HashMap<String, AttemptRecord>) -> Vec<AttemptRecord> {
    let mut records: Vec<AttemptRecord> = records.values().cloned().collect();
    records.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
    records
}

#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<HashMap<String, AttemptRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttemptLedger for MemoryLedger {
    async fn get(&self, address: &str) -> anyhow::Result<Option<AttemptRecord>> {
        Ok(self.records.lock().await.get(address).cloned())
    }

    async fn upsert(&self, record: AttemptRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .await
            .insert(record.address.clone(), record);
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<AttemptRecord>> {
        Ok(sorted(&*self.records.lock().await))
    }

    async fn remove(&self, address: &str) -> anyhow::Result<bool> {
        Ok(self.records.lock().await.remove(address).is_some())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.last_updated >= cutoff);
        Ok(before - records.len())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    records: Vec<AttemptRecord>,
}

/// JSON-file ledger. The whole file is replaced after every mutation by
/// writing a sibling temp file and renaming it over the old one, so the file
/// on disk is always a complete snapshot.
pub struct FileLedger {
    file_path: PathBuf,
    records: Mutex<HashMap<String, AttemptRecord>>,
}

impl FileLedger {
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        let records = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match serde_json::from_str::<LedgerFile>(&content) {
                Ok(file) => file
                    .records
                    .into_iter()
                    .map(|r| (r.address.clone(), r))
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        "Failed-login ledger is unreadable, starting empty: {}",
                        e
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(FileLedger {
            file_path: path.to_path_buf(),
            records: Mutex::new(records),
        })
    }

    async fn save(&self, records: &HashMap<String, AttemptRecord>) -> anyhow::Result<()> {
        let file = LedgerFile {
            records: sorted(records),
        };
        let content = serde_json::to_string_pretty(&file)?;
        let path = self.file_path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, content.as_bytes())).await?
    }
}

fn replace_file(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

impl AttemptLedger for FileLedger {
    async fn get(&self, address: &str) -> anyhow::Result<Option<AttemptRecord>> {
        Ok(self.records.lock().await.get(address).cloned())
    }

    async fn upsert(&self, record: AttemptRecord) -> anyhow::Result<()> {
        let mut records = self.records.lock().await;
        records.insert(record.address.clone(), record);
        self.save(&records).await
    }

    async fn list(&self) -> anyhow::Result<Vec<AttemptRecord>> {
        Ok(sorted(&*self.records.lock().await))
    }

    async fn remove(&self, address: &str) -> anyhow::Result<bool> {
        let mut records = self.records.lock().await;
        if records.remove(address).is_none() {
            return Ok(false);
        }
        self.save(&records).await?;
        Ok(true)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, r| r.last_updated >= cutoff);
        let purged = before - records.len();
        if purged > 0 {
            self.save(&records).await?;
        }
        Ok(purged)
    }
}

/// Ledger backend selected at startup.
pub enum Ledger {
    Memory(MemoryLedger),
    File(FileLedger),
}

impl AttemptLedger for Ledger {
    async fn get(&self, address: &str) -> anyhow::Result<Option<AttemptRecord>> {
        match self {
            Ledger::Memory(l) => l.get(address).await,
            Ledger::File(l) => l.get(address).await,
        }
    }

    async fn upsert(&self, record: AttemptRecord) -> anyhow::Result<()> {
        match self {
            Ledger::Memory(l) => l.upsert(record).await,
            Ledger::File(l) => l.upsert(record).await,
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<AttemptRecord>> {
        match self {
            Ledger::Memory(l) => l.list().await,
            Ledger::File(l) => l.list().await,
        }
    }

    async fn remove(&self, address: &str) -> anyhow::Result<bool> {
        match self {
            Ledger::Memory(l) => l.remove(address).await,
            Ledger::File(l) => l.remove(address).await,
        }
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        match self {
            Ledger::Memory(l) => l.purge_before(cutoff).await,
            Ledger::File(l) => l.purge_before(cutoff).await,
        }
    }
}
