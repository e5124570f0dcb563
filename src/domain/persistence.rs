//! Snapshot Persistence
//!
//! Crash-safe storage for the paper portfolio and the monitor's cursors.
//! Files are rewritten whole through a temp file + fsync + rename, so a crash
//! mid-write leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::AccountCursorState;
use super::ledger::{Ledger, LedgerStats, LedgerTrade, Position};

/// Default portfolio file name
pub const DEFAULT_PORTFOLIO_FILE: &str = "paper_portfolio.json";

/// Default monitor state file name
pub const DEFAULT_MONITOR_STATE_FILE: &str = "monitor_state.json";

#[derive(Error, Debug, Clone)]
pub enum PersistError {
    #[error("Failed to serialize snapshot: {0}")]
    SerializationError(String),

    #[error("Failed to write snapshot file: {0}")]
    WriteError(String),

    #[error("Failed to read snapshot file: {0}")]
    ReadError(String),

    #[error("Snapshot file is corrupted: {0}")]
    Corrupted(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),
}

/// Load/save interface for a whole-state snapshot
pub trait SnapshotStore<T>: Send + Sync {
    /// Last saved snapshot, `None` if nothing has been saved yet
    fn load(&self) -> Result<Option<T>, PersistError>;

    /// Replace the stored snapshot
    fn save_snapshot(&self, snapshot: &T) -> Result<(), PersistError>;
}

/// Write bytes to `path` atomically
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| PersistError::DirectoryError(e.to_string()))?;

    let temp_path = temp_path_for(path);
    {
        let mut file = File::create(&temp_path)
            .map_err(|e| PersistError::WriteError(format!("{}: {}", temp_path.display(), e)))?;
        file.write_all(bytes)
            .map_err(|e| PersistError::WriteError(format!("{}: {}", temp_path.display(), e)))?;
        file.sync_all()
            .map_err(|e| PersistError::WriteError(format!("{}: {}", temp_path.display(), e)))?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        PersistError::WriteError(format!(
            "rename {} -> {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Sibling temp file: `state.json` -> `state.json.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// JSON file store
#[derive(Debug)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> SnapshotStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| PersistError::ReadError(e.to_string()))?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot = serde_json::from_str(&content)
            .map_err(|e| PersistError::Corrupted(format!("{}: {}", self.path.display(), e)))?;

        tracing::debug!("Snapshot loaded from {}", self.path.display());
        Ok(Some(snapshot))
    }

    fn save_snapshot(&self, snapshot: &T) -> Result<(), PersistError> {
        let content = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| PersistError::SerializationError(e.to_string()))?;
        write_atomic(&self.path, &content)?;
        tracing::debug!("Snapshot saved to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store with write-failure injection
#[derive(Debug, Clone)]
pub struct MemoryStore<T> {
    inner: Arc<Mutex<MemoryInner<T>>>,
}

#[derive(Debug)]
struct MemoryInner<T> {
    snapshot: Option<T>,
    fail_writes: bool,
    saves: usize,
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                snapshot: None,
                fail_writes: false,
                saves: 0,
            })),
        }
    }

    pub fn with_snapshot(snapshot: T) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            inner.snapshot = Some(snapshot);
        }
        store
    }

    /// Make every subsequent save fail
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = fail;
        }
    }

    pub fn snapshot(&self) -> Option<T> {
        self.inner.lock().ok().and_then(|inner| inner.snapshot.clone())
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.saves).unwrap_or(0)
    }
}

impl<T: Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> Result<Option<T>, PersistError> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| PersistError::ReadError(e.to_string()))?;
        Ok(inner.snapshot.clone())
    }

    fn save_snapshot(&self, snapshot: &T) -> Result<(), PersistError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| PersistError::WriteError(e.to_string()))?;
        if inner.fail_writes {
            return Err(PersistError::WriteError("injected write failure".to_string()));
        }
        inner.snapshot = Some(snapshot.clone());
        inner.saves += 1;
        Ok(())
    }
}

/// Persisted paper portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub enabled: bool,
    pub cash_balance: f64,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub trade_history: Vec<LedgerTrade>,
    pub stats: LedgerStats,
    #[serde(default = "default_next_trade_id")]
    pub next_trade_id: u64,
    pub saved_at: DateTime<Utc>,
}

fn default_next_trade_id() -> u64 {
    1
}

impl PortfolioSnapshot {
    pub fn capture(enabled: bool, ledger: &Ledger) -> Self {
        Self {
            enabled,
            cash_balance: ledger.cash(),
            positions: ledger.positions().clone(),
            trade_history: ledger.history().to_vec(),
            stats: ledger.stats().clone(),
            next_trade_id: ledger.next_trade_id(),
            saved_at: Utc::now(),
        }
    }

    pub fn into_ledger(self) -> Ledger {
        Ledger::from_parts(
            self.cash_balance,
            self.positions,
            self.trade_history,
            self.stats,
            self.next_trade_id,
        )
    }
}

/// Persisted monitor progress, keyed by account address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountCursorState>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl MonitorState {
    pub fn account(&self, address: &str) -> Option<&AccountCursorState> {
        self.accounts.get(address)
    }
}
