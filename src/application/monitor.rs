//! Account Monitor
//!
//! Polls every tracked account, diffs against the persisted cursor state and
//! classifies each new transaction exactly once. Fetches for different
//! accounts run concurrently; results are applied one account at a time in
//! registration order so alert order is deterministic.
//!
//! A cycle's results are applied to a copy of the state. The copy replaces
//! the live state, and its alerts are released, only once it is persisted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::EventBus;
use crate::domain::{
    AccountCursorState, AccountSnapshot, Alert, AlertClassifier, ChangeDetector,
    ClassificationError, MonitorState, PersistError, RawDelta, SnapshotStore, TrackedAccount,
    TransactionDetail, DEFAULT_SEEN_CAPACITY,
};
use crate::ports::{AccountDataSource, DataSourceError};

/// Default delay between poll cycles
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Default bound on one account's fetch
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 20;
/// Default signatures requested per account per cycle
pub const DEFAULT_MAX_SIGNATURES_PER_POLL: usize = 25;
/// Default polls a missing transaction detail is retried before it is skipped
pub const DEFAULT_MAX_DETAIL_MISSES: u32 = 3;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub max_signatures_per_poll: usize,
    pub seen_capacity: usize,
    /// Classify the transactions returned by an account's very first poll
    pub classify_on_first_poll: bool,
    pub max_detail_misses: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            max_signatures_per_poll: DEFAULT_MAX_SIGNATURES_PER_POLL,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            classify_on_first_poll: false,
            max_detail_misses: DEFAULT_MAX_DETAIL_MISSES,
        }
    }
}

/// A per-account problem in one cycle; never fatal to the cycle
#[derive(Debug, Error)]
pub enum PollError {
    #[error("{account}: {source}")]
    DataSource {
        account: String,
        source: DataSourceError,
    },

    #[error("{account}: poll timed out after {timeout:?}")]
    Timeout { account: String, timeout: Duration },

    #[error("{account}: skipped {signature}: {source}")]
    Classification {
        account: String,
        signature: String,
        source: ClassificationError,
    },

    #[error("Failed to persist monitor state: {0}")]
    Persist(#[from] PersistError),
}

/// Everything one cycle produced
#[derive(Debug, Default)]
pub struct PollReport {
    /// Accounts in registration order, transactions in chain order
    pub alerts: Vec<Alert>,
    pub errors: Vec<PollError>,
}

/// I/O results for one account, not yet applied
struct AccountFetch {
    /// Only the transactions this cycle processes
    snapshot: AccountSnapshot,
    deltas: Vec<RawDelta>,
    /// Detail per new signature; errors are permanent and skip the signature
    details: HashMap<String, Result<TransactionDetail, DataSourceError>>,
    /// First signature whose detail is not found yet; it and later ones wait
    stalled: Option<(String, DataSourceError)>,
    baseline: bool,
}

pub struct Monitor {
    config: MonitorConfig,
    source: Arc<dyn AccountDataSource>,
    classifier: AlertClassifier,
    detector: ChangeDetector,
    accounts: Vec<TrackedAccount>,
    state: MonitorState,
    store: Option<Arc<dyn SnapshotStore<MonitorState>>>,
    events: Option<EventBus>,
}

impl Monitor {
    pub fn new(source: Arc<dyn AccountDataSource>, classifier: AlertClassifier) -> Self {
        Self {
            config: MonitorConfig::default(),
            source,
            classifier,
            detector: ChangeDetector::new(),
            accounts: Vec::new(),
            state: MonitorState::default(),
            store: None,
            events: None,
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<TrackedAccount>) -> Self {
        for account in accounts {
            self.add_account(account);
        }
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Attach a state store and restore cursors from it
    pub fn with_store(
        mut self,
        store: Arc<dyn SnapshotStore<MonitorState>>,
    ) -> Result<Self, PersistError> {
        if let Some(state) = store.load()? {
            info!(
                "Restored monitor state for {} account(s)",
                state.accounts.len()
            );
            self.state = state;
        }
        self.store = Some(store);
        Ok(self)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn accounts(&self) -> &[TrackedAccount] {
        &self.accounts
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Track a new account; false if the address is already tracked
    pub fn add_account(&mut self, account: TrackedAccount) -> bool {
        if self.accounts.iter().any(|a| a.address == account.address) {
            return false;
        }
        info!("Tracking {} ({})", account.label(), account.short_address());
        self.accounts.push(account);
        true
    }

    /// Stop tracking an account and forget its cursor
    pub fn remove_account(&mut self, address: &str) -> Option<TrackedAccount> {
        let index = self.accounts.iter().position(|a| a.address == address)?;
        self.state.accounts.remove(address);
        Some(self.accounts.remove(index))
    }

    /// Run one poll cycle over every tracked account
    pub async fn poll(&mut self) -> PollReport {
        let mut report = PollReport::default();
        if self.accounts.is_empty() {
            return report;
        }

        let source = self.source.as_ref();
        let detector = self.detector;
        let timeout = self.config.poll_timeout;
        let limit = self.config.max_signatures_per_poll;
        let classify_first = self.config.classify_on_first_poll;
        let max_misses = self.config.max_detail_misses;

        let fetches = self.accounts.iter().map(|account| {
            let previous = self
                .state
                .accounts
                .get(&account.address)
                .cloned()
                .unwrap_or_default();
            async move {
                let fetch = fetch_account(
                    source,
                    detector,
                    &account.address,
                    previous,
                    limit,
                    classify_first,
                    max_misses,
                );
                tokio::time::timeout(timeout, fetch).await
            }
        });
        let results = join_all(fetches).await;

        let mut next = self.state.clone();
        for (account, result) in self.accounts.iter().zip(results) {
            let fetch = match result {
                Ok(Ok(fetch)) => fetch,
                Ok(Err(source)) => {
                    warn!("Poll failed for {}: {}", account.label(), source);
                    report.errors.push(PollError::DataSource {
                        account: account.address.clone(),
                        source,
                    });
                    continue;
                }
                Err(_) => {
                    warn!("Poll timed out for {} after {:?}", account.label(), timeout);
                    report.errors.push(PollError::Timeout {
                        account: account.address.clone(),
                        timeout,
                    });
                    continue;
                }
            };

            let state = next.accounts.entry(account.address.clone()).or_default();
            apply_fetch(
                &self.classifier,
                self.config.seen_capacity,
                account,
                state,
                fetch,
                &mut report,
            );
        }

        if let Some(store) = &self.store {
            next.saved_at = Some(Utc::now());
            if let Err(e) = store.save_snapshot(&next) {
                warn!(
                    "Failed to persist monitor state, holding back {} alert(s) for the next cycle: {}",
                    report.alerts.len(),
                    e
                );
                report.alerts.clear();
                report.errors.push(PollError::Persist(e));
                return report;
            }
        }
        self.state = next;

        if let Some(events) = &self.events {
            for alert in &report.alerts {
                events.publish_alert(alert);
            }
        }

        debug!(
            "Poll cycle: {} account(s), {} alert(s), {} error(s)",
            self.accounts.len(),
            report.alerts.len(),
            report.errors.len()
        );

        report
    }
}

async fn fetch_account(
    source: &dyn AccountDataSource,
    detector: ChangeDetector,
    address: &str,
    previous: AccountCursorState,
    limit: usize,
    classify_first: bool,
    max_misses: u32,
) -> Result<AccountFetch, DataSourceError> {
    let balance = source.get_balance(address).await?;
    let transactions = if previous.is_baseline() {
        source.get_recent_transactions(address, limit).await?
    } else {
        source
            .get_new_transactions(address, previous.cursor.as_ref(), limit)
            .await?
    };

    let mut snapshot = AccountSnapshot {
        address: address.to_string(),
        balance,
        transactions,
    };
    let baseline = previous.is_baseline() && !classify_first;
    let mut deltas = detector.detect(&previous, &snapshot);

    let mut details = HashMap::new();
    let mut stalled = None;
    if !baseline {
        for delta in &deltas {
            let RawDelta::NewTransaction(tx) = delta else {
                continue;
            };
            match source.get_transaction_detail(&tx.signature).await {
                Ok(detail) => {
                    details.insert(tx.signature.clone(), Ok(detail));
                }
                Err(e @ DataSourceError::ParseError(_)) => {
                    details.insert(tx.signature.clone(), Err(e));
                }
                Err(e @ DataSourceError::TransactionNotFound(_)) => {
                    if previous.misses_for(&tx.signature) + 1 >= max_misses {
                        details.insert(tx.signature.clone(), Err(e));
                    } else {
                        stalled = Some((tx.signature.clone(), e));
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    if let Some((signature, _)) = &stalled {
        let keep = snapshot
            .transactions
            .iter()
            .position(|t| &t.signature == signature)
            .unwrap_or(snapshot.transactions.len());
        snapshot.transactions.truncate(keep);
        deltas.retain(|d| match d {
            RawDelta::NewTransaction(tx) => details.contains_key(&tx.signature),
            RawDelta::BalanceChanged { .. } => true,
        });
    }

    Ok(AccountFetch {
        snapshot,
        deltas,
        details,
        stalled,
        baseline,
    })
}

/// Fold one account's fetch into its cursor state and the cycle report
fn apply_fetch(
    classifier: &AlertClassifier,
    seen_capacity: usize,
    account: &TrackedAccount,
    state: &mut AccountCursorState,
    fetch: AccountFetch,
    report: &mut PollReport,
) {
    let AccountFetch {
        snapshot,
        deltas,
        mut details,
        stalled,
        baseline,
    } = fetch;

    if baseline {
        for tx in &snapshot.transactions {
            state.mark_seen(&tx.signature, seen_capacity);
            state.advance_cursor(tx);
        }
        state.last_balance = Some(snapshot.balance);
        info!(
            "Baseline for {}: {:.4} SOL, {} existing transaction(s) skipped",
            account.label(),
            snapshot.balance,
            snapshot.transactions.len()
        );
        return;
    }

    let has_new_tx = deltas
        .iter()
        .any(|d| matches!(d, RawDelta::NewTransaction(_)));

    for delta in deltas {
        match delta {
            RawDelta::BalanceChanged { delta, current, .. } => {
                if has_new_tx {
                    debug!("{} balance {:+.6} SOL -> {:.6}", account.label(), delta, current);
                } else {
                    info!(
                        "{} balance moved {:+.6} SOL with no new transaction",
                        account.label(),
                        delta
                    );
                }
            }
            RawDelta::NewTransaction(tx) => {
                match details.remove(&tx.signature) {
                    Some(Ok(detail)) => match classifier.classify(account, &detail) {
                        Ok(alerts) => report.alerts.extend(alerts),
                        Err(source) => skip_signature(report, account, &tx.signature, source),
                    },
                    Some(Err(e)) => {
                        let source = ClassificationError::UnreadableDetail {
                            signature: tx.signature.clone(),
                            reason: e.to_string(),
                        };
                        skip_signature(report, account, &tx.signature, source);
                    }
                    None => {}
                }
                state.mark_seen(&tx.signature, seen_capacity);
                state.detail_misses.remove(&tx.signature);
            }
        }
    }

    for tx in &snapshot.transactions {
        state.advance_cursor(tx);
    }
    state.last_balance = Some(snapshot.balance);

    if let Some((signature, source)) = stalled {
        let misses = state.record_detail_miss(&signature);
        warn!(
            "Detail for {} on {} not found yet (attempt {}); later transactions wait",
            signature,
            account.label(),
            misses
        );
        report.errors.push(PollError::DataSource {
            account: account.address.clone(),
            source,
        });
    }
}

/// Report a signature that will never be classified
fn skip_signature(
    report: &mut PollReport,
    account: &TrackedAccount,
    signature: &str,
    source: ClassificationError,
) {
    warn!("Skipping {} for {}: {}", signature, account.label(), source);
    report.errors.push(PollError::Classification {
        account: account.address.clone(),
        signature: signature.to_string(),
        source,
    });
}
