//! Persistent Paper Portfolio
//!
//! Wraps a [`Ledger`] with write-through persistence. Every mutation is
//! applied to a copy, snapshotted, and only committed once the snapshot is
//! durable: memory never gets ahead of disk.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use super::ledger::{Ledger, LedgerError, LedgerTrade};
use super::persistence::{PersistError, PortfolioSnapshot, SnapshotStore};

#[derive(Debug, Error, Clone)]
pub enum PortfolioError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to persist portfolio: {0}")]
    Persist(#[from] PersistError),
}

pub struct PaperPortfolio {
    ledger: Ledger,
    enabled: bool,
    store: Arc<dyn SnapshotStore<PortfolioSnapshot>>,
}

impl std::fmt::Debug for PaperPortfolio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperPortfolio")
            .field("ledger", &self.ledger)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl PaperPortfolio {
    /// Load from `store`, or start fresh with `starting_balance` SOL
    ///
    /// A fresh portfolio is written immediately so the file exists from the
    /// first run.
    pub fn load_or_default(
        store: Arc<dyn SnapshotStore<PortfolioSnapshot>>,
        starting_balance: f64,
    ) -> Result<Self, PortfolioError> {
        match store.load()? {
            Some(snapshot) => {
                let enabled = snapshot.enabled;
                let ledger = snapshot.into_ledger();
                info!(
                    "Loaded paper portfolio: {:.4} SOL cash, {} position(s), {} trade(s)",
                    ledger.cash(),
                    ledger.positions().len(),
                    ledger.history().len()
                );
                Ok(Self {
                    ledger,
                    enabled,
                    store,
                })
            }
            None => {
                if !starting_balance.is_finite() || starting_balance < 0.0 {
                    return Err(LedgerError::InvalidStartingBalance(starting_balance).into());
                }
                let portfolio = Self {
                    ledger: Ledger::new(starting_balance),
                    enabled: true,
                    store,
                };
                portfolio.persist(&portfolio.ledger, portfolio.enabled)?;
                info!("Created paper portfolio with {} SOL", starting_balance);
                Ok(portfolio)
            }
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cash(&self) -> f64 {
        self.ledger.cash()
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), PortfolioError> {
        if self.enabled == enabled {
            return Ok(());
        }
        self.persist(&self.ledger, enabled)?;
        self.enabled = enabled;
        Ok(())
    }

    pub fn buy(
        &mut self,
        asset_id: &str,
        symbol: Option<&str>,
        cash_amount: f64,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<LedgerTrade, PortfolioError> {
        let mut next = self.ledger.clone();
        let trade = next.buy(asset_id, symbol, cash_amount, price, now)?;
        self.commit(next)?;
        Ok(trade)
    }

    pub fn sell(
        &mut self,
        asset_id: &str,
        asset_amount: f64,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<LedgerTrade, PortfolioError> {
        let mut next = self.ledger.clone();
        let trade = next.sell(asset_id, asset_amount, price, now)?;
        self.commit(next)?;
        Ok(trade)
    }

    pub fn reset(&mut self, starting_balance: f64) -> Result<(), PortfolioError> {
        let mut next = self.ledger.clone();
        next.reset(starting_balance)?;
        self.commit(next)
    }

    fn commit(&mut self, next: Ledger) -> Result<(), PortfolioError> {
        if let Err(e) = self.persist(&next, self.enabled) {
            warn!("Portfolio mutation discarded, snapshot write failed: {}", e);
            return Err(e);
        }
        self.ledger = next;
        Ok(())
    }

    fn persist(&self, ledger: &Ledger, enabled: bool) -> Result<(), PortfolioError> {
        self.store
            .save_snapshot(&PortfolioSnapshot::capture(enabled, ledger))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::persistence::{JsonFileStore, MemoryStore};
    use tempfile::tempdir;

    #[test]
    fn test_fresh_portfolio_is_persisted() {
        let store: MemoryStore<PortfolioSnapshot> = MemoryStore::new();
        let portfolio = PaperPortfolio::load_or_default(Arc::new(store.clone()), 2.0).unwrap();
        assert_eq!(portfolio.cash(), 2.0);
        assert!(portfolio.is_enabled());
        assert_eq!(store.snapshot().unwrap().cash_balance, 2.0);
    }

    #[test]
    fn test_write_through_on_every_mutation() {
        let store: MemoryStore<PortfolioSnapshot> = MemoryStore::new();
        let mut portfolio = PaperPortfolio::load_or_default(Arc::new(store.clone()), 1.0).unwrap();

        portfolio.buy("X", None, 0.1, 0.001, Utc::now()).unwrap();
        portfolio.sell("X", 50.0, 0.003, Utc::now()).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.trade_history.len(), 2);
        assert_eq!(store.save_count(), 3);
    }

    #[test]
    fn test_persist_failure_leaves_memory_unchanged() {
        let store: MemoryStore<PortfolioSnapshot> = MemoryStore::new();
        let mut portfolio = PaperPortfolio::load_or_default(Arc::new(store.clone()), 1.0).unwrap();
        portfolio.buy("X", None, 0.1, 0.001, Utc::now()).unwrap();
        let before = portfolio.ledger().clone();

        store.set_fail_writes(true);
        let err = portfolio.buy("X", None, 0.2, 0.002, Utc::now()).unwrap_err();
        assert!(matches!(err, PortfolioError::Persist(_)));
        assert_eq!(portfolio.ledger(), &before);

        assert!(portfolio.reset(10.0).is_err());
        assert_eq!(portfolio.ledger(), &before);
    }

    #[test]
    fn test_ledger_error_skips_write() {
        let store: MemoryStore<PortfolioSnapshot> = MemoryStore::new();
        let mut portfolio = PaperPortfolio::load_or_default(Arc::new(store.clone()), 1.0).unwrap();
        let saves = store.save_count();

        let err = portfolio.buy("X", None, 5.0, 0.001, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            PortfolioError::Ledger(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(store.save_count(), saves);
    }

    #[test]
    fn test_restart_restores_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portfolio.json");

        {
            let store: Arc<JsonFileStore<PortfolioSnapshot>> = Arc::new(JsonFileStore::new(&path));
            let mut portfolio = PaperPortfolio::load_or_default(store, 1.0).unwrap();
            portfolio.buy("X", Some("XXX"), 0.2, 0.002, Utc::now()).unwrap();
            portfolio.set_enabled(false).unwrap();
        }

        let store: Arc<JsonFileStore<PortfolioSnapshot>> = Arc::new(JsonFileStore::new(&path));
        // Starting balance is ignored once a snapshot exists
        let portfolio = PaperPortfolio::load_or_default(store, 50.0).unwrap();
        assert!(!portfolio.is_enabled());
        assert_eq!(portfolio.ledger().history().len(), 1);
        assert!((portfolio.cash() - 0.8).abs() < 1e-9);
        assert!(portfolio.ledger().position("X").is_some());
    }
}
