//! Scripted port implementations for tests and dry runs
//!
//! Each mock shares its state behind `Arc<Mutex<..>>`, so a test can keep a
//! clone, hand another to the code under test, and keep scripting it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::data_source::{AccountDataSource, DataSourceError};
use super::execution::{AccountExecutor, ExecutionError, SendReceipt, SwapReceipt};
use super::price::{PriceError, PriceLookup};
use crate::domain::{AssetTransfer, TransactionCursor, TransactionDetail, TransactionRef};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct ChainState {
    balances: HashMap<String, f64>,
    /// Per-address history, oldest first
    history: HashMap<String, Vec<TransactionRef>>,
    details: HashMap<String, TransactionDetail>,
    detail_errors: HashMap<String, DataSourceError>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    next_slot: u64,
}

/// Scripted chain: balances, per-account history and transaction details
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    state: Arc<Mutex<ChainState>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a balance
    pub fn with_balance(self, address: &str, balance: f64) -> Self {
        self.set_balance(address, balance);
        self
    }

    pub fn set_balance(&self, address: &str, balance: f64) {
        lock(&self.state).balances.insert(address.to_string(), balance);
    }

    /// Append a native transfer touching `address` with the given SOL delta
    ///
    /// The counterparty receives the opposite delta. The balance of `address`
    /// moves by `delta` as well.
    pub fn push_transfer(&self, address: &str, signature: &str, delta: f64) -> TransactionRef {
        let mut deltas = BTreeMap::new();
        deltas.insert(address.to_string(), delta);
        deltas.insert(format!("counterparty-{}", signature), -delta);
        self.push_transaction(address, signature, deltas, Vec::new())
    }

    /// Append a transaction to `address`'s history
    pub fn push_transaction(
        &self,
        address: &str,
        signature: &str,
        balance_deltas: BTreeMap<String, f64>,
        asset_transfers: Vec<AssetTransfer>,
    ) -> TransactionRef {
        let mut state = lock(&self.state);
        state.next_slot += 1;
        let slot = state.next_slot;

        if let Some(delta) = balance_deltas.get(address) {
            *state.balances.entry(address.to_string()).or_insert(0.0) += delta;
        }

        let tx_ref = TransactionRef {
            signature: signature.to_string(),
            slot,
            block_time: Some(1_700_000_000 + slot as i64),
        };
        state.details.insert(
            signature.to_string(),
            TransactionDetail {
                signature: signature.to_string(),
                slot,
                block_time: tx_ref.block_time,
                success: true,
                fee: 0.000005,
                balance_deltas,
                asset_transfers,
            },
        );
        state
            .history
            .entry(address.to_string())
            .or_default()
            .push(tx_ref.clone());
        tx_ref
    }

    /// Replace the stored detail for a signature
    pub fn set_detail(&self, detail: TransactionDetail) {
        lock(&self.state)
            .details
            .insert(detail.signature.clone(), detail);
    }

    /// Make detail lookups for `signature` fail with `error` until cleared
    pub fn set_detail_error(&self, signature: &str, error: Option<DataSourceError>) {
        let mut state = lock(&self.state);
        match error {
            Some(error) => state.detail_errors.insert(signature.to_string(), error),
            None => state.detail_errors.remove(signature),
        };
    }

    /// Make every call for `address` fail
    pub fn set_failing(&self, address: &str, failing: bool) {
        let mut state = lock(&self.state);
        if failing {
            state.failing.insert(address.to_string());
        } else {
            state.failing.remove(address);
        }
    }

    /// Delay balance responses for `address`
    pub fn set_delay(&self, address: &str, delay: Duration) {
        lock(&self.state).delays.insert(address.to_string(), delay);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of detail fetches for `signature`
    pub fn detail_fetches(&self, signature: &str) -> usize {
        let needle = format!("detail:{}", signature);
        lock(&self.calls).iter().filter(|c| **c == needle).count()
    }

    fn check_failing(&self, address: &str) -> Result<(), DataSourceError> {
        if lock(&self.state).failing.contains(address) {
            return Err(DataSourceError::RpcError(format!("scripted failure for {}", address)));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountDataSource for MockDataSource {
    async fn get_balance(&self, address: &str) -> Result<f64, DataSourceError> {
        lock(&self.calls).push(format!("balance:{}", address));
        let delay = lock(&self.state).delays.get(address).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing(address)?;
        Ok(lock(&self.state).balances.get(address).copied().unwrap_or(0.0))
    }

    async fn get_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRef>, DataSourceError> {
        lock(&self.calls).push(format!("signatures:{}", address));
        self.check_failing(address)?;

        let state = lock(&self.state);
        let history = state.history.get(address).map(Vec::as_slice).unwrap_or(&[]);
        Ok(history[history.len().saturating_sub(limit)..].to_vec())
    }

    async fn get_new_transactions(
        &self,
        address: &str,
        cursor: Option<&TransactionCursor>,
        limit: usize,
    ) -> Result<Vec<TransactionRef>, DataSourceError> {
        lock(&self.calls).push(format!("signatures:{}", address));
        self.check_failing(address)?;

        let state = lock(&self.state);
        let history = state.history.get(address).map(Vec::as_slice).unwrap_or(&[]);
        let start = cursor
            .and_then(|c| history.iter().position(|t| t.signature == c.signature))
            .map_or(0, |i| i + 1);
        let newer = &history[start..];
        Ok(newer[..newer.len().min(limit)].to_vec())
    }

    async fn get_transaction_detail(
        &self,
        signature: &str,
    ) -> Result<TransactionDetail, DataSourceError> {
        lock(&self.calls).push(format!("detail:{}", signature));
        let state = lock(&self.state);
        if let Some(error) = state.detail_errors.get(signature) {
            return Err(error.clone());
        }
        state
            .details
            .get(signature)
            .cloned()
            .ok_or_else(|| DataSourceError::TransactionNotFound(signature.to_string()))
    }
}

/// Fixed price table; unknown assets are unavailable
#[derive(Debug, Clone, Default)]
pub struct MockPriceLookup {
    prices: Arc<Mutex<HashMap<String, f64>>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockPriceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a price for an asset
    pub fn with_price(self, asset_id: &str, price: f64) -> Self {
        self.set_price(asset_id, price);
        self
    }

    /// Builder method to delay every response
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, asset_id: &str, price: f64) {
        lock(&self.prices).insert(asset_id.to_string(), price);
    }

    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl PriceLookup for MockPriceLookup {
    async fn get_price(&self, asset_id: &str) -> Result<f64, PriceError> {
        lock(&self.calls).push(asset_id.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.prices)
            .get(asset_id)
            .copied()
            .ok_or_else(|| PriceError::Unavailable(asset_id.to_string()))
    }
}

/// A call made against [`RecordingExecutor`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    Send { to: String, amount: f64 },
    Swap { input: String, output: String, amount: f64 },
}

/// Account executor that records calls and answers from a script
#[derive(Debug, Clone)]
pub struct RecordingExecutor {
    calls: Arc<Mutex<Vec<ExecutorCall>>>,
    balance: Arc<Mutex<f64>>,
    /// Output units per input unit for swaps
    swap_rate: f64,
    failure: Option<ExecutionError>,
}

impl RecordingExecutor {
    pub fn new(balance: f64) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            balance: Arc::new(Mutex::new(balance)),
            swap_rate: 1.0,
            failure: None,
        }
    }

    pub fn with_swap_rate(mut self, rate: f64) -> Self {
        self.swap_rate = rate;
        self
    }

    /// Builder method to fail every send/swap with `error`
    pub fn failing_with(mut self, error: ExecutionError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn get_calls(&self) -> Vec<ExecutorCall> {
        lock(&self.calls).clone()
    }

    fn signature(&self) -> String {
        format!("mock-sig-{}", lock(&self.calls).len())
    }
}

#[async_trait]
impl AccountExecutor for RecordingExecutor {
    async fn send(&self, to_address: &str, amount: f64) -> Result<SendReceipt, ExecutionError> {
        lock(&self.calls).push(ExecutorCall::Send {
            to: to_address.to_string(),
            amount,
        });
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        *lock(&self.balance) -= amount;
        Ok(SendReceipt {
            success: true,
            signature: self.signature(),
        })
    }

    async fn swap(
        &self,
        input_asset: &str,
        output_asset: &str,
        amount: f64,
    ) -> Result<SwapReceipt, ExecutionError> {
        lock(&self.calls).push(ExecutorCall::Swap {
            input: input_asset.to_string(),
            output: output_asset.to_string(),
            amount,
        });
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(SwapReceipt {
            success: true,
            signature: self.signature(),
            output_amount: amount * self.swap_rate,
        })
    }

    async fn balance(&self) -> Result<f64, ExecutionError> {
        Ok(*lock(&self.balance))
    }
}
