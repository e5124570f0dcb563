//! Dual-mode trade execution
//!
//! `PaperExecutor` fills intents against the persistent paper ledger;
//! `RealExecutor` hands them to the wallet's `AccountExecutor`. Both return
//! the same `TradeResult` shape and never return an error past this boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::domain::{
    ExecutionMode, PaperPortfolio, TradeIntent, TradeKind, TradeReference, TradeResult, NATIVE_MINT,
};
use crate::ports::{AccountExecutor, ExecutionError, PriceLookup};

/// Default paper fill price when no lookup or hint is available
pub const DEFAULT_PAPER_PRICE: f64 = 0.000001;

/// Default bound on a paper price lookup
pub const DEFAULT_PRICE_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait TradeExecutor: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// SOL available for cash-consuming trades
    async fn available_balance(&self) -> Result<f64, ExecutionError>;

    async fn execute(&self, intent: &TradeIntent) -> TradeResult;
}

/// Fills against the paper ledger at a looked-up price
pub struct PaperExecutor {
    portfolio: Arc<Mutex<PaperPortfolio>>,
    prices: Option<Arc<dyn PriceLookup>>,
    price_timeout: Duration,
    default_price: f64,
}

impl PaperExecutor {
    pub fn new(portfolio: Arc<Mutex<PaperPortfolio>>) -> Self {
        Self {
            portfolio,
            prices: None,
            price_timeout: DEFAULT_PRICE_TIMEOUT,
            default_price: DEFAULT_PAPER_PRICE,
        }
    }

    pub fn with_price_lookup(mut self, prices: Arc<dyn PriceLookup>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn with_price_timeout(mut self, timeout: Duration) -> Self {
        self.price_timeout = timeout;
        self
    }

    pub fn with_default_price(mut self, price: f64) -> Self {
        self.default_price = price;
        self
    }

    pub fn portfolio(&self) -> Arc<Mutex<PaperPortfolio>> {
        self.portfolio.clone()
    }

    /// Lookup (bounded), then the intent's hint, then the default price
    async fn resolve_price(&self, intent: &TradeIntent) -> f64 {
        let valid = |p: f64| p.is_finite() && p > 0.0;

        if let Some(prices) = &self.prices {
            match tokio::time::timeout(self.price_timeout, prices.get_price(&intent.asset_id)).await
            {
                Ok(Ok(price)) if valid(price) => return price,
                Ok(Ok(price)) => warn!("Ignoring invalid price {} for {}", price, intent.asset_id),
                Ok(Err(e)) => debug!("Price lookup failed for {}: {}", intent.asset_id, e),
                Err(_) => warn!(
                    "Price lookup for {} timed out after {:?}",
                    intent.asset_id, self.price_timeout
                ),
            }
        }

        match intent.price_hint {
            Some(hint) if valid(hint) => hint,
            _ => {
                debug!(
                    "Using default price {} for {}",
                    self.default_price, intent.asset_id
                );
                self.default_price
            }
        }
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Paper
    }

    async fn available_balance(&self) -> Result<f64, ExecutionError> {
        Ok(self.portfolio.lock().await.cash())
    }

    async fn execute(&self, intent: &TradeIntent) -> TradeResult {
        if let TradeKind::Send { .. } = intent.kind {
            return TradeResult::failure(
                ExecutionMode::Paper,
                "send is not supported in paper mode",
            );
        }

        let price = self.resolve_price(intent).await;
        let mut portfolio = self.portfolio.lock().await;
        let now = Utc::now();

        let fill = match intent.kind {
            TradeKind::Sell => portfolio
                .sell(&intent.asset_id, intent.amount, price, now)
                .map(|t| (t.asset_amount, t.cash_amount, t.id)),
            _ => portfolio
                .buy(
                    &intent.asset_id,
                    intent.symbol.as_deref(),
                    intent.amount,
                    price,
                    now,
                )
                .map(|t| (t.cash_amount, t.asset_amount, t.id)),
        };

        match fill {
            Ok((executed, resulting, id)) => TradeResult::success(
                ExecutionMode::Paper,
                executed,
                resulting,
                TradeReference::Ledger(id),
            ),
            Err(e) => {
                warn!("[PAPER] {} failed: {}", intent, e);
                TradeResult::failure(ExecutionMode::Paper, e)
            }
        }
    }
}

/// Submits through the wallet's account executor
pub struct RealExecutor {
    executor: Arc<dyn AccountExecutor>,
}

impl RealExecutor {
    pub fn new(executor: Arc<dyn AccountExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl TradeExecutor for RealExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Real
    }

    async fn available_balance(&self) -> Result<f64, ExecutionError> {
        self.executor.balance().await
    }

    async fn execute(&self, intent: &TradeIntent) -> TradeResult {
        let outcome = match &intent.kind {
            TradeKind::Send { recipient } => self
                .executor
                .send(recipient, intent.amount)
                .await
                .map(|r| (r.success, r.signature, intent.amount)),
            TradeKind::Buy => self
                .executor
                .swap(NATIVE_MINT, &intent.asset_id, intent.amount)
                .await
                .map(|r| (r.success, r.signature, r.output_amount)),
            TradeKind::Sell => self
                .executor
                .swap(&intent.asset_id, NATIVE_MINT, intent.amount)
                .await
                .map(|r| (r.success, r.signature, r.output_amount)),
        };

        match outcome {
            Ok((true, signature, resulting)) => {
                info!("[REAL] {} confirmed: {}", intent, signature);
                TradeResult::success(
                    ExecutionMode::Real,
                    intent.amount,
                    resulting,
                    TradeReference::Signature(signature),
                )
            }
            Ok((false, signature, _)) => {
                warn!("[REAL] {} failed on-chain: {}", intent, signature);
                let mut result = TradeResult::failure(
                    ExecutionMode::Real,
                    format!("transaction {} failed", signature),
                );
                result.reference = Some(TradeReference::Signature(signature));
                result
            }
            Err(e) => {
                warn!("[REAL] {} failed: {}", intent, e);
                TradeResult::failure(ExecutionMode::Real, e)
            }
        }
    }
}

/// Executors by mode; real execution is optional
#[derive(Clone)]
pub struct ExecutorSet {
    paper: Arc<dyn TradeExecutor>,
    real: Option<Arc<dyn TradeExecutor>>,
}

impl ExecutorSet {
    pub fn new(paper: Arc<dyn TradeExecutor>) -> Self {
        Self { paper, real: None }
    }

    pub fn with_real(mut self, real: Arc<dyn TradeExecutor>) -> Self {
        self.real = Some(real);
        self
    }

    pub fn get(&self, mode: ExecutionMode) -> Option<Arc<dyn TradeExecutor>> {
        match mode {
            ExecutionMode::Paper => Some(self.paper.clone()),
            ExecutionMode::Real => self.real.clone(),
        }
    }

    pub fn has_real(&self) -> bool {
        self.real.is_some()
    }
}

/// Shared paper/real selector, read once per intent
#[derive(Debug, Clone)]
pub struct ModeSwitch {
    mode: Arc<RwLock<ExecutionMode>>,
}

impl ModeSwitch {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode: Arc::new(RwLock::new(mode)),
        }
    }

    pub async fn get(&self) -> ExecutionMode {
        *self.mode.read().await
    }

    pub async fn set(&self, mode: ExecutionMode) {
        let mut current = self.mode.write().await;
        if *current != mode {
            info!("Execution mode: {} -> {}", *current, mode);
            *current = mode;
        }
    }
}
