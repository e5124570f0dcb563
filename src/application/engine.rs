//! Strategy Engine
//!
//! Runs every registered strategy against each alert, validates the
//! resulting intents against the guardrails and dispatches the survivors to
//! the executor selected by the current mode. Exactly one report per intent.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::events::EventBus;
use super::executor::{ExecutorSet, ModeSwitch};
use crate::domain::{
    Alert, ExecutionMode, GuardrailConfig, GuardrailViolation, Guardrails, TradeIntent,
    TradeOutcome, TradeReport, TradeResult,
};
use crate::ports::PriceLookup;
use crate::strategy::{Registration, Strategy, StrategyRegistry};

/// Default bound on pricing an unpriced sell
pub const DEFAULT_SELL_PRICE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct StrategyEngine {
    registry: StrategyRegistry,
    guardrails: Guardrails,
    executors: ExecutorSet,
    mode: ModeSwitch,
    events: Option<EventBus>,
    prices: Option<Arc<dyn PriceLookup>>,
    price_timeout: Duration,
}

impl StrategyEngine {
    pub fn new(guardrails: GuardrailConfig, executors: ExecutorSet, mode: ModeSwitch) -> Self {
        Self {
            registry: StrategyRegistry::new(),
            guardrails: Guardrails::new(guardrails),
            executors,
            mode,
            events: None,
            prices: None,
            price_timeout: DEFAULT_SELL_PRICE_TIMEOUT,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Price source for sells that arrive without a price hint
    pub fn with_price_lookup(mut self, prices: Arc<dyn PriceLookup>, timeout: Duration) -> Self {
        self.prices = Some(prices);
        self.price_timeout = timeout;
        self
    }

    pub fn register(&mut self, strategy: Strategy) -> Registration {
        self.registry.register(strategy)
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.registry.unregister(name).is_some()
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn mode_switch(&self) -> &ModeSwitch {
        &self.mode
    }

    pub fn guardrails(&self) -> &Guardrails {
        &self.guardrails
    }

    /// Evaluate `alert` against every strategy, in registration order
    pub async fn on_alert(&mut self, alert: &Alert) -> Vec<TradeReport> {
        let candidates = self.registry.evaluate(alert);
        let mut reports = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let intent = self.price_sell(candidate.intent).await;
            let mode = self.mode.get().await;
            let outcome = self.dispatch(&intent, mode).await;

            let report = TradeReport {
                strategy: candidate.strategy,
                alert_signature: alert.signature().to_string(),
                alert_kind: alert.kind(),
                intent,
                mode,
                outcome,
            };

            match &report.outcome {
                TradeOutcome::Executed(_) => info!("{}", report),
                _ => warn!("{}", report),
            }
            if let Some(events) = &self.events {
                events.publish_trade(&report);
            }
            reports.push(report);
        }

        reports
    }

    /// Attach a looked-up price to a sell with no hint; unpriced sells are
    /// rejected by the guardrails
    async fn price_sell(&self, intent: TradeIntent) -> TradeIntent {
        if intent.notional().is_some() {
            return intent;
        }
        let Some(prices) = &self.prices else {
            return intent;
        };
        match tokio::time::timeout(self.price_timeout, prices.get_price(&intent.asset_id)).await {
            Ok(Ok(price)) if price.is_finite() && price > 0.0 => {
                debug!("Priced sell of {} at {} SOL", intent.asset_id, price);
                intent.with_price_hint(price)
            }
            Ok(Ok(price)) => {
                warn!("Ignoring invalid price {} for {}", price, intent.asset_id);
                intent
            }
            Ok(Err(e)) => {
                warn!("Price lookup failed for {}: {}", intent.asset_id, e);
                intent
            }
            Err(_) => {
                warn!("Price lookup for {} timed out", intent.asset_id);
                intent
            }
        }
    }

    async fn dispatch(&mut self, intent: &TradeIntent, mode: ExecutionMode) -> TradeOutcome {
        let Some(executor) = self.executors.get(mode) else {
            return TradeOutcome::Failed(TradeResult::failure(
                mode,
                format!("no {} executor configured", mode),
            ));
        };

        let balance = match executor.available_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                return TradeOutcome::Rejected(GuardrailViolation::BalanceUnavailable(
                    e.to_string(),
                ))
            }
        };

        if let Err(violation) = self.guardrails.check(intent, balance, Utc::now()) {
            return TradeOutcome::Rejected(violation);
        }

        let result = executor.execute(intent).await;
        if result.success {
            if let Some(notional) = intent.notional() {
                self.guardrails.record_execution(notional, Utc::now());
            }
        }
        TradeOutcome::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::executor::{PaperExecutor, RealExecutor};
    use crate::domain::{
        AlertKind, MemoryStore, PaperPortfolio, PortfolioSnapshot, TrackedAccount,
        TransactionDetail,
    };
    use crate::ports::mocks::{ExecutorCall, MockPriceLookup, RecordingExecutor};
    use std::collections::BTreeMap;
    use tokio::sync::Mutex;

    fn alert(kind: AlertKind, delta: f64) -> Alert {
        let mut deltas = BTreeMap::new();
        deltas.insert("whale".to_string(), delta);
        let detail = TransactionDetail {
            signature: "sigW".to_string(),
            slot: 7,
            block_time: None,
            success: true,
            fee: 0.0,
            balance_deltas: deltas,
            asset_transfers: Vec::new(),
        };
        Alert::new(kind, TrackedAccount::new("whale", "Whale"), detail, Vec::new(), Utc::now())
    }

    fn paper_set(cash: f64) -> (ExecutorSet, Arc<Mutex<PaperPortfolio>>) {
        let store: MemoryStore<PortfolioSnapshot> = MemoryStore::new();
        let portfolio = Arc::new(Mutex::new(
            PaperPortfolio::load_or_default(Arc::new(store), cash).unwrap(),
        ));
        let prices = MockPriceLookup::new().with_price("mintA", 0.01);
        let paper = PaperExecutor::new(portfolio.clone()).with_price_lookup(Arc::new(prices));
        (ExecutorSet::new(Arc::new(paper)), portfolio)
    }

    fn limits() -> GuardrailConfig {
        GuardrailConfig {
            max_trade_amount: 1.0,
            min_reserve_balance: 0.1,
            daily_volume_cap: 1.5,
        }
    }

    fn buyer(name: &str, amount: f64) -> Strategy {
        Strategy::new(name, |_| true, move |_| Some(TradeIntent::buy("mintA", amount)))
    }

    #[tokio::test]
    async fn test_every_strategy_gets_a_report() {
        let (executors, portfolio) = paper_set(5.0);
        let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Paper));
        engine.register(buyer("too_big", 2.0));
        engine.register(buyer("ok", 0.5));
        engine.register(Strategy::new("silent", |_| true, |_| None));

        let reports = engine.on_alert(&alert(AlertKind::Inbound, 1.0)).await;
        assert_eq!(reports.len(), 2);

        assert_eq!(reports[0].strategy, "too_big");
        assert!(matches!(
            reports[0].outcome,
            TradeOutcome::Rejected(GuardrailViolation::MaxTradeAmount { .. })
        ));
        assert_eq!(reports[0].intent.amount, 2.0);

        assert_eq!(reports[1].strategy, "ok");
        assert!(reports[1].outcome.is_executed());
        assert_eq!(reports[1].alert_signature, "sigW");
        assert_eq!(reports[1].mode, ExecutionMode::Paper);

        // Only the executed intent touched the ledger
        assert_eq!(portfolio.lock().await.ledger().history().len(), 1);
    }

    #[tokio::test]
    async fn test_daily_cap_counts_only_executions() {
        let (executors, _) = paper_set(5.0);
        let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Paper));
        engine.register(buyer("a", 0.8));
        engine.register(buyer("b", 0.8));

        let reports = engine.on_alert(&alert(AlertKind::Inbound, 1.0)).await;
        assert!(reports[0].outcome.is_executed());
        assert!(matches!(
            reports[1].outcome,
            TradeOutcome::Rejected(GuardrailViolation::DailyVolumeCap { .. })
        ));
        assert!((engine.guardrails().volume_today(Utc::now()) - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failed_execution_is_reported() {
        let (executors, _) = paper_set(5.0);
        let prices = MockPriceLookup::new().with_price("mintA", 0.01);
        let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Paper))
            .with_price_lookup(Arc::new(prices), Duration::from_millis(100));
        engine.register(Strategy::new("seller", |_| true, |_| {
            Some(TradeIntent::sell("mintA", 10.0))
        }));

        let reports = engine.on_alert(&alert(AlertKind::Outbound, -1.0)).await;
        match &reports[0].outcome {
            TradeOutcome::Failed(result) => {
                assert!(result.error.as_deref().unwrap().contains("Insufficient position"))
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert_eq!(engine.guardrails().volume_today(Utc::now()), 0.0);
    }

    #[tokio::test]
    async fn test_unpriced_sell_is_rejected() {
        let (executors, portfolio) = paper_set(5.0);
        let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Paper));
        engine.register(Strategy::new("dump", |_| true, |_| {
            Some(TradeIntent::sell("mintA", 1e9))
        }));

        let reports = engine.on_alert(&alert(AlertKind::Outbound, -1.0)).await;
        assert_eq!(
            reports[0].outcome,
            TradeOutcome::Rejected(GuardrailViolation::PriceUnavailable("mintA".to_string()))
        );
        assert!(portfolio.lock().await.ledger().history().is_empty());
    }

    #[tokio::test]
    async fn test_sell_priced_by_lookup_hits_max_amount() {
        let (executors, _) = paper_set(5.0);
        let prices = MockPriceLookup::new().with_price("mintA", 0.01);
        let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Paper))
            .with_price_lookup(Arc::new(prices), Duration::from_millis(100));
        engine.register(Strategy::new("dump", |_| true, |_| {
            Some(TradeIntent::sell("mintA", 1e9))
        }));

        let reports = engine.on_alert(&alert(AlertKind::Outbound, -1.0)).await;
        assert_eq!(reports[0].intent.price_hint, Some(0.01));
        assert!(matches!(
            reports[0].outcome,
            TradeOutcome::Rejected(GuardrailViolation::MaxTradeAmount { .. })
        ));
    }

    #[tokio::test]
    async fn test_mode_read_per_intent() {
        let (executors, portfolio) = paper_set(5.0);
        let real = RecordingExecutor::new(3.0).with_swap_rate(50.0);
        let executors = executors.with_real(Arc::new(RealExecutor::new(Arc::new(real.clone()))));
        let switch = ModeSwitch::new(ExecutionMode::Paper);
        let mut engine = StrategyEngine::new(limits(), executors, switch.clone());
        engine.register(buyer("copy", 0.25));

        let paper = engine.on_alert(&alert(AlertKind::Inbound, 1.0)).await;
        assert_eq!(paper[0].mode, ExecutionMode::Paper);

        switch.set(ExecutionMode::Real).await;
        let live = engine.on_alert(&alert(AlertKind::Inbound, 1.0)).await;
        assert_eq!(live[0].mode, ExecutionMode::Real);
        assert!(live[0].outcome.is_executed());
        assert_eq!(
            real.get_calls(),
            vec![ExecutorCall::Swap {
                input: crate::domain::NATIVE_MINT.to_string(),
                output: "mintA".to_string(),
                amount: 0.25,
            }]
        );

        // Switching modes did not touch the paper ledger
        assert_eq!(portfolio.lock().await.ledger().history().len(), 1);
    }

    #[tokio::test]
    async fn test_real_mode_without_executor_fails_cleanly() {
        let (executors, _) = paper_set(5.0);
        let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Real));
        engine.register(buyer("copy", 0.25));

        let reports = engine.on_alert(&alert(AlertKind::Inbound, 1.0)).await;
        assert!(matches!(reports[0].outcome, TradeOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_reports_are_broadcast() {
        let (executors, _) = paper_set(5.0);
        let events = EventBus::default();
        let mut trades = events.subscribe_trades();
        let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Paper))
            .with_events(events);
        engine.register(buyer("copy", 0.25));

        engine.on_alert(&alert(AlertKind::Inbound, 1.0)).await;
        let report = trades.recv().await.unwrap();
        assert_eq!(report.strategy, "copy");
    }
}
