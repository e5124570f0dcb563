//! Watcher Pipeline Integration Tests
//!
//! Drives the full chain with scripted ports:
//! 1. Monitor -> AlertClassifier ordering and dedup (including restarts)
//! 2. StrategyEngine -> Guardrails -> PaperExecutor -> ledger
//! 3. Real mode dispatch through an account executor
//!
//! All tests are deterministic (no network calls).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use tempfile::TempDir;
use tokio::sync::Mutex;

use whale_watcher::application::{
    EventBus, ExecutorSet, ModeSwitch, Monitor, MonitorConfig, PaperExecutor, PollError,
    PollReport, RealExecutor, StrategyEngine, TradeExecutor, Watcher,
};
use whale_watcher::domain::{
    AlertClassifier, AlertKind, AssetTransfer, ClassifierConfig, ExecutionMode, GuardrailConfig,
    GuardrailViolation, JsonFileStore, MemoryStore, MonitorState, PaperPortfolio, PortfolioSnapshot,
    SnapshotStore, TrackedAccount, TradeIntent, TradeOutcome, TradeReference, NATIVE_MINT,
};
use whale_watcher::ports::mocks::{ExecutorCall, MockDataSource, MockPriceLookup, RecordingExecutor};
use whale_watcher::ports::DataSourceError;
use whale_watcher::strategy::{copy_buy, whale_inflow, Strategy};

// ============================================================================
// Test Fixtures
// ============================================================================

const BONK: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

fn whale() -> TrackedAccount {
    TrackedAccount::new("whale", "Whale").with_emoji("🐋")
}

fn monitor(source: &MockDataSource, accounts: Vec<TrackedAccount>) -> Monitor {
    Monitor::new(
        Arc::new(source.clone()),
        AlertClassifier::new(ClassifierConfig {
            large_transfer_threshold: 10.0,
        }),
    )
    .with_accounts(accounts)
}

fn json_portfolio(dir: &TempDir, cash: f64) -> Arc<Mutex<PaperPortfolio>> {
    let store: Arc<JsonFileStore<PortfolioSnapshot>> =
        Arc::new(JsonFileStore::new(dir.path().join("paper_portfolio.json")));
    Arc::new(Mutex::new(PaperPortfolio::load_or_default(store, cash).unwrap()))
}

fn inbound_signatures(report: &PollReport) -> Vec<String> {
    report
        .alerts
        .iter()
        .filter(|a| a.kind() == AlertKind::Inbound)
        .map(|a| a.signature().to_string())
        .collect()
}

fn push_bonk_buy(source: &MockDataSource, signature: &str) {
    let mut deltas = BTreeMap::new();
    deltas.insert("whale".to_string(), -0.5);
    source.push_transaction(
        "whale",
        signature,
        deltas,
        vec![AssetTransfer {
            asset_id: BONK.to_string(),
            symbol: Some("BONK".to_string()),
            owner: "whale".to_string(),
            amount: 5_000.0,
        }],
    );
}

fn limits() -> GuardrailConfig {
    GuardrailConfig {
        max_trade_amount: 1.0,
        min_reserve_balance: 0.1,
        daily_volume_cap: 2.0,
    }
}

fn paper_engine(portfolio: Arc<Mutex<PaperPortfolio>>, prices: MockPriceLookup) -> StrategyEngine {
    let paper = PaperExecutor::new(portfolio)
        .with_price_lookup(Arc::new(prices))
        .with_price_timeout(Duration::from_millis(200));
    StrategyEngine::new(
        limits(),
        ExecutorSet::new(Arc::new(paper)),
        ModeSwitch::new(ExecutionMode::Paper),
    )
}

// ============================================================================
// Monitor -> Classifier
// ============================================================================

#[tokio::test]
async fn test_large_inbound_alert_order() {
    let source = MockDataSource::new().with_balance("whale", 50.0);
    let mut monitor = monitor(&source, vec![whale()]);
    assert!(monitor.poll().await.alerts.is_empty());

    source.push_transfer("whale", "sig-plus-12", 12.0);
    let report = monitor.poll().await;

    let kinds: Vec<AlertKind> = report.alerts.iter().map(|a| a.kind()).collect();
    assert_eq!(
        kinds,
        vec![AlertKind::LargeTransfer, AlertKind::Inbound, AlertKind::BalanceChange]
    );
    assert!(report.alerts.iter().all(|a| a.signature() == "sig-plus-12"));
    assert_relative_eq!(report.alerts[0].net_delta(), 12.0);

    // Quiet afterwards
    assert!(monitor.poll().await.alerts.is_empty());
    assert!(monitor.poll().await.alerts.is_empty());
}

#[tokio::test]
async fn test_restart_never_replays_a_signature() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("monitor_state.json");
    let source = MockDataSource::new().with_balance("whale", 1.0);

    {
        let store: Arc<JsonFileStore<MonitorState>> = Arc::new(JsonFileStore::new(&state_path));
        let mut first = monitor(&source, vec![whale()]).with_store(store).unwrap();
        first.poll().await;
        source.push_transfer("whale", "once", 12.0);
        assert_eq!(first.poll().await.alerts.len(), 3);
    }

    // The data source lists the same signature again after the restart
    source.push_transfer("whale", "once", 12.0);

    let store: Arc<JsonFileStore<MonitorState>> = Arc::new(JsonFileStore::new(&state_path));
    let restored = store.load().unwrap().unwrap();
    assert!(restored.account("whale").unwrap().has_seen("once"));

    let mut second = monitor(&source, vec![whale()]).with_store(store).unwrap();
    let report = second.poll().await;
    assert!(report.alerts.is_empty());
    assert!(report.errors.is_empty());
    assert_eq!(source.detail_fetches("once"), 1);
}

#[tokio::test]
async fn test_burst_beyond_poll_limit_survives_restart() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("monitor_state.json");
    let source = MockDataSource::new().with_balance("whale", 1.0);
    let config = MonitorConfig {
        max_signatures_per_poll: 10,
        ..MonitorConfig::default()
    };

    let mut seen = Vec::new();
    {
        let store: Arc<JsonFileStore<MonitorState>> = Arc::new(JsonFileStore::new(&state_path));
        let mut first = monitor(&source, vec![whale()])
            .with_config(config.clone())
            .with_store(store)
            .unwrap();
        first.poll().await;
        for i in 1..=30 {
            source.push_transfer("whale", &format!("tx{:02}", i), 0.5);
        }
        let report = first.poll().await;
        seen.extend(inbound_signatures(&report));
        assert_eq!(seen.len(), 10);
    }

    let store: Arc<JsonFileStore<MonitorState>> = Arc::new(JsonFileStore::new(&state_path));
    let mut second = monitor(&source, vec![whale()])
        .with_config(config)
        .with_store(store)
        .unwrap();
    for _ in 0..4 {
        let report = second.poll().await;
        assert!(report.errors.is_empty());
        seen.extend(inbound_signatures(&report));
    }

    let expected: Vec<String> = (1..=30).map(|i| format!("tx{:02}", i)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_undecodable_transaction_does_not_stall_copy_trading() {
    let dir = TempDir::new().unwrap();
    let source = MockDataSource::new().with_balance("whale", 3.0);
    let mut monitor = monitor(&source, vec![whale()]);
    monitor.poll().await;

    let prices = MockPriceLookup::new().with_price(BONK, 0.0001);
    let portfolio = json_portfolio(&dir, 2.0);
    let mut engine = paper_engine(portfolio.clone(), prices);
    engine.register(copy_buy("copy", 0.25, vec![]));

    push_bonk_buy(&source, "garbled");
    push_bonk_buy(&source, "readable");
    source.set_detail_error(
        "garbled",
        Some(DataSourceError::ParseError("garbled: missing status meta".to_string())),
    );

    let watcher = Watcher::new(monitor, engine);
    let summary = watcher.tick().await;
    assert_eq!(summary.poll_errors, 1);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].alert_signature, "readable");
    assert!(summary.reports[0].outcome.is_executed());

    let summary = watcher.tick().await;
    assert_eq!(summary.poll_errors, 0);
    assert!(summary.reports.is_empty());
    assert_eq!(source.detail_fetches("garbled"), 1);
    assert_eq!(portfolio.lock().await.ledger().history().len(), 1);
}

#[tokio::test]
async fn test_failed_state_save_never_trades_twice() {
    let dir = TempDir::new().unwrap();
    let source = MockDataSource::new().with_balance("whale", 3.0);
    let store: MemoryStore<MonitorState> = MemoryStore::new();
    let portfolio = json_portfolio(&dir, 2.0);
    let prices = MockPriceLookup::new().with_price(BONK, 0.0001);

    let mut engine = paper_engine(portfolio.clone(), prices);
    engine.register(copy_buy("copy", 0.25, vec![]));

    {
        let mut first = monitor(&source, vec![whale()])
            .with_store(Arc::new(store.clone()))
            .unwrap();
        first.poll().await;

        push_bonk_buy(&source, "swap-once");
        store.set_fail_writes(true);
        let report = first.poll().await;
        assert!(report.alerts.is_empty());
        assert!(report.errors.iter().any(|e| matches!(e, PollError::Persist(_))));
    }

    store.set_fail_writes(false);
    let mut second = monitor(&source, vec![whale()])
        .with_store(Arc::new(store.clone()))
        .unwrap();
    for _ in 0..2 {
        let report = second.poll().await;
        for alert in &report.alerts {
            engine.on_alert(alert).await;
        }
    }

    let portfolio = portfolio.lock().await;
    assert_eq!(portfolio.ledger().history().len(), 1);
    assert_relative_eq!(portfolio.cash(), 1.75);
}

#[tokio::test]
async fn test_failing_account_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let source = MockDataSource::new()
        .with_balance("whale", 1.0)
        .with_balance("flaky", 1.0);
    let monitor = monitor(
        &source,
        vec![TrackedAccount::new("flaky", "Flaky"), whale()],
    );

    let mut engine = paper_engine(json_portfolio(&dir, 5.0), MockPriceLookup::new());
    engine.register(whale_inflow("inflow", BONK, Some("BONK".into()), 0.5));
    let watcher = Watcher::new(monitor, engine);
    watcher.tick().await;

    source.set_failing("flaky", true);
    source.push_transfer("flaky", "lost-for-now", 20.0);
    source.push_transfer("whale", "big-in", 15.0);

    let summary = watcher.tick().await;
    assert_eq!(summary.poll_errors, 1);
    assert_eq!(summary.alerts, 3);
    assert_eq!(summary.reports.len(), 1);
    assert!(summary.reports[0].outcome.is_executed());

    // Flaky account recovers and its transaction is picked up late, not lost
    source.set_failing("flaky", false);
    let summary = watcher.tick().await;
    assert_eq!(summary.poll_errors, 0);
    assert_eq!(summary.alerts, 3);
    assert_eq!(summary.reports.len(), 1);

    let status = watcher.status().await;
    assert_eq!(status.cycles, 3);
    assert_eq!(status.executed, 2);
    assert_eq!(status.poll_errors, 1);
}

// ============================================================================
// Engine -> Guardrails -> Paper ledger
// ============================================================================

#[tokio::test]
async fn test_copy_buy_fills_against_paper_ledger() {
    let dir = TempDir::new().unwrap();
    let source = MockDataSource::new().with_balance("whale", 3.0);
    let events = EventBus::new(16);
    let mut alerts = events.subscribe_alerts();
    let mut trades = events.subscribe_trades();

    let mut monitor = monitor(&source, vec![whale()]).with_events(events.clone());
    monitor.poll().await;

    let portfolio = json_portfolio(&dir, 2.0);
    let prices = MockPriceLookup::new().with_price(BONK, 0.0001);
    let mut engine = paper_engine(portfolio.clone(), prices).with_events(events.clone());
    engine.register(copy_buy("copy", 0.25, vec![]));

    let mut deltas = BTreeMap::new();
    deltas.insert("whale".to_string(), -0.5);
    source.push_transaction(
        "whale",
        "swap-1",
        deltas,
        vec![AssetTransfer {
            asset_id: BONK.to_string(),
            symbol: Some("BONK".to_string()),
            owner: "whale".to_string(),
            amount: 5_000.0,
        }],
    );

    let report = monitor.poll().await;
    let mut reports = Vec::new();
    for alert in &report.alerts {
        reports.extend(engine.on_alert(alert).await);
    }

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].alert_kind, AlertKind::AssetTransfer);
    let TradeOutcome::Executed(result) = &reports[0].outcome else {
        panic!("expected execution, got {:?}", reports[0].outcome);
    };
    assert_eq!(result.mode, ExecutionMode::Paper);
    assert_relative_eq!(result.executed_amount, 0.25);
    assert_relative_eq!(result.resulting_asset_amount, 2_500.0);

    {
        let portfolio = portfolio.lock().await;
        let position = portfolio.ledger().position(BONK).unwrap();
        assert_eq!(position.symbol.as_deref(), Some("BONK"));
        assert_relative_eq!(position.avg_cost, 0.0001);
        assert_relative_eq!(portfolio.cash(), 1.75);
    }

    // Published for subscribers in the same order
    let first = alerts.recv().await.unwrap();
    assert_eq!(first.signature(), "swap-1");
    let published = trades.recv().await.unwrap();
    assert_eq!(published.strategy, "copy");

    // Persisted to disk
    let store: JsonFileStore<PortfolioSnapshot> =
        JsonFileStore::new(dir.path().join("paper_portfolio.json"));
    let snapshot = store.load().unwrap().unwrap();
    assert_eq!(snapshot.trade_history.len(), 1);
    assert_relative_eq!(snapshot.cash_balance, 1.75);
}

#[tokio::test]
async fn test_guardrail_rejections_are_reported_and_leave_ledger_untouched() {
    let dir = TempDir::new().unwrap();
    let portfolio = json_portfolio(&dir, 1.0);
    let mut engine = paper_engine(portfolio.clone(), MockPriceLookup::new());
    engine.register(Strategy::new(
        "oversized",
        |a| a.kind() == AlertKind::Inbound,
        |_| Some(TradeIntent::buy(BONK, 1.5)),
    ));
    engine.register(Strategy::new(
        "drains_reserve",
        |a| a.kind() == AlertKind::Inbound,
        |_| Some(TradeIntent::buy(BONK, 0.95)),
    ));

    let source = MockDataSource::new().with_balance("whale", 1.0);
    let mut monitor = monitor(&source, vec![whale()]);
    monitor.poll().await;
    source.push_transfer("whale", "in", 2.0);

    let report = monitor.poll().await;
    let mut reports = Vec::new();
    for alert in &report.alerts {
        reports.extend(engine.on_alert(alert).await);
    }

    assert_eq!(reports.len(), 2);
    assert!(matches!(
        reports[0].outcome,
        TradeOutcome::Rejected(GuardrailViolation::MaxTradeAmount { .. })
    ));
    assert!(matches!(
        reports[1].outcome,
        TradeOutcome::Rejected(GuardrailViolation::MinReserveBalance { .. })
    ));

    let portfolio = portfolio.lock().await;
    assert_eq!(portfolio.cash(), 1.0);
    assert!(portfolio.ledger().positions().is_empty());
    assert!(portfolio.ledger().history().is_empty());
}

#[tokio::test]
async fn test_reference_ledger_scenario_through_paper_executor() {
    let dir = TempDir::new().unwrap();
    let portfolio = json_portfolio(&dir, 1.0);
    let paper = PaperExecutor::new(portfolio.clone());

    let r1 = paper
        .execute(&TradeIntent::buy("X", 0.1).with_price_hint(0.001))
        .await;
    let r2 = paper
        .execute(&TradeIntent::buy("X", 0.2).with_price_hint(0.002))
        .await;
    let r3 = paper
        .execute(&TradeIntent::sell("X", 50.0).with_price_hint(0.003))
        .await;
    assert!(r1.success && r2.success && r3.success);
    assert_eq!(r3.reference, Some(TradeReference::Ledger(3)));
    assert_relative_eq!(r3.resulting_asset_amount, 0.15, epsilon = 1e-12);

    let portfolio = portfolio.lock().await;
    let ledger = portfolio.ledger();
    assert_relative_eq!(ledger.cash(), 0.85, epsilon = 1e-12);
    let position = ledger.position("X").unwrap();
    assert_relative_eq!(position.amount, 150.0, epsilon = 1e-9);
    assert_relative_eq!(position.avg_cost, 0.0015, epsilon = 1e-12);

    let stats = ledger.stats();
    assert_eq!(stats.total_trades, 3);
    assert_eq!(stats.wins, 1);
    assert_eq!(stats.losses, 0);
    assert_relative_eq!(stats.total_realized_pnl, 0.075, epsilon = 1e-12);
    assert_relative_eq!(
        ledger.history()[2].realized_pnl.unwrap(),
        0.075,
        epsilon = 1e-12
    );
}

// ============================================================================
// Real mode
// ============================================================================

#[tokio::test]
async fn test_mode_switch_routes_to_account_executor() {
    let dir = TempDir::new().unwrap();
    let portfolio = json_portfolio(&dir, 5.0);
    let wallet = RecordingExecutor::new(3.0).with_swap_rate(10_000.0);

    let paper = PaperExecutor::new(portfolio.clone());
    let executors = ExecutorSet::new(Arc::new(paper))
        .with_real(Arc::new(RealExecutor::new(Arc::new(wallet.clone()))));
    let mut engine = StrategyEngine::new(limits(), executors, ModeSwitch::new(ExecutionMode::Paper));
    engine.register(whale_inflow("inflow", BONK, None, 0.4));

    let source = MockDataSource::new().with_balance("whale", 1.0);
    let mut monitor = monitor(&source, vec![whale()]);
    monitor.poll().await;

    source.push_transfer("whale", "first", 11.0);
    let report = monitor.poll().await;
    let large = &report.alerts[0];
    let paper_reports = engine.on_alert(large).await;
    assert_eq!(paper_reports[0].mode, ExecutionMode::Paper);
    assert!(wallet.get_calls().is_empty());

    engine.mode_switch().set(ExecutionMode::Real).await;
    let real_reports = engine.on_alert(large).await;
    assert_eq!(real_reports.len(), 1);
    assert_eq!(real_reports[0].mode, ExecutionMode::Real);
    let TradeOutcome::Executed(result) = &real_reports[0].outcome else {
        panic!("expected execution, got {:?}", real_reports[0].outcome);
    };
    assert_eq!(result.reference, Some(TradeReference::Signature("mock-sig-1".to_string())));
    assert_relative_eq!(result.resulting_asset_amount, 4_000.0);
    assert_eq!(
        wallet.get_calls(),
        vec![ExecutorCall::Swap {
            input: NATIVE_MINT.to_string(),
            output: BONK.to_string(),
            amount: 0.4,
        }]
    );

    // The paper ledger only saw the first fill; both count toward the daily cap
    assert_eq!(portfolio.lock().await.ledger().history().len(), 1);
    assert_relative_eq!(
        engine.guardrails().volume_today(chrono::Utc::now()),
        0.8,
        epsilon = 1e-12
    );
}

#[tokio::test]
async fn test_first_poll_can_classify_history_when_configured() {
    let source = MockDataSource::new();
    source.push_transfer("whale", "historic", 3.0);
    let mut monitor = monitor(&source, vec![whale()]).with_config(MonitorConfig {
        classify_on_first_poll: true,
        ..MonitorConfig::default()
    });

    let report = monitor.poll().await;
    assert_eq!(report.alerts.len(), 2);
    assert_eq!(report.alerts[0].kind(), AlertKind::Inbound);
}
