//! Watcher Loop
//!
//! Drives the monitor on a fixed interval and feeds every alert, in publish
//! order, through the strategy engine. One cycle finishes completely before
//! the next poll starts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use super::engine::StrategyEngine;
use super::monitor::Monitor;
use crate::domain::{TradeOutcome, TradeReport};

/// Counters since startup
#[derive(Debug, Clone, Default)]
pub struct WatcherStatus {
    pub is_running: bool,
    pub cycles: u64,
    pub alerts: u64,
    pub executed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub poll_errors: u64,
    pub last_poll: Option<DateTime<Utc>>,
}

/// Output of one tick
#[derive(Debug, Default)]
pub struct TickSummary {
    pub alerts: usize,
    pub reports: Vec<TradeReport>,
    pub poll_errors: usize,
}

#[derive(Clone)]
pub struct Watcher {
    monitor: Arc<Mutex<Monitor>>,
    engine: Arc<Mutex<StrategyEngine>>,
    is_running: Arc<RwLock<bool>>,
    status: Arc<RwLock<WatcherStatus>>,
    poll_interval: Duration,
}

impl Watcher {
    pub fn new(monitor: Monitor, engine: StrategyEngine) -> Self {
        let poll_interval = monitor.config().poll_interval;
        Self {
            monitor: Arc::new(Mutex::new(monitor)),
            engine: Arc::new(Mutex::new(engine)),
            is_running: Arc::new(RwLock::new(false)),
            status: Arc::new(RwLock::new(WatcherStatus::default())),
            poll_interval,
        }
    }

    /// Set custom poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn monitor(&self) -> Arc<Mutex<Monitor>> {
        self.monitor.clone()
    }

    pub fn engine(&self) -> Arc<Mutex<StrategyEngine>> {
        self.engine.clone()
    }

    /// Run until [`Watcher::stop`] is called
    pub async fn run(&self) {
        *self.is_running.write().await = true;

        let accounts = self.monitor.lock().await.accounts().len();
        let strategies = self.engine.lock().await.strategy_names().len();
        tracing::info!(
            "Starting watcher - {} account(s), {} strateg{}, poll interval {:?}",
            accounts,
            strategies,
            if strategies == 1 { "y" } else { "ies" },
            self.poll_interval
        );

        while *self.is_running.read().await {
            let summary = self.tick().await;
            if summary.alerts > 0 || !summary.reports.is_empty() {
                tracing::info!(
                    "Cycle: {} alert(s), {} trade report(s), {} poll error(s)",
                    summary.alerts,
                    summary.reports.len(),
                    summary.poll_errors
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        tracing::info!("Watcher stopped");
    }

    /// Poll once and dispatch every alert to the strategies
    pub async fn tick(&self) -> TickSummary {
        let report = self.monitor.lock().await.poll().await;

        let mut reports = Vec::new();
        {
            let mut engine = self.engine.lock().await;
            for alert in &report.alerts {
                tracing::info!("{}", alert.summary());
                reports.extend(engine.on_alert(alert).await);
            }
        }

        let mut status = self.status.write().await;
        status.cycles += 1;
        status.alerts += report.alerts.len() as u64;
        status.poll_errors += report.errors.len() as u64;
        status.last_poll = Some(Utc::now());
        for r in &reports {
            match r.outcome {
                TradeOutcome::Executed(_) => status.executed += 1,
                TradeOutcome::Failed(_) => status.failed += 1,
                TradeOutcome::Rejected(_) => status.rejected += 1,
            }
        }

        TickSummary {
            alerts: report.alerts.len(),
            reports,
            poll_errors: report.errors.len(),
        }
    }

    /// Stop the loop after the current cycle
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        tracing::info!("Stop signal sent to watcher");
    }

    pub async fn status(&self) -> WatcherStatus {
        let mut status = self.status.read().await.clone();
        status.is_running = *self.is_running.read().await;
        status
    }
}
