//! Event fan-out
//!
//! Alerts and trade reports are broadcast to any number of subscribers.
//! Publishing never waits: a subscriber that falls behind loses the oldest
//! events (`RecvError::Lagged`) instead of stalling the monitor.

use tokio::sync::broadcast;

use crate::domain::{Alert, TradeReport};

/// Default per-subscriber buffer
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventBus {
    alerts: broadcast::Sender<Alert>,
    trades: broadcast::Sender<TradeReport>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (alerts, _) = broadcast::channel(capacity.max(1));
        let (trades, _) = broadcast::channel(capacity.max(1));
        Self { alerts, trades }
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    pub fn subscribe_trades(&self) -> broadcast::Receiver<TradeReport> {
        self.trades.subscribe()
    }

    pub fn publish_alert(&self, alert: &Alert) {
        // Err only means nobody is listening
        let _ = self.alerts.send(alert.clone());
    }

    pub fn publish_trade(&self, report: &TradeReport) {
        let _ = self.trades.send(report.clone());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertKind, TrackedAccount, TransactionDetail};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn alert(sig: &str) -> Alert {
        let detail = TransactionDetail {
            signature: sig.to_string(),
            slot: 1,
            block_time: None,
            success: true,
            fee: 0.0,
            balance_deltas: BTreeMap::new(),
            asset_transfers: Vec::new(),
        };
        Alert::new(
            AlertKind::BalanceChange,
            TrackedAccount::new("a", "A"),
            detail,
            Vec::new(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish_alert(&alert("s1"));
    }

    #[tokio::test]
    async fn test_each_subscriber_sees_every_alert() {
        let bus = EventBus::default();
        let mut a = bus.subscribe_alerts();
        let mut b = bus.subscribe_alerts();

        bus.publish_alert(&alert("s1"));
        bus.publish_alert(&alert("s2"));

        assert_eq!(a.recv().await.unwrap().signature(), "s1");
        assert_eq!(a.recv().await.unwrap().signature(), "s2");
        assert_eq!(b.recv().await.unwrap().signature(), "s1");
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe_alerts();
        for i in 0..5 {
            bus.publish_alert(&alert(&format!("s{}", i)));
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(slow.recv().await.unwrap().signature(), "s3");
    }
}
