//! Alerts
//!
//! Typed, prioritized notifications derived from a classified transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::{AssetTransfer, TrackedAccount, TransactionDetail};

/// Classification of an alert, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    LargeTransfer,
    Inbound,
    Outbound,
    AssetTransfer,
    BalanceChange,
}

impl AlertKind {
    /// Default severity for this kind
    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::LargeTransfer => Severity::Critical,
            AlertKind::Outbound => Severity::High,
            AlertKind::Inbound | AlertKind::AssetTransfer => Severity::Medium,
            AlertKind::BalanceChange => Severity::Low,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::LargeTransfer => write!(f, "LARGE_TRANSFER"),
            AlertKind::Inbound => write!(f, "INBOUND"),
            AlertKind::Outbound => write!(f, "OUTBOUND"),
            AlertKind::AssetTransfer => write!(f, "ASSET_TRANSFER"),
            AlertKind::BalanceChange => write!(f, "BALANCE_CHANGE"),
        }
    }
}

/// Alert priority, lowest first so `Ord` ranks urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A classified account event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    kind: AlertKind,
    severity: Severity,
    account: TrackedAccount,
    transaction: TransactionDetail,
    /// Asset movements touching the account (AssetTransfer alerts only)
    asset_transfers: Vec<AssetTransfer>,
    timestamp: DateTime<Utc>,
    /// Signed net SOL delta for the account
    net_delta: f64,
    /// Absolute SOL magnitude used for thresholds
    amount: f64,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        account: TrackedAccount,
        transaction: TransactionDetail,
        asset_transfers: Vec<AssetTransfer>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let net_delta = transaction.net_delta(&account.address);
        Self {
            kind,
            severity: kind.severity(),
            account,
            transaction,
            asset_transfers,
            timestamp,
            net_delta,
            amount: net_delta.abs(),
        }
    }

    pub fn kind(&self) -> AlertKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn account(&self) -> &TrackedAccount {
        &self.account
    }

    pub fn transaction(&self) -> &TransactionDetail {
        &self.transaction
    }

    pub fn signature(&self) -> &str {
        &self.transaction.signature
    }

    pub fn asset_transfers(&self) -> &[AssetTransfer] {
        &self.asset_transfers
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn net_delta(&self) -> f64 {
        self.net_delta
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn is_inbound(&self) -> bool {
        self.net_delta > 0.0
    }

    /// One-line human summary for logs and notifiers
    pub fn summary(&self) -> String {
        let direction = if self.net_delta >= 0.0 { "+" } else { "" };
        let mut line = format!(
            "[{}] {} {}{:.4} SOL (tx {})",
            self.kind,
            self.account.label(),
            direction,
            self.net_delta,
            super::abbreviate(&self.transaction.signature, 8)
        );
        if !self.asset_transfers.is_empty() {
            let assets: Vec<String> = self
                .asset_transfers
                .iter()
                .map(|t| {
                    let name = t.symbol.clone().unwrap_or_else(|| {
                        super::abbreviate(&t.asset_id, 6).to_string()
                    });
                    format!("{:+} {}", t.amount, name)
                })
                .collect();
            line.push_str(&format!(" | {}", assets.join(", ")));
        }
        if !self.transaction.success {
            line.push_str(" | FAILED");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn tx(delta: f64) -> TransactionDetail {
        let mut deltas = BTreeMap::new();
        deltas.insert("whale".to_string(), delta);
        TransactionDetail {
            signature: "5igSignature".to_string(),
            slot: 1,
            block_time: None,
            success: true,
            fee: 0.000005,
            balance_deltas: deltas,
            asset_transfers: Vec::new(),
        }
    }

    #[test]
    fn test_amount_is_absolute_delta() {
        let alert = Alert::new(
            AlertKind::Outbound,
            TrackedAccount::new("whale", "Whale"),
            tx(-4.2),
            Vec::new(),
            Utc::now(),
        );
        assert_eq!(alert.amount(), 4.2);
        assert_eq!(alert.net_delta(), -4.2);
        assert!(!alert.is_inbound());
        assert_eq!(alert.severity(), Severity::High);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(AlertKind::LargeTransfer.severity(), Severity::Critical);
        assert_eq!(AlertKind::BalanceChange.severity(), Severity::Low);
    }

    #[test]
    fn test_summary_mentions_kind_and_name() {
        let alert = Alert::new(
            AlertKind::Inbound,
            TrackedAccount::new("whale", "Whale"),
            tx(12.0),
            Vec::new(),
            Utc::now(),
        );
        let summary = alert.summary();
        assert!(summary.contains("INBOUND"));
        assert!(summary.contains("Whale"));
        assert!(summary.contains("+12.0000"));
    }
}
