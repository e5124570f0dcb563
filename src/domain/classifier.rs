//! Alert Classification
//!
//! Turns one transaction touching a tracked account into zero or more alerts.
//! Rules are applied independently; emission order is
//! LargeTransfer, Inbound/Outbound, AssetTransfer, BalanceChange.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::{TrackedAccount, TransactionDetail};
use super::alert::{Alert, AlertKind};

/// Default large-transfer threshold in SOL
pub const DEFAULT_LARGE_TRANSFER_THRESHOLD: f64 = 10.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("Transaction detail has no signature")]
    MissingSignature,

    #[error("Non-finite balance delta for {address} in {signature}")]
    InvalidDelta { signature: String, address: String },

    #[error("Non-finite fee in {0}")]
    InvalidFee(String),

    #[error("Non-finite asset amount for {asset_id} in {signature}")]
    InvalidAssetAmount { signature: String, asset_id: String },

    #[error("Unreadable transaction detail for {signature}: {reason}")]
    UnreadableDetail { signature: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Net delta magnitude (SOL) at or above which LargeTransfer fires
    pub large_transfer_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            large_transfer_threshold: DEFAULT_LARGE_TRANSFER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertClassifier {
    config: ClassifierConfig,
}

impl AlertClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify `detail` from the point of view of `account`
    pub fn classify(
        &self,
        account: &TrackedAccount,
        detail: &TransactionDetail,
    ) -> Result<Vec<Alert>, ClassificationError> {
        validate(detail)?;

        let net_delta = detail.net_delta(&account.address);
        let asset_transfers = detail.asset_transfers_for(&account.address);
        let timestamp = detail.timestamp().unwrap_or_else(Utc::now);

        let build = |kind: AlertKind, transfers| {
            Alert::new(kind, account.clone(), detail.clone(), transfers, timestamp)
        };

        let mut alerts = Vec::new();

        if net_delta != 0.0 && net_delta.abs() >= self.config.large_transfer_threshold {
            alerts.push(build(AlertKind::LargeTransfer, Vec::new()));
        }

        if net_delta > 0.0 {
            alerts.push(build(AlertKind::Inbound, Vec::new()));
        } else if net_delta < 0.0 {
            alerts.push(build(AlertKind::Outbound, Vec::new()));
        }

        if !asset_transfers.is_empty() {
            alerts.push(build(AlertKind::AssetTransfer, asset_transfers));
        }

        if net_delta != 0.0 {
            alerts.push(build(AlertKind::BalanceChange, Vec::new()));
        }

        tracing::debug!(
            "Classified {} for {}: {} alert(s), delta {:+.6} SOL",
            detail.signature,
            account.name,
            alerts.len(),
            net_delta
        );

        Ok(alerts)
    }
}

fn validate(detail: &TransactionDetail) -> Result<(), ClassificationError> {
    if detail.signature.trim().is_empty() {
        return Err(ClassificationError::MissingSignature);
    }
    if !detail.fee.is_finite() {
        return Err(ClassificationError::InvalidFee(detail.signature.clone()));
    }
    if let Some((address, _)) = detail.balance_deltas.iter().find(|(_, d)| !d.is_finite()) {
        return Err(ClassificationError::InvalidDelta {
            signature: detail.signature.clone(),
            address: address.clone(),
        });
    }
    if let Some(t) = detail.asset_transfers.iter().find(|t| !t.amount.is_finite()) {
        return Err(ClassificationError::InvalidAssetAmount {
            signature: detail.signature.clone(),
            asset_id: t.asset_id.clone(),
        });
    }
    Ok(())
}
