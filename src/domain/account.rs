//! Tracked Accounts and Chain Data
//!
//! Value types describing the accounts we watch and the transaction data the
//! data source hands back for them. Amounts are in SOL.

use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of signatures remembered per account
pub const DEFAULT_SEEN_CAPACITY: usize = 512;

/// An account the monitor polls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedAccount {
    /// Base58 account address
    pub address: String,
    /// Display name used in alerts
    pub name: String,
    /// Cosmetic tag shown next to the name
    #[serde(default)]
    pub emoji: Option<String>,
}

impl TrackedAccount {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            emoji: None,
        }
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    /// Name with the emoji prefix, if any
    pub fn label(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{} {}", emoji, self.name),
            None => self.name.clone(),
        }
    }

    /// Shortened address for log lines
    pub fn short_address(&self) -> &str {
        super::abbreviate(&self.address, 8)
    }
}

/// Marker of the newest transaction processed for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCursor {
    pub signature: String,
    pub slot: u64,
}

/// A transaction signature as listed by the data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub signature: String,
    pub slot: u64,
    /// Unix seconds, when the cluster reports it
    #[serde(default)]
    pub block_time: Option<i64>,
}

impl TransactionRef {
    pub fn new(signature: impl Into<String>, slot: u64) -> Self {
        Self {
            signature: signature.into(),
            slot,
            block_time: None,
        }
    }

    pub fn cursor(&self) -> TransactionCursor {
        TransactionCursor {
            signature: self.signature.clone(),
            slot: self.slot,
        }
    }
}

/// A non-native asset movement inside a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTransfer {
    /// Mint address
    pub asset_id: String,
    /// Symbol if the source could resolve it
    #[serde(default)]
    pub symbol: Option<String>,
    /// Owner whose balance changed
    pub owner: String,
    /// Signed UI amount (positive = received)
    pub amount: f64,
}

/// Detail of a single transaction, reduced to what classification needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    pub success: bool,
    /// Fee paid in SOL
    pub fee: f64,
    /// Net SOL delta per address
    pub balance_deltas: BTreeMap<String, f64>,
    #[serde(default)]
    pub asset_transfers: Vec<AssetTransfer>,
}

impl TransactionDetail {
    /// Net SOL delta for `address`, zero when the address is untouched
    pub fn net_delta(&self, address: &str) -> f64 {
        self.balance_deltas.get(address).copied().unwrap_or(0.0)
    }

    /// Asset transfers whose owner is `address`
    pub fn asset_transfers_for(&self, address: &str) -> Vec<AssetTransfer> {
        self.asset_transfers
            .iter()
            .filter(|t| t.owner == address && t.amount != 0.0)
            .cloned()
            .collect()
    }

    /// Block time as a UTC timestamp
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.block_time
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }
}

/// Current state of an account as fetched in one poll
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub address: String,
    /// Balance in SOL
    pub balance: f64,
    /// New transactions since the cursor, oldest first
    pub transactions: Vec<TransactionRef>,
}

/// Per-account progress that survives restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountCursorState {
    #[serde(default)]
    pub last_balance: Option<f64>,
    #[serde(default)]
    pub cursor: Option<TransactionCursor>,
    /// Recently processed signatures, oldest first
    #[serde(default)]
    pub seen: VecDeque<String>,
    /// Polls on which a signature's detail could not be found
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail_misses: BTreeMap<String, u32>,
}

impl AccountCursorState {
    /// True until the first successful poll has set a baseline
    pub fn is_baseline(&self) -> bool {
        self.cursor.is_none() && self.last_balance.is_none()
    }

    pub fn has_seen(&self, signature: &str) -> bool {
        self.seen.iter().any(|s| s == signature)
    }

    /// Record a signature, evicting the oldest beyond `capacity`
    pub fn mark_seen(&mut self, signature: &str, capacity: usize) {
        if self.has_seen(signature) {
            return;
        }
        self.seen.push_back(signature.to_string());
        while self.seen.len() > capacity.max(1) {
            self.seen.pop_front();
        }
    }

    /// Advance the cursor, never moving it backwards in slot order
    pub fn advance_cursor(&mut self, tx: &TransactionRef) {
        let newer = self.cursor.as_ref().map_or(true, |c| tx.slot >= c.slot);
        if newer {
            self.cursor = Some(tx.cursor());
        }
    }

    /// Count another failed detail lookup for `signature`; returns the total
    pub fn record_detail_miss(&mut self, signature: &str) -> u32 {
        let misses = self.detail_misses.entry(signature.to_string()).or_insert(0);
        *misses += 1;
        *misses
    }

    pub fn misses_for(&self, signature: &str) -> u32 {
        self.detail_misses.get(signature).copied().unwrap_or(0)
    }

    /// Set of seen signatures, for bulk lookups
    pub fn seen_set(&self) -> HashSet<&str> {
        self.seen.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail() -> TransactionDetail {
        let mut deltas = BTreeMap::new();
        deltas.insert("whale".to_string(), -3.5);
        deltas.insert("other".to_string(), 3.5);
        TransactionDetail {
            signature: "sig1".to_string(),
            slot: 10,
            block_time: Some(1_700_000_000),
            success: true,
            fee: 0.000005,
            balance_deltas: deltas,
            asset_transfers: vec![
                AssetTransfer {
                    asset_id: "mintA".to_string(),
                    symbol: Some("AAA".to_string()),
                    owner: "whale".to_string(),
                    amount: 1000.0,
                },
                AssetTransfer {
                    asset_id: "mintA".to_string(),
                    symbol: Some("AAA".to_string()),
                    owner: "other".to_string(),
                    amount: -1000.0,
                },
            ],
        }
    }

    #[test]
    fn test_net_delta_lookup() {
        let d = detail();
        assert_eq!(d.net_delta("whale"), -3.5);
        assert_eq!(d.net_delta("nobody"), 0.0);
    }

    #[test]
    fn test_asset_transfers_filtered_by_owner() {
        let d = detail();
        let transfers = d.asset_transfers_for("whale");
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, 1000.0);
        assert!(d.asset_transfers_for("nobody").is_empty());
    }

    #[test]
    fn test_label_with_emoji() {
        let account = TrackedAccount::new("addr", "Whale").with_emoji("🐋");
        assert_eq!(account.label(), "🐋 Whale");
        assert_eq!(TrackedAccount::new("addr", "Plain").label(), "Plain");
    }

    #[test]
    fn test_seen_set_is_bounded() {
        let mut state = AccountCursorState::default();
        for i in 0..5 {
            state.mark_seen(&format!("sig{}", i), 3);
        }
        assert_eq!(state.seen.len(), 3);
        assert!(!state.has_seen("sig0"));
        assert!(state.has_seen("sig4"));

        // Re-marking does not duplicate
        state.mark_seen("sig4", 3);
        assert_eq!(state.seen.len(), 3);
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let mut state = AccountCursorState::default();
        assert!(state.is_baseline());

        state.advance_cursor(&TransactionRef::new("b", 20));
        state.advance_cursor(&TransactionRef::new("a", 10));
        assert_eq!(state.cursor.as_ref().unwrap().signature, "b");

        state.advance_cursor(&TransactionRef::new("c", 30));
        assert_eq!(state.cursor.unwrap().slot, 30);
    }
}
