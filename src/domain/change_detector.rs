//! Change Detection
//!
//! Diffs the persisted state of an account against a freshly fetched snapshot.

use std::collections::HashSet;

use super::account::{AccountCursorState, AccountSnapshot, TransactionRef};

/// Balances closer than this are treated as unchanged
pub const BALANCE_EPSILON: f64 = 1e-9;

/// A raw difference between two observations of an account
#[derive(Debug, Clone, PartialEq)]
pub enum RawDelta {
    /// Balance moved since the last poll
    BalanceChanged {
        previous: f64,
        current: f64,
        delta: f64,
    },
    /// A transaction not yet processed for this account
    NewTransaction(TransactionRef),
}

/// Stateless differ between previous and current account observations
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Produce ordered deltas: a balance change first (if any), then unseen
    /// transactions in the order supplied (chain order, oldest first).
    pub fn detect(&self, previous: &AccountCursorState, current: &AccountSnapshot) -> Vec<RawDelta> {
        let mut deltas = Vec::new();

        if let Some(prev_balance) = previous.last_balance {
            let delta = current.balance - prev_balance;
            if delta.abs() > BALANCE_EPSILON {
                deltas.push(RawDelta::BalanceChanged {
                    previous: prev_balance,
                    current: current.balance,
                    delta,
                });
            }
        }

        let seen = previous.seen_set();
        let mut emitted: HashSet<&str> = HashSet::new();
        for tx in &current.transactions {
            if seen.contains(tx.signature.as_str()) || !emitted.insert(tx.signature.as_str()) {
                continue;
            }
            deltas.push(RawDelta::NewTransaction(tx.clone()));
        }

        deltas
    }
}
