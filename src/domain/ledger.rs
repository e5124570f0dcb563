//! Simulated Portfolio Ledger
//!
//! Cash balance, per-asset positions with weighted-average cost basis,
//! an append-only trade history and aggregate statistics. No I/O.
//!
//! Every operation validates first and mutates last, so a failed Buy/Sell
//! leaves the ledger exactly as it was.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Position remainders below this are treated as fully sold
pub const DUST_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient balance: have {have:.6}, need {need:.6}")]
    InsufficientBalance { have: f64, need: f64 },

    #[error("Insufficient position in {asset_id}: have {have}, need {need}")]
    InsufficientPosition { asset_id: String, have: f64, need: f64 },

    #[error("Amount must be positive and finite, got {0}")]
    InvalidAmount(f64),

    #[error("Price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("Starting balance must be non-negative and finite, got {0}")]
    InvalidStartingBalance(f64),
}

/// An open position in one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub asset_id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    /// Units held
    pub amount: f64,
    /// Weighted-average cost per unit in SOL
    pub avg_cost: f64,
    /// SOL cost basis of the units still held
    pub total_cost_basis: f64,
    pub first_acquired: DateTime<Utc>,
}

impl Position {
    /// Mark-to-market value at `price`
    pub fn value_at(&self, price: f64) -> f64 {
        self.amount * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.value_at(price) - self.total_cost_basis
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// One completed ledger trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTrade {
    pub id: u64,
    pub asset_id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub side: TradeSide,
    /// Asset units bought or sold
    pub asset_amount: f64,
    /// SOL spent (buy) or received (sell)
    pub cash_amount: f64,
    /// Execution price in SOL per unit
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    /// Realized P&L (sells only)
    #[serde(default)]
    pub realized_pnl: Option<f64>,
}

/// Aggregate statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub total_realized_pnl: f64,
    pub starting_balance: f64,
    #[serde(default)]
    pub total_volume: f64,
}

impl LedgerStats {
    fn starting_at(balance: f64) -> Self {
        Self {
            starting_balance: balance,
            ..Self::default()
        }
    }

    /// Win rate as a percentage (0-100) over closed trades
    pub fn win_rate(&self) -> f64 {
        let closed = self.wins + self.losses;
        if closed == 0 {
            return 0.0;
        }
        (self.wins as f64 / closed as f64) * 100.0
    }

    fn record(&mut self, trade: &LedgerTrade) {
        self.total_trades += 1;
        self.total_volume += trade.cash_amount;

        if let Some(pnl) = trade.realized_pnl {
            self.total_realized_pnl += pnl;
            if pnl > 0.0 {
                self.wins += 1;
            } else {
                self.losses += 1;
            }
        }
    }
}

/// Paper portfolio state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    cash: f64,
    positions: BTreeMap<String, Position>,
    history: Vec<LedgerTrade>,
    stats: LedgerStats,
    next_trade_id: u64,
}

impl Ledger {
    /// Create a ledger holding `starting_balance` SOL in cash
    pub fn new(starting_balance: f64) -> Self {
        Self {
            cash: starting_balance.max(0.0),
            positions: BTreeMap::new(),
            history: Vec::new(),
            stats: LedgerStats::starting_at(starting_balance.max(0.0)),
            next_trade_id: 1,
        }
    }

    /// Rebuild a ledger from persisted parts
    pub fn from_parts(
        cash: f64,
        positions: BTreeMap<String, Position>,
        history: Vec<LedgerTrade>,
        stats: LedgerStats,
        next_trade_id: u64,
    ) -> Self {
        let next_trade_id = next_trade_id.max(history.iter().map(|t| t.id + 1).max().unwrap_or(1));
        Self {
            cash,
            positions,
            history,
            stats,
            next_trade_id,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, asset_id: &str) -> Option<&Position> {
        self.positions.get(asset_id)
    }

    pub fn history(&self) -> &[LedgerTrade] {
        &self.history
    }

    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    pub fn next_trade_id(&self) -> u64 {
        self.next_trade_id
    }

    /// Spend `cash_amount` SOL on `asset_id` at `price` SOL per unit
    pub fn buy(
        &mut self,
        asset_id: &str,
        symbol: Option<&str>,
        cash_amount: f64,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<LedgerTrade, LedgerError> {
        if !cash_amount.is_finite() || cash_amount <= 0.0 {
            return Err(LedgerError::InvalidAmount(cash_amount));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::InvalidPrice(price));
        }
        if cash_amount > self.cash {
            return Err(LedgerError::InsufficientBalance {
                have: self.cash,
                need: cash_amount,
            });
        }

        let units = cash_amount / price;
        self.cash -= cash_amount;

        let position = self
            .positions
            .entry(asset_id.to_string())
            .or_insert_with(|| Position {
                asset_id: asset_id.to_string(),
                symbol: symbol.map(str::to_string),
                amount: 0.0,
                avg_cost: 0.0,
                total_cost_basis: 0.0,
                first_acquired: now,
            });

        let new_amount = position.amount + units;
        position.avg_cost = (position.amount * position.avg_cost + units * price) / new_amount;
        position.amount = new_amount;
        position.total_cost_basis += cash_amount;
        if position.symbol.is_none() {
            position.symbol = symbol.map(str::to_string);
        }
        let symbol = position.symbol.clone();

        let trade = self.append(LedgerTrade {
            id: 0,
            asset_id: asset_id.to_string(),
            symbol,
            side: TradeSide::Buy,
            asset_amount: units,
            cash_amount,
            price,
            timestamp: now,
            realized_pnl: None,
        });

        info!(
            "[PAPER] {} {:.6} {} @ {:.9} SOL = {:.4} SOL",
            trade.side,
            units,
            display_name(asset_id, trade.symbol.as_deref()),
            price,
            cash_amount
        );

        Ok(trade)
    }

    /// Sell `asset_amount` units of `asset_id` at `price` SOL per unit
    pub fn sell(
        &mut self,
        asset_id: &str,
        asset_amount: f64,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<LedgerTrade, LedgerError> {
        if !asset_amount.is_finite() || asset_amount <= 0.0 {
            return Err(LedgerError::InvalidAmount(asset_amount));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(LedgerError::InvalidPrice(price));
        }

        let held = self.positions.get(asset_id).map_or(0.0, |p| p.amount);
        if asset_amount > held {
            return Err(LedgerError::InsufficientPosition {
                asset_id: asset_id.to_string(),
                have: held,
                need: asset_amount,
            });
        }

        let Some(position) = self.positions.get_mut(asset_id) else {
            return Err(LedgerError::InsufficientPosition {
                asset_id: asset_id.to_string(),
                have: 0.0,
                need: asset_amount,
            });
        };

        let proceeds = asset_amount * price;
        let cost_of_sold = asset_amount * position.avg_cost;
        let pnl = proceeds - cost_of_sold;

        position.amount -= asset_amount;
        position.total_cost_basis = (position.total_cost_basis - cost_of_sold).max(0.0);
        let symbol = position.symbol.clone();
        let fully_sold = position.amount <= DUST_EPSILON;

        if fully_sold {
            self.positions.remove(asset_id);
        }
        self.cash += proceeds;

        let trade = self.append(LedgerTrade {
            id: 0,
            asset_id: asset_id.to_string(),
            symbol,
            side: TradeSide::Sell,
            asset_amount,
            cash_amount: proceeds,
            price,
            timestamp: now,
            realized_pnl: Some(pnl),
        });

        info!(
            "[PAPER] {} {:.6} {} @ {:.9} SOL = {:.4} SOL | PnL: {:+.4} SOL{}",
            trade.side,
            asset_amount,
            display_name(asset_id, trade.symbol.as_deref()),
            price,
            proceeds,
            pnl,
            if fully_sold { " (closed)" } else { "" }
        );

        Ok(trade)
    }

    /// Start over with `starting_balance` SOL
    pub fn reset(&mut self, starting_balance: f64) -> Result<(), LedgerError> {
        if !starting_balance.is_finite() || starting_balance < 0.0 {
            return Err(LedgerError::InvalidStartingBalance(starting_balance));
        }
        self.cash = starting_balance;
        self.positions.clear();
        self.history.clear();
        self.stats = LedgerStats::starting_at(starting_balance);
        self.next_trade_id = 1;
        info!("Paper ledger reset with {} SOL", starting_balance);
        Ok(())
    }

    /// Cash plus positions marked at `prices`; positions without a price
    /// fall back to cost basis
    pub fn portfolio_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| match prices.get(&p.asset_id) {
                    Some(&price) => p.value_at(price),
                    None => p.total_cost_basis,
                })
                .sum::<f64>()
    }

    /// Return since inception at `prices`, as a percentage
    pub fn return_pct(&self, prices: &HashMap<String, f64>) -> f64 {
        let start = self.stats.starting_balance;
        if start <= 0.0 {
            return 0.0;
        }
        (self.portfolio_value(prices) - start) / start * 100.0
    }

    /// Weighted-average cost of `asset_id` recomputed from trade history
    pub fn replay_avg_cost(&self, asset_id: &str) -> Option<f64> {
        let mut amount = 0.0;
        let mut avg = 0.0;
        for trade in self.history.iter().filter(|t| t.asset_id == asset_id) {
            match trade.side {
                TradeSide::Buy => {
                    let total = amount + trade.asset_amount;
                    avg = (amount * avg + trade.asset_amount * trade.price) / total;
                    amount = total;
                }
                TradeSide::Sell => {
                    amount -= trade.asset_amount;
                    if amount <= DUST_EPSILON {
                        amount = 0.0;
                        avg = 0.0;
                    }
                }
            }
        }
        (amount > 0.0).then_some(avg)
    }

    fn append(&mut self, mut trade: LedgerTrade) -> LedgerTrade {
        trade.id = self.next_trade_id;
        self.next_trade_id += 1;
        self.stats.record(&trade);
        self.history.push(trade.clone());
        trade
    }
}

fn display_name<'a>(asset_id: &'a str, symbol: Option<&'a str>) -> &'a str {
    symbol.unwrap_or_else(|| super::abbreviate(asset_id, 8))
}
