//! Trade Guardrails
//!
//! Pre-execution limits on trade size, remaining balance and daily volume.
//! Checks run in a fixed order and stop at the first violation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::trade::TradeIntent;

/// Default maximum SOL per trade
pub const DEFAULT_MAX_TRADE_AMOUNT: f64 = 0.5;

/// Default SOL kept back for fees
pub const DEFAULT_MIN_RESERVE_BALANCE: f64 = 0.05;

/// Default SOL traded per UTC day
pub const DEFAULT_DAILY_VOLUME_CAP: f64 = 5.0;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum GuardrailViolation {
    #[error("Trade amount {amount:.4} SOL exceeds maximum {max:.4} SOL")]
    MaxTradeAmount { amount: f64, max: f64 },

    #[error("Post-trade balance {remaining:.4} SOL below reserve {reserve:.4} SOL")]
    MinReserveBalance { remaining: f64, reserve: f64 },

    #[error("Daily volume {used:.4} + {amount:.4} SOL exceeds cap {cap:.4} SOL")]
    DailyVolumeCap { used: f64, amount: f64, cap: f64 },

    #[error("Invalid trade amount: {0}")]
    InvalidAmount(f64),

    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),

    #[error("No price for {0}; cannot size the trade in SOL")]
    PriceUnavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub max_trade_amount: f64,
    pub min_reserve_balance: f64,
    pub daily_volume_cap: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_trade_amount: DEFAULT_MAX_TRADE_AMOUNT,
            min_reserve_balance: DEFAULT_MIN_RESERVE_BALANCE,
            daily_volume_cap: DEFAULT_DAILY_VOLUME_CAP,
        }
    }
}

/// Guardrail checker carrying today's executed volume
#[derive(Debug, Clone)]
pub struct Guardrails {
    config: GuardrailConfig,
    day: Option<NaiveDate>,
    volume_today: f64,
}

impl Guardrails {
    pub fn new(config: GuardrailConfig) -> Self {
        Self {
            config,
            day: None,
            volume_today: 0.0,
        }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Volume recorded for the UTC day containing `now`
    pub fn volume_today(&self, now: DateTime<Utc>) -> f64 {
        if self.day == Some(now.date_naive()) {
            self.volume_today
        } else {
            0.0
        }
    }

    /// Validate `intent` against an available SOL `balance`
    pub fn check(
        &self,
        intent: &TradeIntent,
        balance: f64,
        now: DateTime<Utc>,
    ) -> Result<(), GuardrailViolation> {
        if !intent.amount.is_finite() || intent.amount <= 0.0 {
            return Err(GuardrailViolation::InvalidAmount(intent.amount));
        }

        let notional = intent
            .notional()
            .ok_or_else(|| GuardrailViolation::PriceUnavailable(intent.asset_id.clone()))?;

        if notional > self.config.max_trade_amount {
            return Err(GuardrailViolation::MaxTradeAmount {
                amount: notional,
                max: self.config.max_trade_amount,
            });
        }

        if intent.consumes_cash() {
            let remaining = balance - notional;
            if remaining < self.config.min_reserve_balance {
                return Err(GuardrailViolation::MinReserveBalance {
                    remaining,
                    reserve: self.config.min_reserve_balance,
                });
            }
        }

        let used = self.volume_today(now);
        if used + notional > self.config.daily_volume_cap {
            return Err(GuardrailViolation::DailyVolumeCap {
                used,
                amount: notional,
                cap: self.config.daily_volume_cap,
            });
        }

        Ok(())
    }

    /// Count an executed trade toward today's volume
    pub fn record_execution(&mut self, notional: f64, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.day != Some(today) {
            self.day = Some(today);
            self.volume_today = 0.0;
        }
        self.volume_today += notional;
        tracing::debug!(
            "Daily volume now {:.4}/{:.4} SOL",
            self.volume_today,
            self.config.daily_volume_cap
        );
    }
}
