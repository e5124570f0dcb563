use serde::{Deserialize, Serialize};
use std::fmt;

use super::alert::AlertKind;
use super::guardrails::GuardrailViolation;

/// Which execution path an intent is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Simulated ledger
    Paper,
    /// Signed on-chain transactions
    Real,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Paper => write!(f, "PAPER"),
            ExecutionMode::Real => write!(f, "REAL"),
        }
    }
}

/// Kind of trade a strategy asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    /// Send SOL to `recipient`
    Send { recipient: String },
    /// Spend SOL on the asset
    Buy,
    /// Sell asset units for SOL
    Sell,
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::Send { recipient } => write!(f, "SEND->{}", super::abbreviate(recipient, 8)),
            TradeKind::Buy => write!(f, "BUY"),
            TradeKind::Sell => write!(f, "SELL"),
        }
    }
}

/// A proposed trade, before guardrail validation
///
/// `amount` is in SOL for Buy and Send, and in asset units for Sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub kind: TradeKind,
    pub asset_id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub amount: f64,
    /// SOL per unit, if the strategy has one
    #[serde(default)]
    pub price_hint: Option<f64>,
}

impl TradeIntent {
    pub fn buy(asset_id: impl Into<String>, sol_amount: f64) -> Self {
        Self {
            kind: TradeKind::Buy,
            asset_id: asset_id.into(),
            symbol: None,
            amount: sol_amount,
            price_hint: None,
        }
    }

    pub fn sell(asset_id: impl Into<String>, units: f64) -> Self {
        Self {
            kind: TradeKind::Sell,
            asset_id: asset_id.into(),
            symbol: None,
            amount: units,
            price_hint: None,
        }
    }

    /// Send native SOL
    pub fn send(recipient: impl Into<String>, sol_amount: f64) -> Self {
        Self {
            kind: TradeKind::Send {
                recipient: recipient.into(),
            },
            asset_id: crate::domain::NATIVE_MINT.to_string(),
            symbol: Some("SOL".to_string()),
            amount: sol_amount,
            price_hint: None,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_price_hint(mut self, price: f64) -> Self {
        self.price_hint = Some(price);
        self
    }

    /// True if executing this intent draws down SOL
    pub fn consumes_cash(&self) -> bool {
        matches!(self.kind, TradeKind::Buy | TradeKind::Send { .. })
    }

    /// SOL value of the intent; None for a sell that has not been priced
    pub fn notional(&self) -> Option<f64> {
        match self.kind {
            TradeKind::Buy | TradeKind::Send { .. } => Some(self.amount),
            TradeKind::Sell => self.price_hint.map(|p| self.amount * p),
        }
    }
}

impl fmt::Display for TradeIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .symbol
            .clone()
            .unwrap_or_else(|| super::abbreviate(&self.asset_id, 8).to_string());
        match self.kind {
            TradeKind::Sell => write!(f, "{} {} {}", self.kind, self.amount, name),
            _ => write!(f, "{} {:.4} SOL of {}", self.kind, self.amount, name),
        }
    }
}

/// Where to find the executed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeReference {
    /// On-chain transaction signature
    Signature(String),
    /// Paper ledger trade id
    Ledger(u64),
}

/// Outcome of one executor call, identical in shape for both modes
///
/// Buys: `executed_amount` is SOL spent, `resulting_asset_amount` units received.
/// Sells: `executed_amount` is units sold, `resulting_asset_amount` SOL received.
/// Sends: both are the SOL sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub mode: ExecutionMode,
    pub success: bool,
    pub executed_amount: f64,
    pub resulting_asset_amount: f64,
    #[serde(default)]
    pub reference: Option<TradeReference>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TradeResult {
    pub fn success(
        mode: ExecutionMode,
        executed_amount: f64,
        resulting_asset_amount: f64,
        reference: TradeReference,
    ) -> Self {
        Self {
            mode,
            success: true,
            executed_amount,
            resulting_asset_amount,
            reference: Some(reference),
            error: None,
        }
    }

    pub fn failure(mode: ExecutionMode, error: impl ToString) -> Self {
        Self {
            mode,
            success: false,
            executed_amount: 0.0,
            resulting_asset_amount: 0.0,
            reference: None,
            error: Some(error.to_string()),
        }
    }
}

/// What happened to one intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Executed(TradeResult),
    Failed(TradeResult),
    /// Blocked before reaching an executor
    Rejected(GuardrailViolation),
}

impl TradeOutcome {
    pub fn from_result(result: TradeResult) -> Self {
        if result.success {
            TradeOutcome::Executed(result)
        } else {
            TradeOutcome::Failed(result)
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, TradeOutcome::Executed(_))
    }
}

/// Full record of one intent, enough to reconstruct what was attempted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReport {
    pub strategy: String,
    pub alert_signature: String,
    pub alert_kind: AlertKind,
    pub intent: TradeIntent,
    pub mode: ExecutionMode,
    pub outcome: TradeOutcome,
}

impl fmt::Display for TradeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.outcome {
            TradeOutcome::Executed(_) => "EXECUTED".to_string(),
            TradeOutcome::Failed(r) => format!(
                "FAILED ({})",
                r.error.as_deref().unwrap_or("unknown error")
            ),
            TradeOutcome::Rejected(v) => format!("REJECTED ({})", v),
        };
        write!(
            f,
            "[{}] {} on {} ({}): {} -> {}",
            self.mode,
            self.strategy,
            self.alert_kind,
            super::abbreviate(&self.alert_signature, 8),
            self.intent,
            status
        )
    }
}
