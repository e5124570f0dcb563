//! Domain Layer - Core watcher and paper-trading logic
//!
//! Pure types and logic with no I/O beyond the snapshot store.
//! All chain and market access happens through the ports layer.
//!
//! - `account`: tracked accounts, transaction refs/details, cursor state
//! - `change_detector`: diff previous vs current account observations
//! - `classifier`: transaction -> typed, prioritized alerts
//! - `guardrails`: pre-execution trade limits with daily volume tracking
//! - `ledger`: simulated portfolio (cost basis, realized P&L, stats)
//! - `portfolio`: ledger with write-through persistence
//! - `persistence`: atomic snapshot stores

pub mod account;
pub mod alert;
pub mod change_detector;
pub mod classifier;
pub mod guardrails;
pub mod ledger;
pub mod persistence;
pub mod portfolio;
pub mod trade;

/// Wrapped SOL mint, used as the native asset id
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// First `max_chars` characters of `text`, for log lines and tables
pub fn abbreviate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

pub use account::{
    AccountCursorState, AccountSnapshot, AssetTransfer, TrackedAccount, TransactionCursor,
    TransactionDetail, TransactionRef, DEFAULT_SEEN_CAPACITY,
};
pub use alert::{Alert, AlertKind, Severity};
pub use change_detector::{ChangeDetector, RawDelta};
pub use classifier::{AlertClassifier, ClassificationError, ClassifierConfig};
pub use guardrails::{GuardrailConfig, GuardrailViolation, Guardrails};
pub use ledger::{Ledger, LedgerError, LedgerStats, LedgerTrade, Position, TradeSide};
pub use persistence::{
    JsonFileStore, MemoryStore, MonitorState, PersistError, PortfolioSnapshot, SnapshotStore,
    DEFAULT_MONITOR_STATE_FILE, DEFAULT_PORTFOLIO_FILE,
};
pub use portfolio::{PaperPortfolio, PortfolioError};
pub use trade::{
    ExecutionMode, TradeIntent, TradeKind, TradeOutcome, TradeReference, TradeReport, TradeResult,
};
