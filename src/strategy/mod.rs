//! Strategy Layer - Alert-driven trading strategies
//!
//! A strategy is a named `condition(alert) -> bool` plus
//! `action(alert) -> Option<TradeIntent>`, with optional bounds:
//! - `registry`: ordered registry, replace-by-name, pure evaluation
//! - `builtin`: strategies configurable from TOML (`copy_buy`, `whale_inflow`)

pub mod builtin;
pub mod registry;

pub use builtin::{copy_buy, whale_inflow};
pub use registry::{Candidate, Registration, Strategy, StrategyConfig, StrategyRegistry};
