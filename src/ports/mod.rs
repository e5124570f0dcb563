//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Chain reads for tracked accounts (balances, signatures, details)
//! - Real trade execution (sends and swaps from the operator wallet)
//! - Spot price lookup for paper fills

pub mod data_source;
pub mod execution;
pub mod mocks;
pub mod price;

pub use data_source::{AccountDataSource, DataSourceError};
pub use execution::{AccountExecutor, ExecutionError, SendReceipt, SwapReceipt};
pub use price::{PriceError, PriceLookup};
