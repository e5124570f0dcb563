//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Solana: RPC data source, wallet and real executor
//! - Jupiter: swap API client and SOL-denominated price feed
//! - CLI: Command-line interface definitions

pub mod cli;
pub mod jupiter;
pub mod solana;

pub use cli::CliApp;
pub use jupiter::{JupiterClient, JupiterPriceClient};
pub use solana::{SolanaClient, WalletExecutor, WalletManager};
