//! Jupiter Adapter
//!
//! Swap quotes and transactions for real execution, plus the SOL-denominated
//! price feed used for paper fills.

mod client;
mod price;
mod quote;
mod swap;

pub use client::{JupiterClient, JupiterConfig};
pub use price::JupiterPriceClient;
pub use quote::{QuoteRequest, QuoteResponse};
pub use swap::{SwapRequest, SwapResponse};
