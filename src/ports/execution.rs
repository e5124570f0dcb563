use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Transaction signing failed: {0}")]
    SigningError(String),

    #[error("Transaction submission failed: {0}")]
    SubmissionError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub success: bool,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub success: bool,
    pub signature: String,
    /// Output amount in UI units of the output asset
    pub output_amount: f64,
}

/// Signs and submits real transactions for the operator's wallet
///
/// Amounts are UI units: SOL for sends, input-asset units for swaps.
/// Implementations do not retry on failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountExecutor: Send + Sync {
    async fn send(&self, to_address: &str, amount: f64) -> Result<SendReceipt, ExecutionError>;

    async fn swap(
        &self,
        input_asset: &str,
        output_asset: &str,
        amount: f64,
    ) -> Result<SwapReceipt, ExecutionError>;

    /// Wallet SOL balance
    async fn balance(&self) -> Result<f64, ExecutionError>;
}
