use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{TransactionCursor, TransactionDetail, TransactionRef};

/// Account data error type
///
/// From the monitor's point of view `RpcError`, `InvalidAddress` and
/// `Timeout` are transient: the account's cycle is abandoned and retried on
/// the next poll. A `ParseError` for a transaction detail is permanent and
/// the signature is skipped. `TransactionNotFound` is retried a few cycles
/// before the signature is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataSourceError {
    #[error("RPC request failed: {0}")]
    RpcError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

/// Read access to chain state for tracked accounts
#[async_trait]
pub trait AccountDataSource: Send + Sync {
    /// Current native balance in SOL
    async fn get_balance(&self, address: &str) -> Result<f64, DataSourceError>;

    /// The most recent `limit` transactions, oldest first
    async fn get_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRef>, DataSourceError>;

    /// The oldest `limit` transactions newer than `cursor`, oldest first
    ///
    /// A caller that advances its cursor to the last one returned sees the
    /// rest on later calls. With no cursor, starts from the account's first
    /// transaction.
    async fn get_new_transactions(
        &self,
        address: &str,
        cursor: Option<&TransactionCursor>,
        limit: usize,
    ) -> Result<Vec<TransactionRef>, DataSourceError>;

    async fn get_transaction_detail(
        &self,
        signature: &str,
    ) -> Result<TransactionDetail, DataSourceError>;
}
