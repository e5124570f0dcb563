use async_trait::async_trait;
use solana_client::rpc_client::{GetConfirmedSignaturesForAddress2Config, RpcClient};
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, VersionedTransaction},
};
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Mint;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, UiLoadedAddresses, UiTransactionEncoding,
    UiTransactionTokenBalance,
};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::{
    AssetTransfer, TransactionCursor, TransactionDetail, TransactionRef, LAMPORTS_PER_SOL,
};
use crate::ports::{AccountDataSource, DataSourceError};

/// Maximum signatures per `getSignaturesForAddress` call
const SIGNATURE_PAGE_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum SolanaClientError {
    #[error("RPC request failed: {0}")]
    RpcError(String),
    #[error("Transaction failed: {0}")]
    TransactionError(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

impl From<SolanaClientError> for DataSourceError {
    fn from(e: SolanaClientError) -> Self {
        match e {
            SolanaClientError::InvalidPublicKey(s) => DataSourceError::InvalidAddress(s),
            SolanaClientError::InvalidSignature(s) => DataSourceError::ParseError(s),
            other => DataSourceError::RpcError(other.to_string()),
        }
    }
}

/// Wrapper around Solana RPC client with async-compatible methods
#[derive(Clone)]
pub struct SolanaClient {
    client: Arc<RpcClient>,
}

impl SolanaClient {
    /// Create a new Solana RPC client
    pub fn new(rpc_url: String) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed()));
        Self { client }
    }

    /// Run a blocking RPC call off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T, SolanaClientError>
    where
        T: Send + 'static,
        F: FnOnce(&RpcClient) -> Result<T, SolanaClientError> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || f(client.as_ref()))
            .await
            .map_err(|e| SolanaClientError::RpcError(format!("Task join error: {}", e)))?
    }

    /// Get SOL balance for a public key, in lamports
    pub async fn get_balance_lamports(&self, pubkey: &str) -> Result<u64, SolanaClientError> {
        let pubkey = parse_pubkey(pubkey)?;
        self.blocking(move |client| {
            client
                .get_balance(&pubkey)
                .map_err(|e| SolanaClientError::RpcError(e.to_string()))
        })
        .await
    }

    /// Decimals of an SPL token mint
    pub async fn get_mint_decimals(&self, mint: &str) -> Result<u8, SolanaClientError> {
        let mint = parse_pubkey(mint)?;
        let data = self
            .blocking(move |client| {
                client
                    .get_account_data(&mint)
                    .map_err(|e| SolanaClientError::RpcError(e.to_string()))
            })
            .await?;
        Mint::unpack(&data)
            .map(|m| m.decimals)
            .map_err(|e| SolanaClientError::RpcError(format!("not a token mint: {}", e)))
    }

    /// Get recent blockhash (needed for transaction building)
    pub async fn get_latest_blockhash(&self) -> Result<Hash, SolanaClientError> {
        self.blocking(|client| {
            client
                .get_latest_blockhash()
                .map_err(|e| SolanaClientError::RpcError(e.to_string()))
        })
        .await
    }

    /// Send a legacy transaction and wait for confirmation
    pub async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<String, SolanaClientError> {
        let tx = transaction.clone();
        self.blocking(move |client| {
            client
                .send_and_confirm_transaction(&tx)
                .map(|sig| sig.to_string())
                .map_err(|e| SolanaClientError::TransactionError(e.to_string()))
        })
        .await
    }

    /// Send a versioned transaction and wait for confirmation
    pub async fn send_and_confirm_versioned(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<String, SolanaClientError> {
        let tx = transaction.clone();
        self.blocking(move |client| {
            client
                .send_and_confirm_transaction(&tx)
                .map(|sig| sig.to_string())
                .map_err(|e| SolanaClientError::TransactionError(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl AccountDataSource for SolanaClient {
    async fn get_balance(&self, address: &str) -> Result<f64, DataSourceError> {
        let lamports = self.get_balance_lamports(address).await?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }

    async fn get_recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRef>, DataSourceError> {
        let pubkey = parse_pubkey(address)?;
        let page = self.signature_page(pubkey, None, None, limit).await?;
        Ok(oldest_first(page, limit))
    }

    async fn get_new_transactions(
        &self,
        address: &str,
        cursor: Option<&TransactionCursor>,
        limit: usize,
    ) -> Result<Vec<TransactionRef>, DataSourceError> {
        let pubkey = parse_pubkey(address)?;
        let until = cursor
            .map(|c| Signature::from_str(&c.signature))
            .transpose()
            .map_err(|e| DataSourceError::ParseError(format!("cursor signature: {}", e)))?;

        // Page backwards to the cursor so nothing between it and the tip is skipped
        let mut newest_first = Vec::new();
        let mut before = None;
        loop {
            let page = self
                .signature_page(pubkey, before, until, SIGNATURE_PAGE_SIZE)
                .await?;
            let exhausted = page.len() < SIGNATURE_PAGE_SIZE;
            before = page
                .last()
                .map(|tx| Signature::from_str(&tx.signature))
                .transpose()
                .map_err(|e| DataSourceError::ParseError(format!("page signature: {}", e)))?;
            newest_first.extend(page);
            if exhausted || before.is_none() {
                break;
            }
        }
        if newest_first.len() > limit {
            debug!(
                "{} has {} signatures past its cursor; taking the oldest {}",
                address,
                newest_first.len(),
                limit
            );
        }

        Ok(oldest_first(newest_first, limit))
    }

    async fn get_transaction_detail(
        &self,
        signature: &str,
    ) -> Result<TransactionDetail, DataSourceError> {
        let sig = Signature::from_str(signature)
            .map_err(|e| SolanaClientError::InvalidSignature(e.to_string()))?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };

        let tx = self
            .blocking(move |client| {
                client
                    .get_transaction_with_config(&sig, config)
                    .map_err(|e| SolanaClientError::RpcError(e.to_string()))
            })
            .await?;

        detail_from_encoded(signature, tx)
    }
}

impl SolanaClient {
    /// One `getSignaturesForAddress` page, newest first
    async fn signature_page(
        &self,
        pubkey: Pubkey,
        before: Option<Signature>,
        until: Option<Signature>,
        limit: usize,
    ) -> Result<Vec<TransactionRef>, DataSourceError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before,
            until,
            limit: Some(limit),
            commitment: Some(CommitmentConfig::confirmed()),
        };

        let statuses = self
            .blocking(move |client| {
                client
                    .get_signatures_for_address_with_config(&pubkey, config)
                    .map_err(|e| SolanaClientError::RpcError(e.to_string()))
            })
            .await?;

        Ok(statuses
            .into_iter()
            .map(|s| TransactionRef {
                signature: s.signature,
                slot: s.slot,
                block_time: s.block_time,
            })
            .collect())
    }
}

/// Reverse an RPC listing into chain order and keep the oldest `limit`
fn oldest_first(mut newest_first: Vec<TransactionRef>, limit: usize) -> Vec<TransactionRef> {
    newest_first.reverse();
    newest_first.truncate(limit);
    newest_first
}

fn parse_pubkey(address: &str) -> Result<Pubkey, SolanaClientError> {
    Pubkey::from_str(address).map_err(|e| SolanaClientError::InvalidPublicKey(e.to_string()))
}

/// Reduce an RPC transaction to balance deltas and token transfers
fn detail_from_encoded(
    signature: &str,
    tx: EncodedConfirmedTransactionWithStatusMeta,
) -> Result<TransactionDetail, DataSourceError> {
    let meta = tx
        .transaction
        .meta
        .ok_or_else(|| DataSourceError::ParseError(format!("{}: missing status meta", signature)))?;

    let decoded = tx.transaction.transaction.decode().ok_or_else(|| {
        DataSourceError::ParseError(format!("{}: undecodable transaction", signature))
    })?;

    let mut keys: Vec<String> = decoded
        .message
        .static_account_keys()
        .iter()
        .map(|k| k.to_string())
        .collect();
    let loaded: Option<UiLoadedAddresses> = meta.loaded_addresses.clone().into();
    if let Some(loaded) = loaded {
        keys.extend(loaded.writable);
        keys.extend(loaded.readonly);
    }

    let pre_tokens: Vec<UiTransactionTokenBalance> =
        Option::from(meta.pre_token_balances.clone()).unwrap_or_default();
    let post_tokens: Vec<UiTransactionTokenBalance> =
        Option::from(meta.post_token_balances.clone()).unwrap_or_default();

    Ok(TransactionDetail {
        signature: signature.to_string(),
        slot: tx.slot,
        block_time: tx.block_time,
        success: meta.err.is_none(),
        fee: meta.fee as f64 / LAMPORTS_PER_SOL,
        balance_deltas: native_deltas(&keys, &meta.pre_balances, &meta.post_balances),
        asset_transfers: token_transfers(
            &keys,
            &to_rows(&pre_tokens),
            &to_rows(&post_tokens),
        ),
    })
}

/// One token balance entry, flattened from the RPC shape
#[derive(Debug, Clone, PartialEq)]
struct TokenRow {
    account_index: usize,
    mint: String,
    owner: Option<String>,
    amount: f64,
}

fn to_rows(balances: &[UiTransactionTokenBalance]) -> Vec<TokenRow> {
    balances
        .iter()
        .map(|b| TokenRow {
            account_index: b.account_index as usize,
            mint: b.mint.clone(),
            owner: Option::from(b.owner.clone()),
            amount: b
                .ui_token_amount
                .ui_amount
                .or_else(|| b.ui_token_amount.ui_amount_string.parse().ok())
                .unwrap_or(0.0),
        })
        .collect()
}

/// Non-zero SOL deltas per account key
fn native_deltas(keys: &[String], pre: &[u64], post: &[u64]) -> BTreeMap<String, f64> {
    keys.iter()
        .zip(pre.iter().zip(post))
        .filter_map(|(key, (&pre, &post))| {
            let delta = post as i128 - pre as i128;
            (delta != 0).then(|| (key.clone(), delta as f64 / LAMPORTS_PER_SOL))
        })
        .collect()
}

/// Net token movement per (owner, mint)
fn token_transfers(keys: &[String], pre: &[TokenRow], post: &[TokenRow]) -> Vec<AssetTransfer> {
    let owner_of = |row: &TokenRow| {
        row.owner
            .clone()
            .or_else(|| keys.get(row.account_index).cloned())
            .unwrap_or_default()
    };

    let mut net: BTreeMap<(String, String), f64> = BTreeMap::new();
    let mut seen: HashSet<(usize, String)> = HashSet::new();

    for row in post {
        let before = pre
            .iter()
            .find(|p| p.account_index == row.account_index && p.mint == row.mint)
            .map_or(0.0, |p| p.amount);
        *net.entry((owner_of(row), row.mint.clone())).or_insert(0.0) += row.amount - before;
        seen.insert((row.account_index, row.mint.clone()));
    }
    // Accounts closed during the transaction only appear in pre balances
    for row in pre {
        if !seen.contains(&(row.account_index, row.mint.clone())) {
            *net.entry((owner_of(row), row.mint.clone())).or_insert(0.0) -= row.amount;
        }
    }

    net.into_iter()
        .filter(|(_, amount)| amount.abs() > 0.0)
        .map(|((owner, asset_id), amount)| AssetTransfer {
            asset_id,
            symbol: None,
            owner,
            amount,
        })
        .collect()
}
