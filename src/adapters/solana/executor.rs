//! Wallet Executor
//!
//! Real execution from the operator wallet: native SOL transfers built
//! locally, swaps routed through Jupiter. Every submission is confirmed
//! before returning and nothing is retried.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, transaction::VersionedTransaction};

use super::rpc::SolanaClient;
use super::wallet::WalletManager;
use crate::adapters::jupiter::{JupiterClient, QuoteRequest, SwapRequest};
use crate::domain::{LAMPORTS_PER_SOL, NATIVE_MINT};
use crate::ports::{AccountExecutor, ExecutionError, SendReceipt, SwapReceipt};

const NATIVE_DECIMALS: u8 = 9;

pub const DEFAULT_SLIPPAGE_BPS: u16 = 100;

pub struct WalletExecutor {
    solana: SolanaClient,
    wallet: Arc<WalletManager>,
    jupiter: JupiterClient,
    slippage_bps: u16,
    priority_fee_lamports: Option<u64>,
}

impl WalletExecutor {
    pub fn new(solana: SolanaClient, wallet: Arc<WalletManager>, jupiter: JupiterClient) -> Self {
        Self {
            solana,
            wallet,
            jupiter,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            priority_fee_lamports: None,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_priority_fee(mut self, lamports: u64) -> Self {
        self.priority_fee_lamports = Some(lamports);
        self
    }

    pub fn wallet_address(&self) -> String {
        self.wallet.public_key()
    }

    async fn decimals(&self, mint: &str) -> Result<u8, ExecutionError> {
        if mint == NATIVE_MINT {
            return Ok(NATIVE_DECIMALS);
        }
        self.solana
            .get_mint_decimals(mint)
            .await
            .map_err(|e| ExecutionError::ApiError(e.to_string()))
    }
}

#[async_trait]
impl AccountExecutor for WalletExecutor {
    async fn send(&self, to_address: &str, amount: f64) -> Result<SendReceipt, ExecutionError> {
        let to = Pubkey::from_str(to_address)
            .map_err(|e| ExecutionError::InvalidParameters(format!("recipient: {}", e)))?;
        let lamports = ui_to_base(amount, NATIVE_DECIMALS)?;

        let blockhash = self
            .solana
            .get_latest_blockhash()
            .await
            .map_err(|e| ExecutionError::SubmissionError(e.to_string()))?;
        let tx = self.wallet.transfer_transaction(&to, lamports, blockhash);

        tracing::info!("Sending {:.9} SOL to {}", amount, to_address);
        let signature = self
            .solana
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(|e| ExecutionError::SubmissionError(e.to_string()))?;

        Ok(SendReceipt {
            success: true,
            signature,
        })
    }

    async fn swap(
        &self,
        input_asset: &str,
        output_asset: &str,
        amount: f64,
    ) -> Result<SwapReceipt, ExecutionError> {
        let input_decimals = self.decimals(input_asset).await?;
        let output_decimals = self.decimals(output_asset).await?;
        let base_amount = ui_to_base(amount, input_decimals)?;

        let quote = self
            .jupiter
            .get_quote(&QuoteRequest::new(
                input_asset.to_string(),
                output_asset.to_string(),
                base_amount,
                self.slippage_bps,
            ))
            .await?;
        tracing::debug!(
            "Quote {} -> {}: in {} out {} (impact {:.3}%)",
            input_asset,
            output_asset,
            quote.in_amount,
            quote.out_amount,
            quote.price_impact()
        );

        let quote_value = serde_json::to_value(&quote)
            .map_err(|e| ExecutionError::InvalidParameters(e.to_string()))?;
        let mut request = SwapRequest::new(self.wallet.public_key(), quote_value);
        if let Some(fee) = self.priority_fee_lamports {
            request = request.with_priority_fee(fee);
        }
        let swap = self.jupiter.get_swap_transaction(&request).await?;

        let bytes = swap
            .transaction_bytes()
            .map_err(|e| ExecutionError::ApiError(format!("swap transaction encoding: {}", e)))?;
        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| ExecutionError::ApiError(format!("swap transaction decoding: {}", e)))?;
        let signed = self
            .wallet
            .sign_versioned(unsigned.message)
            .map_err(|e| ExecutionError::SigningError(e.to_string()))?;

        let signature = self
            .solana
            .send_and_confirm_versioned(&signed)
            .await
            .map_err(|e| ExecutionError::SubmissionError(e.to_string()))?;

        Ok(SwapReceipt {
            success: true,
            signature,
            output_amount: base_to_ui(quote.output_amount(), output_decimals),
        })
    }

    async fn balance(&self) -> Result<f64, ExecutionError> {
        let lamports = self
            .solana
            .get_balance_lamports(&self.wallet.public_key())
            .await
            .map_err(|e| ExecutionError::ApiError(e.to_string()))?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }
}

/// UI amount to integer base units, rejecting non-positive and overflowing amounts
fn ui_to_base(amount: f64, decimals: u8) -> Result<u64, ExecutionError> {
    let scaled = (amount * 10f64.powi(decimals as i32)).round();
    if !scaled.is_finite() || scaled < 1.0 || scaled > u64::MAX as f64 {
        return Err(ExecutionError::InvalidParameters(format!(
            "amount {} is not representable with {} decimals",
            amount, decimals
        )));
    }
    Ok(scaled as u64)
}

fn base_to_ui(value: u64, decimals: u8) -> f64 {
    if decimals == 0 {
        return value as f64;
    }
    value as f64 / 10f64.powi(decimals as i32)
}
