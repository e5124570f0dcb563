use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("No price available for {0}")]
    Unavailable(String),

    #[error("Price API error: {0}")]
    ApiError(String),

    #[error("Price parsing error: {0}")]
    ParseError(String),
}

/// Spot price source, denominated in SOL per unit
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn get_price(&self, asset_id: &str) -> Result<f64, PriceError>;
}
