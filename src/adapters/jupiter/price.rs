use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::domain::NATIVE_MINT;
use crate::ports::{PriceError, PriceLookup};

const JUPITER_PRICE_API: &str = "https://api.jup.ag/price/v2";

/// Spot prices quoted in SOL via the Jupiter price API
#[derive(Debug, Clone)]
pub struct JupiterPriceClient {
    http: Client,
    base_url: String,
}

impl JupiterPriceClient {
    pub fn new(timeout: Duration) -> Result<Self, PriceError> {
        Self::with_base_url(JUPITER_PRICE_API, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PriceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriceError::ApiError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PriceLookup for JupiterPriceClient {
    async fn get_price(&self, asset_id: &str) -> Result<f64, PriceError> {
        if asset_id == NATIVE_MINT {
            return Ok(1.0);
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("ids", asset_id), ("vsToken", NATIVE_MINT)])
            .send()
            .await
            .map_err(|e| PriceError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceError::ApiError(format!("HTTP {}", response.status())));
        }

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| PriceError::ParseError(e.to_string()))?;

        price_from_response(&body, asset_id)
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, Option<PriceData>>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    price: String,
}

fn price_from_response(body: &PriceResponse, asset_id: &str) -> Result<f64, PriceError> {
    let data = body
        .data
        .get(asset_id)
        .and_then(Option::as_ref)
        .ok_or_else(|| PriceError::Unavailable(asset_id.to_string()))?;

    let price: f64 = data
        .price
        .parse()
        .map_err(|_| PriceError::ParseError(format!("{}: {:?}", asset_id, data.price)))?;

    if price > 0.0 && price.is_finite() {
        Ok(price)
    } else {
        Err(PriceError::Unavailable(asset_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PriceResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_price_parsed_from_string() {
        let body = parse(r#"{"data":{"mintA":{"id":"mintA","type":"derivedPrice","price":"0.0000123"}},"timeTaken":0.01}"#);
        let price = price_from_response(&body, "mintA").unwrap();
        assert!((price - 0.0000123).abs() < 1e-12);
    }

    #[test]
    fn test_null_entry_is_unavailable() {
        let body = parse(r#"{"data":{"mintA":null}}"#);
        assert_eq!(
            price_from_response(&body, "mintA"),
            Err(PriceError::Unavailable("mintA".to_string()))
        );
        assert!(matches!(
            price_from_response(&body, "other"),
            Err(PriceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_garbage_price_is_parse_error() {
        let body = parse(r#"{"data":{"mintA":{"price":"abc"}}}"#);
        assert!(matches!(
            price_from_response(&body, "mintA"),
            Err(PriceError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_native_mint_is_one() {
        let client = JupiterPriceClient::new(Duration::from_millis(100)).unwrap();
        assert_eq!(client.get_price(NATIVE_MINT).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_unreachable_api() {
        let client =
            JupiterPriceClient::with_base_url("http://127.0.0.1:1", Duration::from_millis(200))
                .unwrap();
        assert!(matches!(
            client.get_price("mintA").await,
            Err(PriceError::ApiError(_))
        ));
    }
}
