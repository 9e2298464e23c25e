use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::TradeError;

/// Read-only USD price lookup. No retries; callers own the retry policy.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, token_id: &str) -> Result<f64, TradeError>;
}

#[derive(Clone)]
pub struct PriceClient {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, Option<PriceEntry>>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    #[serde(default)]
    price: Option<serde_json::Value>,
}

impl PriceClient {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building price http client")?;
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

fn parse_price(token_id: &str, body: PriceResponse) -> Result<f64, TradeError> {
    let unavailable = || TradeError::PriceUnavailable(token_id.to_string());
    let raw = body
        .data
        .get(token_id)
        .and_then(|entry| entry.as_ref())
        .and_then(|entry| entry.price.as_ref())
        .ok_or_else(unavailable)?;

    let price = match raw {
        serde_json::Value::String(s) => s.trim().parse::<f64>().map_err(|_| unavailable())?,
        serde_json::Value::Number(n) => n.as_f64().ok_or_else(unavailable)?,
        _ => return Err(unavailable()),
    };

    if !price.is_finite() || price <= 0.0 {
        return Err(unavailable());
    }
    Ok(price)
}

#[async_trait]
impl PriceOracle for PriceClient {
    async fn get_price(&self, token_id: &str) -> Result<f64, TradeError> {
        if token_id.trim().is_empty() {
            return Err(TradeError::InvalidIntent("mint address is required".into()));
        }

        let resp = self
            .http
            .get(&self.url)
            .query(&[("ids", token_id)])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| TradeError::PriceServiceError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TradeError::PriceServiceError(format!("HTTP error! Status: {status}")));
        }

        let body: PriceResponse = resp
            .json()
            .await
            .map_err(|_| TradeError::PriceUnavailable(token_id.to_string()))?;

        let price = parse_price(token_id, body)?;
        tracing::debug!(token = %token_id, price, "price.fetched");
        Ok(price)
    }
}
