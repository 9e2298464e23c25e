use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::domain::{Position, TradeType};
use crate::error::TradeError;

/// Quote construction, broadcast and the trade ledger. All of these live on
/// the remote backend; the core only consumes them.
#[async_trait]
pub trait TradeBackend: Send + Sync {
    async fn quote(&self, req: &QuoteRequest, auth_token: &str) -> Result<Quote, TradeError>;

    /// Returns the transaction hash.
    async fn send_signed_transaction(
        &self,
        signed_tx_base64: &str,
        auth_token: &str,
    ) -> Result<String, TradeError>;

    async fn log_trade(&self, record: &TradeLogRecord, auth_token: &str) -> Result<(), TradeError>;
}

/// Source of truth for open positions.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_positions(
        &self,
        wallet_address: &str,
        auth_token: &str,
    ) -> Result<Vec<Position>, TradeError>;
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: Client,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub token_in_address: String,
    pub token_out_address: String,
    /// Input mint's smallest units.
    pub in_amount: u64,
    pub user_wallet_address: String,
    /// Fraction, e.g. 0.005 for 50 bps.
    pub slippage: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Quote {
    /// base64 encoded, unsigned VersionedTransaction
    pub raw_tx_base64: String,
    #[serde(deserialize_with = "de_amount")]
    pub last_valid_block_height: u64,
    pub quote_data: QuoteData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteData {
    #[serde(deserialize_with = "de_amount")]
    pub in_amount: u64,
    #[serde(deserialize_with = "de_amount")]
    pub out_amount: u64,
    pub token_out: QuoteToken,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteToken {
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Serialize)]
struct BroadcastRequest<'a> {
    signed_tx_base64: &'a str,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    transaction_hash: String,
}

/// Structured trade record for the remote ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogRecord {
    pub mint_address: String,
    pub token_symbol: String,
    pub trade_type: TradeType,
    /// Input amount: native for buys, tokens for sells.
    pub amount_sol: f64,
    pub amount_tokens: Option<f64>,
    pub in_amount_raw: Option<u64>,
    pub price_sol_per_token: Option<f64>,
    pub price_usd_at_trade: Option<f64>,
    pub tx_hash: String,
    pub log_message: String,
    pub profit_usd: Option<f64>,
    pub profit_sol: Option<f64>,
    pub buy_price: Option<f64>,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub token_amounts_purchased: Option<f64>,
    pub token_decimals: Option<u8>,
    pub sell_reason: Option<String>,
    pub swap_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub user_wallet_address: String,
}

impl TradeLogRecord {
    pub fn is_failed(&self) -> bool {
        self.status.as_deref() == Some("failed")
    }
}

/// Accepts amounts as JSON numbers or decimal strings.
fn de_amount<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
        Float(f64),
    }

    match Raw::deserialize(d)? {
        Raw::Int(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(de::Error::custom),
        Raw::Float(f) if f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => Ok(f as u64),
        Raw::Float(f) => Err(de::Error::custom(format!("not an integer amount: {f}"))),
    }
}

/// Pulls `detail` out of a FastAPI-style error body, falling back to the
/// status line.
async fn error_detail(resp: Response) -> String {
    let status = resp.status();
    let fallback = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());
    match resp.json::<serde_json::Value>().await {
        Ok(body) => match body.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => fallback,
        },
        Err(_) => fallback,
    }
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

impl BackendClient {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building backend http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends an authenticated request, mapping transport errors and non-2xx
    /// statuses through `fail`. 401/403 always become `AuthExpired`.
    async fn send(
        &self,
        req: RequestBuilder,
        auth_token: &str,
        fail: fn(String) -> TradeError,
    ) -> Result<Response, TradeError> {
        let resp = req
            .bearer_auth(auth_token)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = resp.status();
        if is_auth_status(status) {
            return Err(TradeError::AuthExpired);
        }
        if !status.is_success() {
            return Err(fail(error_detail(resp).await));
        }
        Ok(resp)
    }
}

#[async_trait]
impl TradeBackend for BackendClient {
    async fn quote(&self, req: &QuoteRequest, auth_token: &str) -> Result<Quote, TradeError> {
        let resp = self
            .send(
                self.http.post(self.url("/trade/quote")).json(req),
                auth_token,
                TradeError::QuoteFailed,
            )
            .await?;
        resp.json()
            .await
            .map_err(|e| TradeError::QuoteFailed(format!("malformed quote response: {e}")))
    }

    async fn send_signed_transaction(
        &self,
        signed_tx_base64: &str,
        auth_token: &str,
    ) -> Result<String, TradeError> {
        let resp = self
            .send(
                self.http
                    .post(self.url("/trade/send-signed-transaction"))
                    .json(&BroadcastRequest { signed_tx_base64 }),
                auth_token,
                TradeError::BroadcastFailed,
            )
            .await?;
        let body: BroadcastResponse = resp
            .json()
            .await
            .map_err(|e| TradeError::BroadcastFailed(format!("malformed broadcast response: {e}")))?;
        if body.transaction_hash.trim().is_empty() {
            return Err(TradeError::BroadcastFailed("empty transaction hash".into()));
        }
        Ok(body.transaction_hash)
    }

    async fn log_trade(&self, record: &TradeLogRecord, auth_token: &str) -> Result<(), TradeError> {
        self.send(
            self.http.post(self.url("/trade/log-trade")).json(record),
            auth_token,
            TradeError::LedgerReportFailed,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PositionSource for BackendClient {
    async fn fetch_positions(
        &self,
        wallet_address: &str,
        auth_token: &str,
    ) -> Result<Vec<Position>, TradeError> {
        let resp = self
            .send(
                self.http
                    .get(self.url("/user/active-trades"))
                    .query(&[("wallet_address", wallet_address)]),
                auth_token,
                TradeError::PositionFetchFailed,
            )
            .await?;
        let records: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| TradeError::PositionFetchFailed(format!("malformed positions: {e}")))?;

        // One bad record must not hide the rest of the book.
        let positions = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Position>(record) {
                Ok(position) => Some(position),
                Err(e) => {
                    warn!(wallet = %wallet_address, error = %e, "backend.position_skipped");
                    None
                }
            })
            .collect();
        Ok(positions)
    }
}
