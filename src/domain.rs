use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{ErrorKind, TradeError};

/// Open holding as reported by the backend. Read-only snapshot; the backend
/// owns creation and removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub mint_address: String,
    #[serde(default)]
    pub token_name: String,
    #[serde(default)]
    pub token_decimals: u8,

    /// USD value at acquisition.
    #[serde(deserialize_with = "de_decimal")]
    pub entry_price: f64,
    /// USD value thresholds, compared against the whole holding's value.
    #[serde(deserialize_with = "de_decimal")]
    pub stop_loss: f64,
    #[serde(deserialize_with = "de_decimal")]
    pub take_profit: f64,

    /// Human-scaled quantity held.
    #[serde(deserialize_with = "de_decimal")]
    pub token_amounts_purchased: f64,
}

/// Decimal columns may arrive as JSON numbers or numeric strings.
fn de_decimal<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    let value = match Raw::deserialize(d)? {
        Raw::Num(n) => n,
        Raw::Str(s) => s.trim().parse().map_err(de::Error::custom)?,
    };
    if !value.is_finite() {
        return Err(de::Error::custom(format!("not a finite decimal: {value}")));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "buy",
            TradeType::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Manual,
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "Take Profit",
            ExitReason::StopLoss => "Stop Loss",
            ExitReason::Manual => "Manual",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single execution request. Consumed by value by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub mint_address: String,
    pub trade_type: TradeType,
    /// Buy: native amount to spend. Sell: token quantity to dispose of.
    pub amount_input: f64,
    pub token_symbol: String,
    #[serde(default)]
    pub previous_buy_price: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Overrides the configured slippage for this trade only.
    #[serde(default)]
    pub slippage_bps: Option<u64>,
}

impl TradeIntent {
    pub fn buy(mint_address: impl Into<String>, amount_sol: f64, token_symbol: impl Into<String>) -> Self {
        Self {
            mint_address: mint_address.into(),
            trade_type: TradeType::Buy,
            amount_input: amount_sol,
            token_symbol: token_symbol.into(),
            previous_buy_price: None,
            reason: None,
            slippage_bps: None,
        }
    }

    pub fn sell(mint_address: impl Into<String>, token_amount: f64, token_symbol: impl Into<String>) -> Self {
        Self {
            mint_address: mint_address.into(),
            trade_type: TradeType::Sell,
            amount_input: token_amount,
            token_symbol: token_symbol.into(),
            previous_buy_price: None,
            reason: None,
            slippage_bps: None,
        }
    }

    /// Full exit of a monitored position.
    pub fn exit(position: &Position, reason: ExitReason) -> Self {
        Self {
            previous_buy_price: Some(position.entry_price),
            reason: Some(reason.label().to_string()),
            ..Self::sell(
                position.mint_address.clone(),
                position.token_amounts_purchased,
                position.token_name.clone(),
            )
        }
    }

    pub fn with_previous_buy_price(mut self, price: f64) -> Self {
        self.previous_buy_price = Some(price);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_slippage_bps(mut self, bps: u64) -> Self {
        self.slippage_bps = Some(bps);
        self
    }

    pub fn validate(&self) -> Result<(), TradeError> {
        if self.mint_address.trim().is_empty() {
            return Err(TradeError::InvalidIntent("mint address is required".into()));
        }
        if !self.amount_input.is_finite() || self.amount_input <= 0.0 {
            return Err(TradeError::InvalidIntent(format!(
                "amount must be positive, got {}",
                self.amount_input
            )));
        }
        Ok(())
    }
}

/// Result of one pipeline run. Economics fields are only filled on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub success: bool,
    pub transaction_hash: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,

    pub profit_usd: Option<f64>,
    pub profit_sol: Option<f64>,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub token_amounts_purchased: Option<f64>,
    pub token_decimals: Option<u8>,
}

impl TradeOutcome {
    pub fn failed(err: &TradeError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            ..Self::default()
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        self.error_kind == Some(ErrorKind::AuthExpired)
    }
}
