use serde::{Deserialize, Serialize};

/// Failure taxonomy shared by the oracle, the pipeline and the monitor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TradeError {
    #[error("Invalid trade intent: {0}")]
    InvalidIntent(String),

    #[error("No price data found for {0}")]
    PriceUnavailable(String),

    #[error("Price service error: {0}")]
    PriceServiceError(String),

    #[error("Could not fetch mint info for {mint}: {detail}")]
    MintLookupFailed { mint: String, detail: String },

    #[error("Failed to get trade quote: {0}")]
    QuoteFailed(String),

    #[error("Failed to sign transaction: {0}")]
    SigningFailed(String),

    #[error("Failed to broadcast transaction: {0}")]
    BroadcastFailed(String),

    #[error("Failed to confirm transaction: {0}")]
    ConfirmationFailed(String),

    #[error("Transaction failed on-chain: {0}")]
    TradeReverted(String),

    #[error("Failed to log trade on backend: {0}")]
    LedgerReportFailed(String),

    #[error("Failed to fetch active trades: {0}")]
    PositionFetchFailed(String),

    #[error("Authentication expired")]
    AuthExpired,
}

/// Copyable tag for [`TradeError`], carried on outcomes so callers can branch
/// without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidIntent,
    PriceUnavailable,
    PriceServiceError,
    MintLookupFailed,
    QuoteFailed,
    SigningFailed,
    BroadcastFailed,
    ConfirmationFailed,
    TradeReverted,
    LedgerReportFailed,
    PositionFetchFailed,
    AuthExpired,
}

impl TradeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradeError::InvalidIntent(_) => ErrorKind::InvalidIntent,
            TradeError::PriceUnavailable(_) => ErrorKind::PriceUnavailable,
            TradeError::PriceServiceError(_) => ErrorKind::PriceServiceError,
            TradeError::MintLookupFailed { .. } => ErrorKind::MintLookupFailed,
            TradeError::QuoteFailed(_) => ErrorKind::QuoteFailed,
            TradeError::SigningFailed(_) => ErrorKind::SigningFailed,
            TradeError::BroadcastFailed(_) => ErrorKind::BroadcastFailed,
            TradeError::ConfirmationFailed(_) => ErrorKind::ConfirmationFailed,
            TradeError::TradeReverted(_) => ErrorKind::TradeReverted,
            TradeError::LedgerReportFailed(_) => ErrorKind::LedgerReportFailed,
            TradeError::PositionFetchFailed(_) => ErrorKind::PositionFetchFailed,
            TradeError::AuthExpired => ErrorKind::AuthExpired,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, TradeError::AuthExpired)
    }
}
