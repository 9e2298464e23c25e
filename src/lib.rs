pub mod backend;
pub mod chain;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod journal;
pub mod logger;
pub mod monitor;
pub mod notifier;
pub mod price;
pub mod signer;
pub mod time;
pub mod units;

#[cfg(test)]
mod test_support;

pub use backend::{BackendClient, PositionSource, TradeBackend};
pub use chain::{ChainClient, RpcChain};
pub use config::{Config, TradePolicy};
pub use domain::{ExitReason, Position, TradeIntent, TradeOutcome, TradeType};
pub use engine::Engine;
pub use error::{ErrorKind, TradeError};
pub use journal::Journal;
pub use monitor::{CycleReport, MonitorHandle, PositionMonitor};
pub use price::{PriceClient, PriceOracle};
pub use signer::{KeypairSigner, TransactionSigner};
