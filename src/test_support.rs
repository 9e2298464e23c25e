//! In-process fakes for the trait seams, shared by unit tests.

use async_trait::async_trait;
use base64::Engine as _;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{
    PositionSource, Quote, QuoteData, QuoteRequest, QuoteToken, TradeBackend, TradeLogRecord,
};
use crate::chain::ChainClient;
use crate::config::NATIVE_MINT;
use crate::domain::Position;
use crate::error::TradeError;
use crate::price::PriceOracle;

pub const MINT: &str = "M1";
pub const WALLET: &str = "W1";

/// Unsigned single-signer transaction paid by `payer`, as the quote service
/// would hand it out.
pub fn unsigned_tx_base64(payer: &Pubkey) -> String {
    let ix = Instruction::new_with_bytes(
        Pubkey::new_unique(),
        &[9, 9],
        vec![AccountMeta::new(*payer, true)],
    );
    let msg = Message::new_with_blockhash(&[ix], Some(payer), &Hash::new_unique());
    let tx = VersionedTransaction {
        signatures: vec![Signature::default()],
        message: VersionedMessage::Legacy(msg),
    };
    base64::engine::general_purpose::STANDARD.encode(bincode::serialize(&tx).unwrap())
}

#[derive(Default)]
pub struct FakeOracle {
    prices: Mutex<HashMap<String, f64>>,
    errors: Mutex<HashMap<String, TradeError>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeOracle {
    pub fn with_price(self, token: &str, price: f64) -> Self {
        self.set_price(token, price);
        self
    }

    pub fn set_price(&self, token: &str, price: f64) {
        self.prices.lock().unwrap().insert(token.to_string(), price);
    }

    pub fn fail_price(&self, token: &str, err: TradeError) {
        self.errors.lock().unwrap().insert(token.to_string(), err);
    }
}

#[async_trait]
impl PriceOracle for FakeOracle {
    async fn get_price(&self, token_id: &str) -> Result<f64, TradeError> {
        self.calls.lock().unwrap().push(token_id.to_string());
        if let Some(err) = self.errors.lock().unwrap().get(token_id) {
            return Err(err.clone());
        }
        self.prices
            .lock()
            .unwrap()
            .get(token_id)
            .copied()
            .ok_or_else(|| TradeError::PriceUnavailable(token_id.to_string()))
    }
}

#[derive(Default)]
pub struct FakeChain {
    decimals: Mutex<HashMap<String, u8>>,
    confirm_error: Mutex<Option<TradeError>>,
    confirms: AtomicUsize,
}

impl FakeChain {
    pub fn set_decimals(&self, mint: &str, decimals: u8) {
        self.decimals.lock().unwrap().insert(mint.to_string(), decimals);
    }

    pub fn fail_confirm(&self, err: TradeError) {
        *self.confirm_error.lock().unwrap() = Some(err);
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirms.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn token_decimals(&self, mint: &str) -> Result<u8, TradeError> {
        let default = if mint == NATIVE_MINT { 9 } else { 6 };
        Ok(*self.decimals.lock().unwrap().get(mint).unwrap_or(&default))
    }

    async fn confirm_transaction(
        &self,
        _signature: &str,
        _blockhash: &Hash,
        _last_valid_block_height: u64,
    ) -> Result<(), TradeError> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        match self.confirm_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct FakeBackend {
    payer: Pubkey,
    pub out_amount: Mutex<u64>,
    pub raw_tx_override: Mutex<Option<String>>,
    quote_error: Mutex<Option<TradeError>>,
    broadcast_error: Mutex<Option<TradeError>>,
    log_error: Mutex<Option<TradeError>>,
    positions: Mutex<Result<Vec<Position>, TradeError>>,
    pub quotes: Mutex<Vec<QuoteRequest>>,
    pub broadcasts: Mutex<Vec<String>>,
    pub logs: Mutex<Vec<TradeLogRecord>>,
    fetches: AtomicUsize,
}

impl FakeBackend {
    pub const TX_HASH: &'static str = "5xFakeHash";

    pub fn new(payer: Pubkey) -> Self {
        Self {
            payer,
            out_amount: Mutex::new(1_000_000),
            raw_tx_override: Mutex::new(None),
            quote_error: Mutex::new(None),
            broadcast_error: Mutex::new(None),
            log_error: Mutex::new(None),
            positions: Mutex::new(Ok(vec![])),
            quotes: Mutex::new(vec![]),
            broadcasts: Mutex::new(vec![]),
            logs: Mutex::new(vec![]),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fail_quote(&self, err: TradeError) {
        *self.quote_error.lock().unwrap() = Some(err);
    }

    pub fn fail_broadcast(&self, err: TradeError) {
        *self.broadcast_error.lock().unwrap() = Some(err);
    }

    pub fn fail_log(&self, err: TradeError) {
        *self.log_error.lock().unwrap() = Some(err);
    }

    pub fn set_positions(&self, positions: Result<Vec<Position>, TradeError>) {
        *self.positions.lock().unwrap() = positions;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sold_mints(&self) -> Vec<String> {
        self.quotes
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.token_out_address == NATIVE_MINT)
            .map(|q| q.token_in_address.clone())
            .collect()
    }
}

#[async_trait]
impl TradeBackend for FakeBackend {
    async fn quote(&self, req: &QuoteRequest, _auth_token: &str) -> Result<Quote, TradeError> {
        self.quotes.lock().unwrap().push(req.clone());
        if let Some(err) = self.quote_error.lock().unwrap().clone() {
            return Err(err);
        }
        let decimals = if req.token_out_address == NATIVE_MINT { 9 } else { 6 };
        let raw_tx_base64 = self
            .raw_tx_override
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unsigned_tx_base64(&self.payer));
        Ok(Quote {
            raw_tx_base64,
            last_valid_block_height: 1_000,
            quote_data: QuoteData {
                in_amount: req.in_amount,
                out_amount: *self.out_amount.lock().unwrap(),
                token_out: QuoteToken {
                    decimals,
                    symbol: "OUT".into(),
                },
            },
        })
    }

    async fn send_signed_transaction(
        &self,
        signed_tx_base64: &str,
        _auth_token: &str,
    ) -> Result<String, TradeError> {
        if let Some(err) = self.broadcast_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.broadcasts.lock().unwrap().push(signed_tx_base64.to_string());
        Ok(Self::TX_HASH.to_string())
    }

    async fn log_trade(&self, record: &TradeLogRecord, _auth_token: &str) -> Result<(), TradeError> {
        self.logs.lock().unwrap().push(record.clone());
        match self.log_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PositionSource for FakeBackend {
    async fn fetch_positions(
        &self,
        _wallet_address: &str,
        _auth_token: &str,
    ) -> Result<Vec<Position>, TradeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.positions.lock().unwrap().clone()
    }
}
