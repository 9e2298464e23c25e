use base64::Engine as _;
use solana_sdk::hash::Hash;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{Quote, QuoteData, QuoteRequest, TradeBackend, TradeLogRecord};
use crate::chain::ChainClient;
use crate::config::{ensure_slippage_bounds, TradePolicy};
use crate::domain::{TradeIntent, TradeOutcome, TradeType};
use crate::error::TradeError;
use crate::journal::Journal;
use crate::price::PriceOracle;
use crate::signer::TransactionSigner;
use crate::units::{to_human, to_raw};

const SWAP_PROVIDER: &str = "DEX Aggregator";

/// Trade Execution Pipeline: quote -> sign -> broadcast -> confirm ->
/// economics -> ledger.
#[derive(Clone)]
pub struct Engine {
    backend: Arc<dyn TradeBackend>,
    oracle: Arc<dyn PriceOracle>,
    chain: Arc<dyn ChainClient>,
    policy: TradePolicy,
    journal: Journal,
}

/// What a confirmed swap leaves behind for the economics step.
#[derive(Debug, Clone)]
struct Executed {
    quote: Quote,
    in_amount_raw: u64,
    tx_hash: String,
}

/// A failed run. `tx_hash` is set when the failure happened after broadcast.
#[derive(Debug)]
struct Failure {
    err: TradeError,
    tx_hash: Option<String>,
}

impl From<TradeError> for Failure {
    fn from(err: TradeError) -> Self {
        Self { err, tx_hash: None }
    }
}

/// Derived trade economics. USD fields are `None` when the native price
/// could not be read after confirmation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Economics {
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub token_amounts_purchased: Option<f64>,
    pub token_decimals: Option<u8>,
    pub proceeds_sol: Option<f64>,
    pub proceeds_usd: Option<f64>,
    pub profit_usd: Option<f64>,
    pub profit_sol: Option<f64>,
}

/// Pure economics for a confirmed trade. Quote amounts are raw and are
/// scaled by the output token's reported decimals.
pub fn compute_economics(
    intent: &TradeIntent,
    quote: &QuoteData,
    native_price_usd: Option<f64>,
    policy: &TradePolicy,
) -> Economics {
    let out_human = to_human(quote.out_amount, quote.token_out.decimals);
    match intent.trade_type {
        TradeType::Buy => {
            let entry_price = native_price_usd.map(|p| intent.amount_input * p);
            Economics {
                entry_price,
                stop_loss: entry_price.map(|e| policy.stop_loss_for(e)),
                take_profit: entry_price.map(|e| policy.take_profit_for(e)),
                token_amounts_purchased: Some(out_human),
                token_decimals: Some(quote.token_out.decimals),
                ..Economics::default()
            }
        }
        TradeType::Sell => {
            let previous = intent.previous_buy_price.unwrap_or(0.0);
            let proceeds_usd = native_price_usd.map(|p| out_human * p);
            Economics {
                proceeds_sol: Some(out_human),
                proceeds_usd,
                profit_usd: proceeds_usd.map(|usd| usd - previous),
                profit_sol: native_price_usd.map(|p| out_human - previous / p),
                ..Economics::default()
            }
        }
    }
}

impl Engine {
    pub fn new(
        backend: Arc<dyn TradeBackend>,
        oracle: Arc<dyn PriceOracle>,
        chain: Arc<dyn ChainClient>,
        policy: TradePolicy,
        journal: Journal,
    ) -> Self {
        Self {
            backend,
            oracle,
            chain,
            policy,
            journal,
        }
    }

    pub fn policy(&self) -> &TradePolicy {
        &self.policy
    }

    /// Runs one intent end to end. Never errors: every failure comes back as
    /// `TradeOutcome { success: false, .. }` and is reported to the ledger.
    pub async fn execute_trade(
        &self,
        signer: &dyn TransactionSigner,
        wallet_address: &str,
        auth_token: &str,
        intent: TradeIntent,
    ) -> TradeOutcome {
        self.journal.record(format!(
            "Initiating {} trade for {} on token {}...",
            intent.trade_type, intent.amount_input, intent.mint_address
        ));

        match self.run(signer, wallet_address, auth_token, &intent).await {
            Ok(executed) => self.settle(wallet_address, auth_token, &intent, executed).await,
            Err(failure) => self.fail(wallet_address, auth_token, &intent, failure).await,
        }
    }

    async fn run(
        &self,
        signer: &dyn TransactionSigner,
        wallet_address: &str,
        auth_token: &str,
        intent: &TradeIntent,
    ) -> Result<Executed, Failure> {
        intent.validate()?;
        let slippage_bps = intent.slippage_bps.unwrap_or(self.policy.slippage_bps);
        ensure_slippage_bounds(slippage_bps, self.policy.max_slippage_bps)
            .map_err(|e| TradeError::InvalidIntent(e.to_string()))?;

        // 1) Direction + raw amount
        let native = self.policy.native_mint.as_str();
        let (token_in, token_out) = match intent.trade_type {
            TradeType::Buy => (native, intent.mint_address.as_str()),
            TradeType::Sell => (intent.mint_address.as_str(), native),
        };
        let in_decimals = self.chain.token_decimals(token_in).await?;
        let in_amount_raw = to_raw(intent.amount_input, in_decimals)?;
        if in_amount_raw == 0 {
            return Err(TradeError::InvalidIntent(format!(
                "{} at {in_decimals} decimals is below one smallest unit",
                intent.amount_input
            ))
            .into());
        }
        if intent.trade_type == TradeType::Sell {
            self.journal.record(format!(
                "Selling {} of {} ({token_in}), which is {in_amount_raw} in smallest units.",
                intent.amount_input, intent.token_symbol
            ));
        }

        // 2) Quote
        let quote = self
            .backend
            .quote(
                &QuoteRequest {
                    token_in_address: token_in.to_string(),
                    token_out_address: token_out.to_string(),
                    in_amount: in_amount_raw,
                    user_wallet_address: wallet_address.to_string(),
                    slippage: slippage_bps as f64 / 10_000.0,
                },
                auth_token,
            )
            .await?;
        let data = &quote.quote_data;
        self.journal.record(format!(
            "Received quote. Out amount: {} {}",
            to_human(data.out_amount, data.token_out.decimals),
            data.token_out.symbol
        ));

        // 3) Sign locally
        let (signed_tx_base64, blockhash) = sign_quote(signer, &quote.raw_tx_base64)?;
        self.journal
            .record("Transaction signed by wallet. Sending to backend for broadcast...");

        // 4) Broadcast
        let tx_hash = self
            .backend
            .send_signed_transaction(&signed_tx_base64, auth_token)
            .await?;
        self.journal
            .record(format!("Transaction broadcasted. Hash: {tx_hash}"));

        // 5) Confirm
        self.journal
            .record(format!("Waiting for confirmation of transaction: {tx_hash}"));
        if let Err(err) = self
            .chain
            .confirm_transaction(&tx_hash, &blockhash, quote.last_valid_block_height)
            .await
        {
            return Err(Failure {
                err,
                tx_hash: Some(tx_hash),
            });
        }
        self.journal
            .record(format!("Transaction confirmed: https://solscan.io/tx/{tx_hash}"));

        Ok(Executed {
            quote,
            in_amount_raw,
            tx_hash,
        })
    }

    async fn settle(
        &self,
        wallet_address: &str,
        auth_token: &str,
        intent: &TradeIntent,
        executed: Executed,
    ) -> TradeOutcome {
        let native_price = match self.oracle.get_price(&self.policy.native_mint).await {
            Ok(p) => Some(p),
            Err(e) => {
                self.journal.record_warn(format!(
                    "Warning: Could not fetch current SOL price for accurate USD calculations: {e}"
                ));
                None
            }
        };

        let data = &executed.quote.quote_data;
        let econ = compute_economics(intent, data, native_price, &self.policy);
        let hash = &executed.tx_hash;
        let symbol = &intent.token_symbol;

        let log_message = match (intent.trade_type, &econ) {
            (
                TradeType::Buy,
                Economics {
                    entry_price: Some(entry),
                    token_amounts_purchased: Some(tokens),
                    ..
                },
            ) => format!("Successfully bought {tokens:.6} {symbol} for ${entry:.6}. Tx: {hash}"),
            (
                TradeType::Sell,
                Economics {
                    proceeds_usd: Some(usd),
                    profit_usd: Some(profit),
                    ..
                },
            ) => format!(
                "Successfully sold {} {symbol} for ${usd:.6}. Profit: ${profit:.6}. Tx: {hash}",
                intent.amount_input
            ),
            _ => format!(
                "{} successful for {symbol}. Tx: {hash}",
                intent.trade_type.as_str().to_uppercase()
            ),
        };
        self.journal.record(&log_message);

        let price_usd_at_trade = match intent.trade_type {
            TradeType::Buy => econ.entry_price,
            TradeType::Sell => match self.oracle.get_price(&intent.mint_address).await {
                Ok(p) => Some(intent.amount_input * p),
                Err(e) => {
                    warn!(mint = %intent.mint_address, error = %e, "engine.sell_price_unavailable");
                    None
                }
            },
        };
        let price_sol_per_token = (data.in_amount > 0)
            .then(|| data.out_amount as f64 / data.in_amount as f64);

        let record = TradeLogRecord {
            mint_address: intent.mint_address.clone(),
            token_symbol: intent.token_symbol.clone(),
            trade_type: intent.trade_type,
            amount_sol: intent.amount_input,
            amount_tokens: Some(econ.token_amounts_purchased.unwrap_or(intent.amount_input)),
            in_amount_raw: Some(executed.in_amount_raw),
            price_sol_per_token,
            price_usd_at_trade,
            tx_hash: hash.clone(),
            log_message,
            profit_usd: econ.profit_usd,
            profit_sol: econ.profit_sol,
            buy_price: econ.entry_price,
            entry_price: econ.entry_price,
            stop_loss: econ.stop_loss,
            take_profit: econ.take_profit,
            token_amounts_purchased: econ.token_amounts_purchased,
            token_decimals: econ.token_decimals,
            sell_reason: (intent.trade_type == TradeType::Sell)
                .then(|| intent.reason.clone().unwrap_or_else(|| "Manual Sell".to_string())),
            swap_provider: Some(SWAP_PROVIDER.to_string()),
            status: None,
            user_wallet_address: wallet_address.to_string(),
        };
        self.report(&record, auth_token).await;

        info!(
            mint = %intent.mint_address,
            trade_type = %intent.trade_type,
            tx = %hash,
            profit_usd = ?econ.profit_usd,
            "engine.trade_ok"
        );

        TradeOutcome {
            success: true,
            transaction_hash: Some(executed.tx_hash),
            error: None,
            error_kind: None,
            profit_usd: econ.profit_usd,
            profit_sol: econ.profit_sol,
            entry_price: econ.entry_price,
            stop_loss: econ.stop_loss,
            take_profit: econ.take_profit,
            token_amounts_purchased: econ.token_amounts_purchased,
            token_decimals: econ.token_decimals,
        }
    }

    async fn fail(
        &self,
        wallet_address: &str,
        auth_token: &str,
        intent: &TradeIntent,
        failure: Failure,
    ) -> TradeOutcome {
        let message = format!("Trade failed: {}", failure.err);
        self.journal.record_warn(&message);

        let record = TradeLogRecord {
            mint_address: intent.mint_address.clone(),
            token_symbol: intent.token_symbol.clone(),
            trade_type: intent.trade_type,
            amount_sol: intent.amount_input,
            amount_tokens: None,
            in_amount_raw: None,
            price_sol_per_token: None,
            price_usd_at_trade: None,
            tx_hash: failure.tx_hash.clone().unwrap_or_else(|| "N/A".to_string()),
            log_message: format!("FAILED: {message}"),
            profit_usd: None,
            profit_sol: None,
            buy_price: None,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            token_amounts_purchased: None,
            token_decimals: None,
            sell_reason: intent.reason.clone(),
            swap_provider: None,
            status: Some("failed".to_string()),
            user_wallet_address: wallet_address.to_string(),
        };
        self.report(&record, auth_token).await;

        TradeOutcome {
            transaction_hash: failure.tx_hash,
            ..TradeOutcome::failed(&failure.err)
        }
    }

    /// Best-effort ledger write; a failure here never changes the outcome.
    async fn report(&self, record: &TradeLogRecord, auth_token: &str) {
        match self.backend.log_trade(record, auth_token).await {
            Ok(()) => self.journal.record("Trade successfully logged on backend."),
            Err(e) => self
                .journal
                .record_warn(format!("Error logging trade to backend: {e}")),
        }
    }
}

/// Decodes the quote's unsigned transaction, signs it, and re-encodes it.
/// Returns the signed payload and the blockhash it was signed against.
fn sign_quote(
    signer: &dyn TransactionSigner,
    raw_tx_base64: &str,
) -> Result<(String, Hash), TradeError> {
    let engine = base64::engine::general_purpose::STANDARD;
    let bytes = engine
        .decode(raw_tx_base64)
        .map_err(|e| TradeError::QuoteFailed(format!("transaction is not base64: {e}")))?;
    let tx: VersionedTransaction = bincode::deserialize(&bytes)
        .map_err(|e| TradeError::QuoteFailed(format!("undecodable transaction: {e}")))?;

    let signed = signer.sign_transaction(tx)?;
    let blockhash = *signed.message.recent_blockhash();
    let out = bincode::serialize(&signed).map_err(|e| TradeError::SigningFailed(e.to_string()))?;
    Ok((engine.encode(out), blockhash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::QuoteToken;
    use crate::error::ErrorKind;
    use crate::signer::KeypairSigner;
    use crate::test_support::{FakeBackend, FakeChain, FakeOracle, MINT, WALLET};
    use solana_sdk::signature::Keypair;

    const TOKEN: &str = "tok";

    fn quote_data(in_amount: u64, out_amount: u64, decimals: u8) -> QuoteData {
        QuoteData {
            in_amount,
            out_amount,
            token_out: QuoteToken {
                decimals,
                symbol: "X".into(),
            },
        }
    }

    struct Rig {
        engine: Engine,
        backend: Arc<FakeBackend>,
        chain: Arc<FakeChain>,
        signer: KeypairSigner,
    }

    fn rig(sol_price: f64, token_price: f64) -> Rig {
        let signer = KeypairSigner::new(Keypair::new());
        let backend = Arc::new(FakeBackend::new(signer.pubkey()));
        let chain = Arc::new(FakeChain::default());
        let oracle = Arc::new(
            FakeOracle::default()
                .with_price(&TradePolicy::default().native_mint, sol_price)
                .with_price(MINT, token_price),
        );
        let engine = Engine::new(
            backend.clone(),
            oracle,
            chain.clone(),
            TradePolicy::default(),
            Journal::tracing_only(),
        );
        Rig {
            engine,
            backend,
            chain,
            signer,
        }
    }

    #[test]
    fn buy_economics_scale_by_output_decimals() {
        let intent = TradeIntent::buy(MINT, 0.1, "MOON");
        let econ = compute_economics(
            &intent,
            &quote_data(100_000_000, 2_500_000, 6),
            Some(150.0),
            &TradePolicy::default(),
        );
        assert!((econ.entry_price.unwrap() - 15.0).abs() < 1e-9);
        assert!((econ.stop_loss.unwrap() - 10.5).abs() < 1e-9);
        assert!((econ.take_profit.unwrap() - 28.5).abs() < 1e-9);
        assert_eq!(econ.token_amounts_purchased, Some(2.5));
        assert_eq!(econ.token_decimals, Some(6));
        assert!(econ.profit_usd.is_none());
    }

    #[test]
    fn sell_at_entry_value_has_zero_profit() {
        let intent = TradeIntent::sell(MINT, 5.0, "MOON").with_previous_buy_price(10.0);
        // 0.1 SOL back at $100/SOL = $10
        let econ = compute_economics(
            &intent,
            &quote_data(5_000_000, 100_000_000, 9),
            Some(100.0),
            &TradePolicy::default(),
        );
        assert!((econ.proceeds_usd.unwrap() - 10.0).abs() < 1e-9);
        assert!(econ.profit_usd.unwrap().abs() < 1e-9);
        assert!(econ.profit_sol.unwrap().abs() < 1e-9);
    }

    #[test]
    fn sell_without_basis_counts_all_proceeds_as_profit() {
        let intent = TradeIntent::sell(MINT, 5.0, "MOON");
        let econ = compute_economics(
            &intent,
            &quote_data(5_000_000, 200_000_000, 9),
            Some(100.0),
            &TradePolicy::default(),
        );
        assert!((econ.profit_usd.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn economics_without_native_price_leave_usd_empty() {
        let intent = TradeIntent::buy(MINT, 0.1, "MOON");
        let econ = compute_economics(&intent, &quote_data(1, 2_000, 3), None, &TradePolicy::default());
        assert!(econ.entry_price.is_none());
        assert!(econ.stop_loss.is_none());
        assert_eq!(econ.token_amounts_purchased, Some(2.0));
    }

    #[tokio::test]
    async fn buy_runs_full_pipeline() {
        let r = rig(150.0, 6.0);
        *r.backend.out_amount.lock().unwrap() = 2_500_000;

        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;

        assert!(out.success, "{out:?}");
        assert_eq!(out.transaction_hash.as_deref(), Some(FakeBackend::TX_HASH));
        assert!((out.entry_price.unwrap() - 15.0).abs() < 1e-9);
        assert_eq!(out.token_amounts_purchased, Some(2.5));

        let quotes = r.backend.quotes.lock().unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].token_in_address, TradePolicy::default().native_mint);
        assert_eq!(quotes[0].token_out_address, MINT);
        // 0.1 SOL at 9 decimals
        assert_eq!(quotes[0].in_amount, 100_000_000);
        assert!((quotes[0].slippage - 0.005).abs() < 1e-12);

        assert_eq!(r.chain.confirm_calls(), 1);
        let logs = r.backend.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].is_failed());
        assert_eq!(logs[0].stop_loss, out.stop_loss);
        assert!(logs[0].log_message.starts_with("Successfully bought 2.500000 MOON"));
    }

    #[tokio::test]
    async fn signed_payload_is_broadcast() {
        let r = rig(150.0, 6.0);
        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;
        assert!(out.success);

        let sent = r.backend.broadcasts.lock().unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&sent[0])
            .unwrap();
        let tx: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
        assert!(tx.verify_with_results().iter().all(|ok| *ok));
    }

    #[tokio::test]
    async fn sell_converts_with_mint_decimals_and_truncates() {
        let r = rig(100.0, 2.0);
        r.chain.set_decimals(MINT, 6);
        *r.backend.out_amount.lock().unwrap() = 100_000_000;

        let intent = TradeIntent::sell(MINT, 5.1234567, "MOON")
            .with_previous_buy_price(10.0)
            .with_reason("Take Profit");
        let out = r.engine.execute_trade(&r.signer, WALLET, TOKEN, intent).await;

        assert!(out.success);
        assert_eq!(r.backend.quotes.lock().unwrap()[0].in_amount, 5_123_456);
        assert!(out.profit_usd.unwrap().abs() < 1e-9);

        let logs = r.backend.logs.lock().unwrap();
        assert_eq!(logs[0].sell_reason.as_deref(), Some("Take Profit"));
        assert!((logs[0].price_usd_at_trade.unwrap() - 5.1234567 * 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failed_quote_reports_failure_without_hash() {
        let r = rig(150.0, 6.0);
        r.backend.fail_quote(TradeError::QuoteFailed("Internal Server Error".into()));

        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;

        assert!(!out.success);
        assert!(out.transaction_hash.is_none());
        assert_eq!(out.error_kind, Some(ErrorKind::QuoteFailed));
        assert!(out.error.unwrap().starts_with("Failed to get trade quote"));
        assert!(r.backend.broadcasts.lock().unwrap().is_empty());

        let logs = r.backend.logs.lock().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].is_failed());
        assert_eq!(logs[0].tx_hash, "N/A");
        assert!(logs[0].log_message.starts_with("FAILED: Trade failed: Failed to get trade quote"));
    }

    #[tokio::test]
    async fn failed_broadcast_never_confirms() {
        let r = rig(150.0, 6.0);
        r.backend
            .fail_broadcast(TradeError::BroadcastFailed("Blockhash not found".into()));

        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;

        assert!(!out.success);
        assert_eq!(out.error_kind, Some(ErrorKind::BroadcastFailed));
        assert!(out.transaction_hash.is_none());
        assert_eq!(r.chain.confirm_calls(), 0);
        assert!(r.backend.logs.lock().unwrap()[0].is_failed());
    }

    #[tokio::test]
    async fn on_chain_error_is_reverted_and_keeps_hash() {
        let r = rig(150.0, 6.0);
        r.chain
            .fail_confirm(TradeError::TradeReverted("InstructionError(2, Custom(6001))".into()));

        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;

        assert!(!out.success);
        assert_eq!(out.error_kind, Some(ErrorKind::TradeReverted));
        assert_eq!(out.transaction_hash.as_deref(), Some(FakeBackend::TX_HASH));
        let logs = r.backend.logs.lock().unwrap();
        assert_eq!(logs[0].tx_hash, FakeBackend::TX_HASH);
        assert!(logs[0].is_failed());
    }

    #[tokio::test]
    async fn ledger_failure_does_not_overturn_success() {
        let r = rig(150.0, 6.0);
        r.backend
            .fail_log(TradeError::LedgerReportFailed("db down".into()));

        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;

        assert!(out.success);
        assert!(out.error.is_none());
    }

    #[tokio::test]
    async fn missing_native_price_keeps_confirmed_trade_successful() {
        let signer = KeypairSigner::new(Keypair::new());
        let backend = Arc::new(FakeBackend::new(signer.pubkey()));
        let engine = Engine::new(
            backend.clone(),
            Arc::new(FakeOracle::default()),
            Arc::new(FakeChain::default()),
            TradePolicy::default(),
            Journal::tracing_only(),
        );

        let out = engine
            .execute_trade(&signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;

        assert!(out.success);
        assert!(out.entry_price.is_none());
        assert!(backend.logs.lock().unwrap()[0]
            .log_message
            .starts_with("BUY successful for MOON"));
    }

    #[tokio::test]
    async fn invalid_intent_stops_before_quote() {
        let r = rig(150.0, 6.0);
        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.0, "MOON"))
            .await;
        assert_eq!(out.error_kind, Some(ErrorKind::InvalidIntent));
        assert!(r.backend.quotes.lock().unwrap().is_empty());

        let out = r
            .engine
            .execute_trade(
                &r.signer,
                WALLET,
                TOKEN,
                TradeIntent::buy(MINT, 0.1, "MOON").with_slippage_bps(0),
            )
            .await;
        assert_eq!(out.error_kind, Some(ErrorKind::InvalidIntent));
    }

    #[tokio::test]
    async fn dust_below_one_unit_is_rejected() {
        let r = rig(150.0, 6.0);
        r.chain.set_decimals(MINT, 2);
        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::sell(MINT, 0.001, "MOON"))
            .await;
        assert_eq!(out.error_kind, Some(ErrorKind::InvalidIntent));
        assert!(r.backend.quotes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_transaction_payload_fails_before_broadcast() {
        let r = rig(150.0, 6.0);
        *r.backend.raw_tx_override.lock().unwrap() = Some("!!not-base64!!".into());

        let out = r
            .engine
            .execute_trade(&r.signer, WALLET, TOKEN, TradeIntent::buy(MINT, 0.1, "MOON"))
            .await;
        assert_eq!(out.error_kind, Some(ErrorKind::QuoteFailed));
        assert!(r.backend.broadcasts.lock().unwrap().is_empty());
    }
}
