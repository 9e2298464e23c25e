use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use flash_sniper::config::Config;
use flash_sniper::logger;
use flash_sniper::notifier::Notifier;
use flash_sniper::{
    BackendClient, Engine, Journal, KeypairSigner, PositionMonitor, PriceClient, PriceOracle,
    RpcChain, TradeIntent, TransactionSigner,
};

#[derive(Parser)]
#[command(name = "flash_sniper", about = "DEX swap execution and SL/TP position monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch open positions and exit on stop-loss / take-profit (default).
    Monitor,
    /// Spend native SOL on a token.
    Buy {
        #[arg(long)]
        mint: String,
        #[arg(long)]
        amount_sol: f64,
        #[arg(long, default_value = "")]
        symbol: String,
        #[arg(long)]
        slippage_bps: Option<u64>,
    },
    /// Sell a human-scaled token amount back to SOL.
    Sell {
        #[arg(long)]
        mint: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "")]
        symbol: String,
        /// USD cost basis used for the profit figure.
        #[arg(long)]
        previous_buy_price: Option<f64>,
        #[arg(long, default_value = "Manual")]
        reason: String,
        #[arg(long)]
        slippage_bps: Option<u64>,
    },
    /// Print the current USD price of a token.
    Price {
        #[arg(long)]
        mint: String,
    },
}

struct App {
    cfg: Config,
    journal: Journal,
    oracle: Arc<PriceClient>,
    backend: Arc<BackendClient>,
}

impl App {
    fn new(cfg: Config) -> Result<Self> {
        let journal = Journal::new(cfg.trade_log_path.clone(), &cfg.tz)?;
        let oracle = Arc::new(PriceClient::new(cfg.price_api_url.clone(), cfg.http_timeout())?);
        let backend = Arc::new(BackendClient::new(cfg.backend_base_url.clone(), cfg.http_timeout())?);
        Ok(Self { cfg, journal, oracle, backend })
    }

    fn engine(&self) -> Engine {
        let chain = Arc::new(RpcChain::new(
            self.cfg.rpc_http_url.clone(),
            self.cfg.confirm_poll(),
            self.cfg.confirm_timeout(),
        ));
        Engine::new(
            self.backend.clone(),
            self.oracle.clone(),
            chain,
            self.cfg.policy(),
            self.journal.clone(),
        )
    }

    fn signer(&self) -> Result<KeypairSigner> {
        let path = self
            .cfg
            .sol_keypair_path
            .as_deref()
            .ok_or_else(|| anyhow!("SOL_KEYPAIR_PATH is required"))?;
        KeypairSigner::from_file(path)
    }

    fn auth_token(&self) -> Result<String> {
        self.cfg
            .auth_token
            .clone()
            .ok_or_else(|| anyhow!("FLASH_AUTH_TOKEN is required"))
    }

    async fn trade(&self, intent: TradeIntent) -> Result<()> {
        let signer = self.signer()?;
        let auth_token = self.auth_token()?;
        let wallet = signer.pubkey().to_string();

        let outcome = self
            .engine()
            .execute_trade(&signer, &wallet, &auth_token, intent)
            .await;
        println!("{}", serde_json::to_string_pretty(&outcome)?);

        if !outcome.success {
            return Err(anyhow!(outcome.error.unwrap_or_else(|| "trade failed".into())));
        }
        Ok(())
    }

    async fn monitor(&self) -> Result<()> {
        let signer: Arc<dyn TransactionSigner> = Arc::new(self.signer()?);
        if self.cfg.auth_token.is_none() {
            warn!("FLASH_AUTH_TOKEN not set; monitor stays idle");
        }

        let mut monitor = PositionMonitor::new(
            Arc::new(self.engine()),
            self.oracle.clone(),
            self.backend.clone(),
            signer,
            self.cfg.auth_token.clone(),
            self.journal.clone(),
        );
        if let Some(n) = Notifier::from_url(self.cfg.slack_webhook_url.clone(), self.cfg.http_timeout())? {
            monitor = monitor.with_notifier(n);
        }

        let handle = Arc::new(monitor).start(self.cfg.monitor_interval());
        tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
        info!("shutdown requested; waiting for in-flight cycle");
        handle.stop().await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present (no-op in prod/systemd envs)
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let cfg = Config::from_env()?;
    logger::init_tracing(cfg.log_json);
    info!(
        backend = %cfg.backend_base_url,
        rpc = %cfg.rpc_http_url,
        price = %cfg.price_api_url,
        interval_secs = cfg.monitor_interval_secs,
        slippage_bps = cfg.slippage_bps,
        "boot"
    );

    let app = App::new(cfg)?;
    match cli.command.unwrap_or(Command::Monitor) {
        Command::Monitor => app.monitor().await,
        Command::Buy { mint, amount_sol, symbol, slippage_bps } => {
            let mut intent = TradeIntent::buy(mint, amount_sol, symbol);
            intent.slippage_bps = slippage_bps;
            app.trade(intent).await
        }
        Command::Sell { mint, amount, symbol, previous_buy_price, reason, slippage_bps } => {
            let mut intent = TradeIntent::sell(mint, amount, symbol).with_reason(reason);
            intent.previous_buy_price = previous_buy_price;
            intent.slippage_bps = slippage_bps;
            app.trade(intent).await
        }
        Command::Price { mint } => {
            let price = app.oracle.get_price(&mint).await?;
            println!("{price}");
            Ok(())
        }
    }
}
