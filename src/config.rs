use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Remote services
    pub backend_base_url: String,
    pub price_api_url: String,
    pub rpc_http_url: String,
    pub http_timeout_secs: u64,

    // Session
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub sol_keypair_path: Option<String>,

    // Execution
    pub native_mint: String,
    pub slippage_bps: u64,
    pub max_slippage_bps: u64,
    pub confirm_poll_ms: u64,
    pub confirm_timeout_secs: u64,

    // Exit policy for new buys
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,

    // Monitor
    pub monitor_interval_secs: u64,

    // Audit / alerts
    pub tz: String,
    pub trade_log_path: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub log_json: bool,
}

/// Policy knobs the engine needs, split out so tests can build an engine
/// without a full environment.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePolicy {
    pub native_mint: String,
    pub slippage_bps: u64,
    pub max_slippage_bps: u64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for TradePolicy {
    fn default() -> Self {
        Self {
            native_mint: NATIVE_MINT.to_string(),
            slippage_bps: 50,
            max_slippage_bps: 5_000,
            stop_loss_pct: 0.30,
            take_profit_pct: 0.90,
        }
    }
}

impl TradePolicy {
    pub fn stop_loss_for(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss_pct)
    }

    pub fn take_profit_for(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit_pct)
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{key} has an invalid value: {raw}")),
        _ => Ok(None),
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn ensure_slippage_bounds(slippage_bps: u64, max_slippage_bps: u64) -> Result<()> {
    if slippage_bps == 0 {
        return Err(anyhow!("slippage_bps cannot be 0"));
    }
    if slippage_bps > max_slippage_bps {
        return Err(anyhow!(
            "slippage_bps ({slippage_bps}) exceeds max_slippage_bps ({max_slippage_bps})"
        ));
    }
    Ok(())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let backend_base_url =
            env_opt("FLASH_BACKEND_URL").unwrap_or_else(|| "http://localhost:8000".to_string());
        let price_api_url = env_opt("FLASH_PRICE_URL")
            .unwrap_or_else(|| "https://lite-api.jup.ag/price/v2".to_string());
        let rpc_http_url = env_opt("SOLANA_RPC_HTTP")
            .or_else(|| env_opt("HELIUS_HTTP_URL"))
            .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());
        let http_timeout_secs = env_parse::<u64>("FLASH_HTTP_TIMEOUT_SECS")?.unwrap_or(20);

        let auth_token = env_opt("FLASH_AUTH_TOKEN");
        let sol_keypair_path = env_opt("SOL_KEYPAIR_PATH");

        let native_mint = env_opt("FLASH_NATIVE_MINT").unwrap_or_else(|| NATIVE_MINT.to_string());
        let slippage_bps = env_parse::<u64>("FLASH_SLIPPAGE_BPS")?.unwrap_or(50);
        let max_slippage_bps = env_parse::<u64>("FLASH_MAX_SLIPPAGE_BPS")?.unwrap_or(5_000);
        ensure_slippage_bounds(slippage_bps, max_slippage_bps)?;
        let confirm_poll_ms = env_parse::<u64>("FLASH_CONFIRM_POLL_MS")?.unwrap_or(2_000);
        let confirm_timeout_secs = env_parse::<u64>("FLASH_CONFIRM_TIMEOUT_SECS")?.unwrap_or(90);

        let stop_loss_pct = env_parse::<f64>("FLASH_STOP_LOSS_PCT")?.unwrap_or(0.30);
        let take_profit_pct = env_parse::<f64>("FLASH_TAKE_PROFIT_PCT")?.unwrap_or(0.90);

        let monitor_interval_secs = env_parse::<u64>("FLASH_MONITOR_INTERVAL_SECS")?.unwrap_or(60);

        let tz = env_opt("FLASH_TZ").unwrap_or_else(|| "UTC".to_string());
        let trade_log_path = env_opt("FLASH_TRADE_LOG");
        let slack_webhook_url = env_opt("SLACK_WEBHOOK_URL");
        let log_json = env_opt("LOG_FORMAT").map(|f| f.eq_ignore_ascii_case("json")).unwrap_or(false)
            || env_bool("FLASH_LOG_JSON", false);

        let cfg = Self {
            backend_base_url,
            price_api_url,
            rpc_http_url,
            http_timeout_secs,
            auth_token,
            sol_keypair_path,
            native_mint,
            slippage_bps,
            max_slippage_bps,
            confirm_poll_ms,
            confirm_timeout_secs,
            stop_loss_pct,
            take_profit_pct,
            monitor_interval_secs,
            tz,
            trade_log_path,
            slack_webhook_url,
            log_json,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(anyhow!("FLASH_STOP_LOSS_PCT must be within (0, 1)"));
        }
        if !(self.take_profit_pct > 0.0 && self.take_profit_pct.is_finite()) {
            return Err(anyhow!("FLASH_TAKE_PROFIT_PCT must be positive"));
        }
        if self.monitor_interval_secs == 0 {
            return Err(anyhow!("FLASH_MONITOR_INTERVAL_SECS must be positive"));
        }
        if self.confirm_poll_ms == 0 || self.http_timeout_secs == 0 {
            return Err(anyhow!("poll interval and http timeout must be positive"));
        }
        ensure_slippage_bounds(self.slippage_bps, self.max_slippage_bps)?;
        self.tz
            .parse::<chrono_tz::Tz>()
            .map_err(|_| anyhow!("invalid tz: {}", self.tz))?;
        Ok(())
    }

    pub fn policy(&self) -> TradePolicy {
        TradePolicy {
            native_mint: self.native_mint.clone(),
            slippage_bps: self.slippage_bps,
            max_slippage_bps: self.max_slippage_bps,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn confirm_poll(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}
