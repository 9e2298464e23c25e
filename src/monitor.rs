//! Position Monitor.
//!
//! Each cycle walks the last position snapshot in order, prices every
//! holding, and exits the ones that crossed take-profit or stop-loss through
//! the engine. The snapshot is refetched only when it is stale: on start, on
//! a new auth token, after a successful exit, or on `request_refresh()`.
//!
//! Cycles never overlap. The timer task awaits each cycle inline and skips
//! missed ticks; a manual `run_cycle()` that finds a cycle in flight returns
//! immediately with `overlapped = true`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::backend::PositionSource;
use crate::domain::{ExitReason, Position, TradeIntent, TradeOutcome};
use crate::engine::Engine;
use crate::error::TradeError;
use crate::journal::Journal;
use crate::notifier::Notifier;
use crate::price::PriceOracle;
use crate::signer::TransactionSigner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Fetching,
    Cycling,
    Waiting,
}

/// Exit decision for a holding worth `current_value` USD. Take-profit is
/// checked first so a value inside both thresholds exits as a profit.
pub fn decide(position: &Position, current_value: f64) -> Option<ExitReason> {
    if current_value >= position.take_profit {
        Some(ExitReason::TakeProfit)
    } else if current_value <= position.stop_loss {
        Some(ExitReason::StopLoss)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckStatus {
    /// Inside the SL/TP band.
    Held { value: f64 },
    /// Exit triggered; the outcome says whether the sell landed.
    Exited {
        reason: ExitReason,
        value: f64,
        outcome: TradeOutcome,
    },
    /// No price this cycle; retried next cycle.
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionCheck {
    pub mint_address: String,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub checks: Vec<PositionCheck>,
    /// Auth expired; remaining positions were not evaluated.
    pub halted: bool,
    /// Another cycle was still running.
    pub overlapped: bool,
    /// No session or nothing to monitor.
    pub idle: bool,
}

impl CycleReport {
    pub fn triggered(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Exited { .. }))
            .count()
    }

    pub fn evaluated(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Held { .. } | CheckStatus::Exited { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Failed(_)))
            .count()
    }

    pub fn sold(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(&c.status, CheckStatus::Exited { outcome, .. } if outcome.success))
            .count()
    }

    pub fn status_of(&self, mint: &str) -> Option<&CheckStatus> {
        self.checks
            .iter()
            .find(|c| c.mint_address == mint)
            .map(|c| &c.status)
    }
}

pub struct PositionMonitor {
    engine: Arc<Engine>,
    oracle: Arc<dyn PriceOracle>,
    source: Arc<dyn PositionSource>,
    signer: Arc<dyn TransactionSigner>,
    wallet_address: String,
    auth_token: RwLock<Option<String>>,
    snapshot: Mutex<Vec<Position>>,
    stale: AtomicBool,
    /// Mints sold since the last good fetch; never re-evaluated from the old
    /// snapshot.
    exited: Mutex<HashSet<String>>,
    cycle_lock: tokio::sync::Mutex<()>,
    state: Mutex<MonitorState>,
    journal: Journal,
    notifier: Option<Notifier>,
}

/// Running timer task. Dropping the handle detaches the task, which keeps
/// ticking until the runtime shuts down; call `stop()` to cancel it.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Prevents further cycles and waits for an in-flight one to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "monitor.task_join_failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl PositionMonitor {
    pub fn new(
        engine: Arc<Engine>,
        oracle: Arc<dyn PriceOracle>,
        source: Arc<dyn PositionSource>,
        signer: Arc<dyn TransactionSigner>,
        auth_token: Option<String>,
        journal: Journal,
    ) -> Self {
        let wallet_address = signer.pubkey().to_string();
        Self {
            engine,
            oracle,
            source,
            signer,
            wallet_address,
            auth_token: RwLock::new(auth_token),
            snapshot: Mutex::new(Vec::new()),
            stale: AtomicBool::new(true),
            exited: Mutex::new(HashSet::new()),
            cycle_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(MonitorState::Idle),
            journal,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn wallet_address(&self) -> &str {
        &self.wallet_address
    }

    pub fn state(&self) -> MonitorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: MonitorState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    fn auth_token(&self) -> Option<String> {
        self.auth_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Session change. A new token forces a refetch on the next cycle;
    /// `None` puts the monitor in Idle.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write().unwrap_or_else(|e| e.into_inner()) = token;
        self.stale.store(true, Ordering::SeqCst);
    }

    pub fn request_refresh(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Position> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Spawns the periodic task. The first cycle runs immediately.
    pub fn start(self: Arc<Self>, interval: Duration) -> MonitorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let monitor = self;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(wallet = %monitor.wallet_address, interval_secs = interval.as_secs(), "monitor.start");

            let mut detached = false;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown_rx.changed(), if !detached => {
                        match changed {
                            Ok(()) if *shutdown_rx.borrow() => break,
                            Ok(()) => continue,
                            Err(_) => {
                                detached = true;
                                continue;
                            }
                        }
                    }
                }
                monitor.run_cycle().await;
            }

            monitor.set_state(MonitorState::Idle);
            info!(wallet = %monitor.wallet_address, "monitor.stopped");
        });
        MonitorHandle { shutdown, task }
    }

    async fn refresh(&self, auth_token: &str) -> Result<(), TradeError> {
        self.set_state(MonitorState::Fetching);
        let positions = self
            .source
            .fetch_positions(&self.wallet_address, auth_token)
            .await?;
        self.journal.record(format!(
            "Fetched {} active positions to monitor.",
            positions.len()
        ));
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = positions;
        self.exited.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }

    /// One monitoring pass over the current snapshot.
    pub async fn run_cycle(&self) -> CycleReport {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!(wallet = %self.wallet_address, "monitor.cycle_overlap_skipped");
            return CycleReport {
                overlapped: true,
                ..CycleReport::default()
            };
        };

        let mut report = CycleReport::default();
        let Some(auth_token) = self.auth_token() else {
            self.set_state(MonitorState::Idle);
            report.idle = true;
            return report;
        };

        if self.stale.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.refresh(&auth_token).await {
                self.stale.store(true, Ordering::SeqCst);
                self.journal
                    .record_warn(format!("Error fetching active positions: {e}"));
                if e.is_auth_expired() {
                    report.halted = true;
                    self.set_state(MonitorState::Idle);
                    return report;
                }
            }
        }

        let exited = self.exited.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let positions: Vec<Position> = self
            .snapshot()
            .into_iter()
            .filter(|p| !exited.contains(&p.mint_address))
            .collect();
        if positions.is_empty() {
            self.set_state(MonitorState::Idle);
            report.idle = true;
            return report;
        }

        self.set_state(MonitorState::Cycling);
        self.journal.record("Starting monitoring cycle...");

        for position in &positions {
            let status = match self.evaluate(position, &auth_token).await {
                Ok(status) => status,
                Err(TradeError::PriceUnavailable(detail)) => {
                    self.journal.record_warn(format!(
                        "Could not get current price for {}. Skipping monitor.",
                        position.token_name
                    ));
                    CheckStatus::Skipped(detail)
                }
                Err(e) => {
                    self.journal.record_warn(format!(
                        "Error monitoring/selling {}: {e}",
                        position.token_name
                    ));
                    CheckStatus::Failed(e.to_string())
                }
            };

            let auth_lost = matches!(
                &status,
                CheckStatus::Exited { outcome, .. } if outcome.is_auth_expired()
            );
            report.checks.push(PositionCheck {
                mint_address: position.mint_address.clone(),
                status,
            });

            if auth_lost {
                self.journal.record_warn(
                    "Authentication expired; halting the rest of this monitoring cycle.",
                );
                report.halted = true;
                break;
            }
        }

        self.journal.record("Monitoring cycle complete.");
        self.set_state(MonitorState::Waiting);
        report
    }

    /// Prices one position and, if it crossed a threshold, sells all of it.
    pub async fn evaluate(
        &self,
        position: &Position,
        auth_token: &str,
    ) -> Result<CheckStatus, TradeError> {
        let name = &position.token_name;
        let price = self.oracle.get_price(&position.mint_address).await?;
        let value = price * position.token_amounts_purchased;
        self.journal.record(format!(
            "Monitoring {name} ({}): Current Total Value: ${value:.6}",
            position.mint_address
        ));

        let Some(reason) = decide(position, value) else {
            self.journal.record(format!("{name}: Not yet at SL/TP."));
            return Ok(CheckStatus::Held { value });
        };

        match reason {
            ExitReason::TakeProfit => self
                .journal
                .record(format!("TAKE PROFIT for {name}! Current value: ${value:.6}")),
            _ => self
                .journal
                .record(format!("STOP LOSS for {name}! Current value: ${value:.6}")),
        }
        self.journal
            .record(format!("Initiating SELL for {name} due to {reason}."));

        let outcome = self
            .engine
            .execute_trade(
                self.signer.as_ref(),
                &self.wallet_address,
                auth_token,
                TradeIntent::exit(position, reason),
            )
            .await;

        let line = if outcome.success {
            // Backend drops the position; pick that up next cycle.
            self.exited
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(position.mint_address.clone());
            self.stale.store(true, Ordering::SeqCst);
            format!("Successfully sold {name} ({reason}).")
        } else {
            format!(
                "Failed to sell {name}: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        };
        if outcome.success {
            self.journal.record(&line);
        } else {
            self.journal.record_warn(&line);
        }
        self.alert(&line).await;

        Ok(CheckStatus::Exited {
            reason,
            value,
            outcome,
        })
    }

    async fn alert(&self, text: &str) {
        let Some(notifier) = self.notifier.as_ref() else {
            return;
        };
        if let Err(e) = notifier.alert(text).await {
            warn!(error = %e, "monitor.alert_failed");
        }
    }
}
