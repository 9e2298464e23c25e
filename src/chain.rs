use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::TransactionStatus;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::TradeError;

/// On-chain reads the pipeline needs.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Decimal count reported by the mint account.
    async fn token_decimals(&self, mint: &str) -> Result<u8, TradeError>;

    /// Waits until `signature` is confirmed, the block height passes
    /// `last_valid_block_height`, or the local timeout elapses.
    async fn confirm_transaction(
        &self,
        signature: &str,
        blockhash: &Hash,
        last_valid_block_height: u64,
    ) -> Result<(), TradeError>;
}

/// `Some` once the status is final for our purposes: reverted, or landed at
/// `commitment`.
fn settled(status: &TransactionStatus, commitment: CommitmentConfig) -> Option<Result<(), TradeError>> {
    if let Some(err) = &status.err {
        return Some(Err(TradeError::TradeReverted(format!("{err:?}"))));
    }
    status.satisfies_commitment(commitment).then_some(Ok(()))
}

#[derive(Clone)]
pub struct RpcChain {
    rpc: Arc<RpcClient>,
    poll_interval: Duration,
    timeout: Duration,
}

impl RpcChain {
    pub fn new(rpc_url: String, poll_interval: Duration, timeout: Duration) -> Self {
        let rpc = RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed());
        Self {
            rpc: Arc::new(rpc),
            poll_interval,
            timeout,
        }
    }
}

#[async_trait]
impl ChainClient for RpcChain {
    async fn token_decimals(&self, mint: &str) -> Result<u8, TradeError> {
        let lookup_err = |detail: String| TradeError::MintLookupFailed {
            mint: mint.to_string(),
            detail,
        };
        let pubkey = Pubkey::from_str(mint).map_err(|e| lookup_err(e.to_string()))?;
        let supply = self
            .rpc
            .get_token_supply(&pubkey)
            .await
            .map_err(|e| lookup_err(e.to_string()))?;
        Ok(supply.decimals)
    }

    async fn confirm_transaction(
        &self,
        signature: &str,
        blockhash: &Hash,
        last_valid_block_height: u64,
    ) -> Result<(), TradeError> {
        let sig = Signature::from_str(signature)
            .map_err(|e| TradeError::ConfirmationFailed(format!("bad signature {signature}: {e}")))?;
        let deadline = Instant::now() + self.timeout;
        let commitment = CommitmentConfig::confirmed();

        loop {
            // RPC errors are transient here: the transaction may already have
            // landed, so keep polling until a hard bound is hit.
            match self.rpc.get_signature_statuses(&[sig]).await {
                Ok(statuses) => {
                    if let Some(Some(status)) = statuses.value.first() {
                        if let Some(settled) = settled(status, commitment) {
                            return settled;
                        }
                    }
                }
                Err(e) => warn!(%signature, error = %e, "chain.confirm.status_rpc_error"),
            }

            let height = match self.rpc.get_block_height().await {
                Ok(height) => Some(height),
                Err(e) => {
                    warn!(%signature, error = %e, "chain.confirm.height_rpc_error");
                    None
                }
            };
            if let Some(height) = height.filter(|h| *h > last_valid_block_height) {
                return Err(TradeError::ConfirmationFailed(format!(
                    "block height exceeded: {height} > {last_valid_block_height} (blockhash {blockhash})"
                )));
            }
            if Instant::now() >= deadline {
                return Err(TradeError::ConfirmationFailed(format!(
                    "timed out after {:?} waiting for {signature}",
                    self.timeout
                )));
            }

            debug!(%signature, ?height, last_valid_block_height, "chain.confirm.pending");
            sleep(self.poll_interval).await;
        }
    }
}
