use anyhow::{anyhow, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;

use crate::error::TradeError;

/// The only capability that touches key material. Signs locally; the key
/// never leaves the process.
pub trait TransactionSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Applies exactly one signature (the wallet's) to `tx`.
    fn sign_transaction(&self, tx: VersionedTransaction) -> Result<VersionedTransaction, TradeError>;
}

pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let keypair =
            read_keypair_file(path).map_err(|e| anyhow!("failed to read keypair {path}: {e}"))?;
        Ok(Self::new(keypair))
    }
}

impl TransactionSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign_transaction(&self, tx: VersionedTransaction) -> Result<VersionedTransaction, TradeError> {
        let required = tx.message.header().num_required_signatures as usize;
        if required != 1 {
            return Err(TradeError::SigningFailed(format!(
                "expected exactly one required signer, transaction needs {required}"
            )));
        }
        VersionedTransaction::try_new(tx.message, &[&self.keypair])
            .map_err(|e| TradeError::SigningFailed(e.to_string()))
    }
}
