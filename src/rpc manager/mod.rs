//! RPC Manager Module
//!
//! The ledger-facing collaborator consumed by the issuance pipeline. The
//! pipeline only talks to the [`LedgerRpc`] trait; [`SolanaRpc`] is the
//! production implementation and the in-memory ledger in `test_utils`
//! backs the tests.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::{Transaction, TransactionError},
};

// Submodules
pub mod rpc_errors;
pub mod solana_rpc;

// Re-exports for convenience
pub use rpc_errors::{retry_transient, RetryPolicy, RpcManagerError};
pub use solana_rpc::SolanaRpc;

/// Recent blockhash together with the last block height at which a
/// transaction referencing it is still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessToken {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Commitment a signature status has reached, ordered weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl ConfirmationLevel {
    /// Whether a status at `self` satisfies a caller asking for `target`
    pub fn satisfies(self, target: ConfirmationLevel) -> bool {
        self >= target
    }

    pub fn as_commitment(self) -> CommitmentConfig {
        match self {
            ConfirmationLevel::Processed => CommitmentConfig::processed(),
            ConfirmationLevel::Confirmed => CommitmentConfig::confirmed(),
            ConfirmationLevel::Finalized => CommitmentConfig::finalized(),
        }
    }
}

impl fmt::Display for ConfirmationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfirmationLevel::Processed => "processed",
            ConfirmationLevel::Confirmed => "confirmed",
            ConfirmationLevel::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

impl FromStr for ConfirmationLevel {
    type Err = RpcManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(ConfirmationLevel::Processed),
            "confirmed" => Ok(ConfirmationLevel::Confirmed),
            "finalized" | "finalised" => Ok(ConfirmationLevel::Finalized),
            other => Err(RpcManagerError::Validation(format!(
                "unknown commitment level '{}'",
                other
            ))),
        }
    }
}

/// Status of a submitted signature as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// Set when the transaction landed but one of its instructions failed
    pub err: Option<TransactionError>,
    pub confirmation: ConfirmationLevel,
}

/// Ledger RPC surface the issuance pipeline needs
#[async_trait]
pub trait LedgerRpc: Send + Sync + fmt::Debug {
    /// Human-readable endpoint identifier used in errors and logs
    fn endpoint(&self) -> String;

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, RpcManagerError>;

    async fn get_latest_blockhash(&self) -> Result<LivenessToken, RpcManagerError>;

    async fn get_block_height(&self) -> Result<u64, RpcManagerError>;

    async fn send_transaction(&self, transaction: &Transaction)
        -> Result<Signature, RpcManagerError>;

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError>;

    /// Faucet collaborator; only meaningful on test networks
    async fn request_airdrop(
        &self,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, RpcManagerError>;
}
