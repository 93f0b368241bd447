//! Execution context for transaction building
//!
//! Holds the liveness token an envelope is anchored to, fetched fresh for
//! every attempt, together with the pipeline context used to correlate logs.

use solana_sdk::{hash::Hash, pubkey::Pubkey};

use crate::rpc_manager::{LedgerRpc, LivenessToken};
use crate::structured_logging::PipelineContext;
use crate::tx_builder::errors::{IssuanceError, Stage};

/// Execution context for building one envelope
///
/// A context is never reused across attempts: once its blockhash window has
/// elapsed a new one must be fetched.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Recent blockhash and the last block height it stays valid for
    pub liveness: LivenessToken,

    /// Account paying the transaction fee
    pub fee_payer: Pubkey,

    pub pipeline: PipelineContext,
}

impl ExecutionContext {
    /// Fetch a fresh liveness token from the ledger
    pub async fn fetch<R: LedgerRpc + ?Sized>(
        rpc: &R,
        fee_payer: Pubkey,
        pipeline: PipelineContext,
    ) -> Result<Self, IssuanceError> {
        let liveness = rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| IssuanceError::from_rpc(e, Stage::Liveness))?;

        pipeline.logger.log_stage(
            Stage::Liveness,
            &format!(
                "blockhash={} last_valid_block_height={}",
                liveness.blockhash, liveness.last_valid_block_height
            ),
        );

        Ok(Self {
            liveness,
            fee_payer,
            pipeline,
        })
    }

    pub fn blockhash(&self) -> Hash {
        self.liveness.blockhash
    }

    pub fn expiry_height(&self) -> u64 {
        self.liveness.last_valid_block_height
    }
}
