//! Issuance pipeline
//!
//! `MintTxBuilder` runs one issuance end to end:
//! derive → size → build → assemble → sign → submit → confirm.
//! Every stage either hands a typed value to the next or stops the run with
//! an [`IssuanceError`] naming the stage.

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use tracing::{info, warn};

use crate::metrics::{metrics, Timer};
use crate::rpc_manager::LedgerRpc;
use crate::structured_logging::PipelineContext;
use crate::tx_builder::address::derive_holding_address;
use crate::tx_builder::assembler::assemble;
use crate::tx_builder::context::ExecutionContext;
use crate::tx_builder::errors::{IssuanceError, Stage};
use crate::tx_builder::instructions::{plan_mint_instructions, to_base_units, MintPlanParams};
use crate::tx_builder::output::TransactionEnvelope;
use crate::tx_builder::rent::RentSizer;
use crate::tx_builder::submit::{SubmissionClient, SubmissionConfig};

fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn serialize_opt_display<T: Display, S: Serializer>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}

/// What to issue and to whom
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceRequest {
    #[serde(serialize_with = "serialize_display")]
    pub fee_payer: Pubkey,
    #[serde(serialize_with = "serialize_display")]
    pub owner: Pubkey,
    #[serde(serialize_with = "serialize_display")]
    pub mint_authority: Pubkey,
    #[serde(serialize_with = "serialize_opt_display")]
    pub freeze_authority: Option<Pubkey>,
    pub decimals: u8,
    /// Initial supply in whole tokens
    pub supply_tokens: u64,
}

impl IssuanceRequest {
    /// The fee payer owns the supply and holds both authorities
    pub fn for_fee_payer(fee_payer: Pubkey, decimals: u8, supply_tokens: u64) -> Self {
        Self {
            fee_payer,
            owner: fee_payer,
            mint_authority: fee_payer,
            freeze_authority: Some(fee_payer),
            decimals,
            supply_tokens,
        }
    }

    pub fn base_units(&self) -> Result<u64, IssuanceError> {
        to_base_units(self.supply_tokens, self.decimals)
    }
}

/// Outcome of a confirmed issuance
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceReceipt {
    #[serde(serialize_with = "serialize_display")]
    pub mint: Pubkey,
    #[serde(serialize_with = "serialize_display")]
    pub holding_account: Pubkey,
    #[serde(serialize_with = "serialize_display")]
    pub signature: Signature,
    pub base_units: u64,
    pub decimals: u8,
    pub slot: u64,
    pub attempts: u32,
    pub confirmed_at: DateTime<Utc>,
}

impl IssuanceReceipt {
    pub fn to_json(&self) -> Result<String, IssuanceError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| IssuanceError::Internal(format!("receipt serialization: {e}")))
    }
}

pub struct MintTxBuilder<R: LedgerRpc + ?Sized> {
    rpc: Arc<R>,
    submission: SubmissionClient<R>,
    max_attempts: u32,
}

impl<R: LedgerRpc + ?Sized> MintTxBuilder<R> {
    pub fn new(rpc: Arc<R>, config: SubmissionConfig) -> Self {
        Self {
            submission: SubmissionClient::new(rpc.clone(), config),
            rpc,
            max_attempts: 3,
        }
    }

    /// Upper bound on fresh envelopes `issue_with_refresh` will build
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn submission(&self) -> &SubmissionClient<R> {
        &self.submission
    }

    /// Build the unsigned envelope for `request` without submitting it
    ///
    /// Rent is sized before any instruction is built and the liveness token
    /// is fetched last, so a failure in either stops the run before anything
    /// reaches the ledger.
    pub async fn build_envelope(
        &self,
        request: &IssuanceRequest,
        mint: &Pubkey,
        pipeline: &PipelineContext,
    ) -> Result<TransactionEnvelope, IssuanceError> {
        let timer = Timer::new();
        let logger = &pipeline.logger;

        let holding_account = derive_holding_address(mint, &request.owner);
        logger.log_addresses(mint, &holding_account);

        let supply_base_units = request.base_units()?;

        let rent_lamports = RentSizer::new(self.rpc.clone()).mint_record_balance().await?;
        logger.log_stage(Stage::Rent, &format!("mint record needs {rent_lamports} lamports"));

        let plan = plan_mint_instructions(&MintPlanParams {
            fee_payer: request.fee_payer,
            mint: *mint,
            owner: request.owner,
            mint_authority: request.mint_authority,
            freeze_authority: request.freeze_authority,
            decimals: request.decimals,
            supply_base_units,
            rent_lamports,
        })?;
        logger.log_stage(Stage::Build, &format!("{} instructions", plan.instructions.len()));

        let ctx = ExecutionContext::fetch(
            self.rpc.as_ref(),
            request.fee_payer,
            pipeline.child("liveness"),
        )
        .await?;

        let envelope = assemble(&plan, &ctx.fee_payer, &ctx.liveness)?;
        logger.log_envelope(
            envelope.instructions.len(),
            envelope.required_signers.len(),
            envelope.expiry_height,
        );

        timer.observe_duration(&metrics().build_latency);
        Ok(envelope)
    }

    /// Run one attempt: build, sign, submit and wait for confirmation
    ///
    /// `mint` controls the new mint identity; `controllers` must cover the
    /// fee payer and the mint authority.
    pub async fn issue(
        &self,
        request: &IssuanceRequest,
        mint: &Keypair,
        controllers: &[&Keypair],
    ) -> Result<IssuanceReceipt, IssuanceError> {
        let pipeline = PipelineContext::new("issue");
        let result = self.attempt(request, mint, controllers, &pipeline, 1).await;
        if let Err(e) = &result {
            pipeline.logger.log_failure(e);
        }
        result
    }

    /// Like [`issue`](Self::issue), rebuilding with a fresh liveness token
    /// after an expiry
    ///
    /// Other failures are returned as soon as they happen.
    pub async fn issue_with_refresh(
        &self,
        request: &IssuanceRequest,
        mint: &Keypair,
        controllers: &[&Keypair],
    ) -> Result<IssuanceReceipt, IssuanceError> {
        let pipeline = PipelineContext::new("issue_with_refresh");
        let mut attempt = 1;

        loop {
            match self
                .attempt(request, mint, controllers, &pipeline.child("attempt"), attempt)
                .await
            {
                Err(IssuanceError::Expired {
                    signature,
                    expiry_height,
                }) if attempt < self.max_attempts => {
                    warn!(
                        request_id = %pipeline.request_id,
                        attempt,
                        ?signature,
                        expiry_height,
                        "Envelope expired, rebuilding with a fresh blockhash"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    pipeline.logger.log_failure(&e);
                    return Err(e);
                }
                Ok(receipt) => return Ok(receipt),
            }
        }
    }

    async fn attempt(
        &self,
        request: &IssuanceRequest,
        mint: &Keypair,
        controllers: &[&Keypair],
        pipeline: &PipelineContext,
        attempt: u32,
    ) -> Result<IssuanceReceipt, IssuanceError> {
        let mint_pubkey = mint.pubkey();
        let envelope = self.build_envelope(request, &mint_pubkey, pipeline).await?;

        let mut signers: Vec<&Keypair> = Vec::with_capacity(controllers.len() + 1);
        signers.push(mint);
        signers.extend_from_slice(controllers);

        let signed = envelope.sign(&signers)?;
        pipeline
            .logger
            .log_stage(Stage::Sign, &format!("signature={}", signed.signature));

        let timer = Timer::new();
        let confirmed = self.submission.submit_signed(&signed).await?;
        pipeline.logger.log_confirmed(
            &confirmed.signature,
            confirmed.slot,
            (timer.elapsed_secs() * 1000.0) as u64,
        );

        info!(
            request_id = %pipeline.request_id,
            mint = %envelope.mint,
            holding_account = %envelope.holding_account,
            attempt,
            "Issuance complete"
        );

        Ok(IssuanceReceipt {
            mint: envelope.mint,
            holding_account: envelope.holding_account,
            signature: confirmed.signature,
            base_units: request.base_units()?,
            decimals: request.decimals,
            slot: confirmed.slot,
            attempts: attempt,
            confirmed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_for_fee_payer() {
        let payer = Pubkey::new_unique();
        let request = IssuanceRequest::for_fee_payer(payer, 6, 21_000_000);

        assert_eq!(request.owner, payer);
        assert_eq!(request.mint_authority, payer);
        assert_eq!(request.freeze_authority, Some(payer));
        assert_eq!(request.base_units().unwrap(), 21_000_000_000_000);
    }

    #[test]
    fn test_receipt_json_uses_base58() {
        let receipt = IssuanceReceipt {
            mint: Pubkey::new_unique(),
            holding_account: Pubkey::new_unique(),
            signature: Signature::default(),
            base_units: 21_000_000_000_000,
            decimals: 6,
            slot: 7,
            attempts: 1,
            confirmed_at: Utc::now(),
        };

        let json = receipt.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["mint"], receipt.mint.to_string());
        assert_eq!(value["base_units"], 21_000_000_000_000u64);
        assert_eq!(value["signature"], Signature::default().to_string());
    }
}
