//! Submission and confirmation
//!
//! Sends a signed envelope, retrying only transport failures, then polls
//! its status until the requested commitment is reached or the blockhash
//! window closes. Program errors are attributed to an instruction using the
//! canonical layout so the caller gets a typed failure.

use std::sync::Arc;
use std::time::Duration;

#[allow(deprecated)]
use solana_sdk::system_instruction::SystemError;
use solana_sdk::{
    instruction::InstructionError, signature::Keypair, signature::Signature,
    transaction::TransactionError,
};
use spl_token::error::TokenError;
use tracing::{debug, info, warn};

use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{
    retry_transient, ConfirmationLevel, LedgerRpc, RetryPolicy, RpcManagerError,
};
use crate::tx_builder::errors::{IssuanceError, Stage};
use crate::tx_builder::instructions::MintInstructionKind;
use crate::tx_builder::output::{SignedEnvelope, SubmissionState, TransactionEnvelope};

const SYSTEM_ACCOUNT_ALREADY_IN_USE: u32 = SystemError::AccountAlreadyInUse as u32;
const TOKEN_MINT_DECIMALS_MISMATCH: u32 = TokenError::MintDecimalsMismatch as u32;

/// Submission tuning
#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    /// Commitment the caller waits for
    pub commitment: ConfirmationLevel,
    pub poll_interval: Duration,
    /// Resend the same bytes every N polls while unseen (0 disables)
    pub rebroadcast_every: u32,
    pub retry_policy: RetryPolicy,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            commitment: ConfirmationLevel::Finalized,
            poll_interval: Duration::from_millis(500),
            rebroadcast_every: 4,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// A submission that reached the requested commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedSubmission {
    pub signature: Signature,
    pub slot: u64,
    pub confirmation: ConfirmationLevel,
    /// Sends needed to get the first acceptance, transport retries included
    pub send_attempts: u32,
}

enum PollOutcome {
    Confirmed(ConfirmedSubmission),
    Failed(IssuanceError),
    Pending { landed: bool },
}

pub struct SubmissionClient<R: LedgerRpc + ?Sized> {
    rpc: Arc<R>,
    config: SubmissionConfig,
}

impl<R: LedgerRpc + ?Sized> SubmissionClient<R> {
    pub fn new(rpc: Arc<R>, config: SubmissionConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Sign `envelope` with `controllers`, send it and wait for confirmation
    pub async fn submit(
        &self,
        envelope: &TransactionEnvelope,
        controllers: &[&Keypair],
    ) -> Result<ConfirmedSubmission, IssuanceError> {
        let signed = envelope.sign(controllers)?;
        self.submit_signed(&signed).await
    }

    /// Send an already signed envelope and wait for confirmation
    pub async fn submit_signed(
        &self,
        signed: &SignedEnvelope,
    ) -> Result<ConfirmedSubmission, IssuanceError> {
        metrics().submissions_total.inc();
        let timer = Timer::new();

        let result = match self.send(signed).await {
            Ok(send_attempts) => self.confirm(signed, send_attempts).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(confirmed) => {
                metrics().confirmed_total.inc();
                timer.observe_duration(&metrics().confirm_latency);
                info!(
                    signature = %confirmed.signature,
                    slot = confirmed.slot,
                    confirmation = %confirmed.confirmation,
                    send_attempts = confirmed.send_attempts,
                    "Submission confirmed"
                );
            }
            Err(IssuanceError::Expired { .. }) => metrics().expired_total.inc(),
            Err(IssuanceError::NetworkUnavailable { .. }) => {
                metrics().network_failures_total.inc()
            }
            Err(_) => metrics().rejected_total.inc(),
        }

        result
    }

    /// Send with transport retries; returns the number of sends made
    async fn send(&self, signed: &SignedEnvelope) -> Result<u32, IssuanceError> {
        let mut attempts = 0u32;
        let sent = retry_transient(
            &self.config.retry_policy,
            "send_transaction",
            || {
                attempts += 1;
                self.rpc.send_transaction(&signed.transaction)
            },
            |_| metrics().transport_retries_total.inc(),
        )
        .await;

        match sent {
            Ok(signature) => {
                debug!(%signature, attempts, "Envelope accepted for processing");
                Ok(attempts)
            }
            // An earlier attempt landed even though its response was lost
            Err(RpcManagerError::TransactionRejected {
                error: TransactionError::AlreadyProcessed,
                ..
            }) => {
                debug!(signature = %signed.signature, "Envelope already processed");
                Ok(attempts)
            }
            Err(e) => Err(self.classify_rpc_error(e, signed, Stage::Send)),
        }
    }

    async fn confirm(
        &self,
        signed: &SignedEnvelope,
        send_attempts: u32,
    ) -> Result<ConfirmedSubmission, IssuanceError> {
        let signature = signed.signature;
        let mut polls = 0u32;
        let mut consecutive_failures = 0u32;

        loop {
            match self.poll_once(signed, send_attempts).await {
                Ok(PollOutcome::Confirmed(confirmed)) => return Ok(confirmed),
                Ok(PollOutcome::Failed(err)) => {
                    if matches!(err, IssuanceError::Expired { .. }) {
                        warn!(
                            %signature,
                            expiry_height = signed.expiry_height,
                            "Blockhash window elapsed before confirmation"
                        );
                    }
                    return Err(err);
                }
                Ok(PollOutcome::Pending { landed }) => {
                    consecutive_failures = 0;
                    if !landed {
                        polls += 1;
                        if self.config.rebroadcast_every > 0
                            && polls % self.config.rebroadcast_every == 0
                        {
                            self.rebroadcast(signed).await?;
                        }
                    }
                }
                // Status and height queries share one budget of consecutive failures
                Err(e) if e.is_retryable() => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.config.retry_policy.max_attempts {
                        return Err(IssuanceError::from_rpc(e, Stage::Confirm));
                    }
                    warn!(%signature, error = %e, consecutive_failures, "Confirmation poll failed");
                }
                Err(e) => return Err(self.classify_rpc_error(e, signed, Stage::Confirm)),
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// One status read followed by one expiry check
    ///
    /// The expiry check runs whether or not the ledger has seen the
    /// signature: below the requested commitment the envelope is still
    /// bounded by its blockhash window.
    async fn poll_once(
        &self,
        signed: &SignedEnvelope,
        send_attempts: u32,
    ) -> Result<PollOutcome, RpcManagerError> {
        let signature = signed.signature;
        let status = self.rpc.get_signature_status(&signature).await?;

        if let Some(status) = &status {
            if let Some(err) = &status.err {
                return Ok(PollOutcome::Failed(classify_transaction_error(
                    err.clone(),
                    signed,
                    Stage::Confirm,
                )));
            }
            if status.confirmation.satisfies(self.config.commitment) {
                return Ok(PollOutcome::Confirmed(ConfirmedSubmission {
                    signature,
                    slot: status.slot,
                    confirmation: status.confirmation,
                    send_attempts,
                }));
            }
            debug!(%signature, confirmation = %status.confirmation, "Awaiting commitment");
        }

        let height = self.rpc.get_block_height().await?;
        if height > signed.expiry_height {
            return Ok(PollOutcome::Failed(IssuanceError::Expired {
                signature: Some(signature),
                expiry_height: signed.expiry_height,
            }));
        }

        Ok(PollOutcome::Pending {
            landed: status.is_some(),
        })
    }

    async fn rebroadcast(&self, signed: &SignedEnvelope) -> Result<(), IssuanceError> {
        metrics().rebroadcasts_total.inc();
        match self.rpc.send_transaction(&signed.transaction).await {
            Ok(_) => Ok(()),
            Err(RpcManagerError::TransactionRejected {
                error: TransactionError::AlreadyProcessed,
                ..
            }) => Ok(()),
            Err(e) if e.is_retryable() => {
                debug!(signature = %signed.signature, error = %e, "Rebroadcast failed");
                Ok(())
            }
            Err(e) => Err(self.classify_rpc_error(e, signed, Stage::Send)),
        }
    }

    /// Where an earlier, possibly abandoned submission ended up
    pub async fn status_of(
        &self,
        signature: &Signature,
        expiry_height: u64,
    ) -> Result<SubmissionState, IssuanceError> {
        let status = self
            .rpc
            .get_signature_status(signature)
            .await
            .map_err(|e| IssuanceError::from_rpc(e, Stage::Confirm))?;

        match status {
            Some(status) if status.err.is_some() => Ok(SubmissionState::Rejected),
            Some(status) if status.confirmation.satisfies(self.config.commitment) => {
                Ok(SubmissionState::Confirmed)
            }
            _ => {
                let height = self
                    .rpc
                    .get_block_height()
                    .await
                    .map_err(|e| IssuanceError::from_rpc(e, Stage::Confirm))?;
                if height > expiry_height {
                    Ok(SubmissionState::Expired)
                } else {
                    Ok(SubmissionState::Submitted)
                }
            }
        }
    }

    fn classify_rpc_error(
        &self,
        err: RpcManagerError,
        signed: &SignedEnvelope,
        stage: Stage,
    ) -> IssuanceError {
        match err {
            RpcManagerError::BlockhashNotFound { .. } => IssuanceError::Expired {
                signature: Some(signed.signature),
                expiry_height: signed.expiry_height,
            },
            RpcManagerError::TransactionRejected { error, .. } => {
                classify_transaction_error(error, signed, stage)
            }
            other => IssuanceError::from_rpc(other, stage),
        }
    }
}

/// Map a ledger verdict onto the issuance taxonomy
pub fn classify_transaction_error(
    err: TransactionError,
    signed: &SignedEnvelope,
    stage: Stage,
) -> IssuanceError {
    let message = err.to_string();
    match err {
        TransactionError::BlockhashNotFound => IssuanceError::Expired {
            signature: Some(signed.signature),
            expiry_height: signed.expiry_height,
        },
        TransactionError::InstructionError(index, InstructionError::Custom(code)) => {
            match (MintInstructionKind::at_position(index), code) {
                (Some(MintInstructionKind::AllocateRecord), SYSTEM_ACCOUNT_ALREADY_IN_USE) => {
                    IssuanceError::DuplicateAddress {
                        stage,
                        address: signed.mint,
                        message,
                    }
                }
                (Some(MintInstructionKind::IssueSupply), TOKEN_MINT_DECIMALS_MISMATCH) => {
                    IssuanceError::DecimalsMismatch {
                        stage,
                        declared: signed.decimals,
                        message,
                    }
                }
                _ => IssuanceError::Rejected { stage, message },
            }
        }
        _ => IssuanceError::Rejected { stage, message },
    }
}
