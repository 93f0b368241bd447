//! Shared fixtures for the issuance pipeline tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::{Keypair, Signer};

use crate::rpc_manager::{ConfirmationLevel, RetryPolicy};
use crate::test_utils::MockLedger;
use crate::tx_builder::{IssuanceRequest, MintTxBuilder, SubmissionConfig};

pub const PAYER_LAMPORTS: u64 = 10_000_000_000;

/// Retry policy with millisecond backoff and no jitter
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_factor: 0.0,
        multiplier: 2.0,
    }
}

pub fn fast_submission() -> SubmissionConfig {
    SubmissionConfig {
        commitment: ConfirmationLevel::Finalized,
        poll_interval: Duration::from_millis(10),
        rebroadcast_every: 4,
        retry_policy: fast_retry_policy(),
    }
}

pub struct Fixture {
    pub ledger: Arc<MockLedger>,
    pub payer: Keypair,
    pub builder: MintTxBuilder<MockLedger>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(fast_submission())
    }

    pub fn with_config(config: SubmissionConfig) -> Self {
        let payer = Keypair::new();
        let ledger = Arc::new(MockLedger::with_funded(&payer.pubkey(), PAYER_LAMPORTS));
        let builder = MintTxBuilder::new(ledger.clone(), config);
        Self {
            ledger,
            payer,
            builder,
        }
    }

    /// 21M tokens at six decimals, everything held by the fee payer
    pub fn default_request(&self) -> IssuanceRequest {
        IssuanceRequest::for_fee_payer(self.payer.pubkey(), 6, 21_000_000)
    }

    pub fn payer_balance(&self) -> u64 {
        self.ledger.lamports(&self.payer.pubkey())
    }
}
