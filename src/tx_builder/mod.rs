//! Atomic mint issuance transaction builder
//!
//! Builds and submits one transaction that creates a mint, initializes it,
//! creates the owner's holding account and issues the initial supply. The
//! ledger applies all four steps or none of them.
//!
//! ## Architecture
//!
//! - **address**: holding-account derivation
//! - **rent**: rent-exempt sizing, cached per submission
//! - **instructions**: instruction planning and ordering validation
//! - **context**: liveness token for one envelope
//! - **assembler**: signer set computation and message compilation
//! - **output**: unsigned/signed envelopes and the submission state machine
//! - **submit**: send with transport retries, confirmation polling, error mapping
//! - **builder**: the end-to-end pipeline
//! - **errors**: error taxonomy with stage attribution
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mint_issuer::rpc_manager::{ConfirmationLevel, RetryPolicy, SolanaRpc};
//! use mint_issuer::tx_builder::{IssuanceRequest, MintTxBuilder, SubmissionConfig};
//! use solana_sdk::signature::{Keypair, Signer};
//!
//! # async fn example(payer: Keypair) -> Result<(), mint_issuer::tx_builder::IssuanceError> {
//! let rpc = Arc::new(SolanaRpc::new(
//!     "http://127.0.0.1:8899",
//!     ConfirmationLevel::Confirmed,
//!     Duration::from_secs(30),
//!     RetryPolicy::default(),
//! ));
//! let builder = MintTxBuilder::new(rpc, SubmissionConfig::default());
//!
//! let request = IssuanceRequest::for_fee_payer(payer.pubkey(), 6, 21_000_000);
//! let mint = Keypair::new();
//! let receipt = builder.issue_with_refresh(&request, &mint, &[&payer]).await?;
//! println!("{}", receipt.signature);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod assembler;
pub mod builder;
pub mod context;
pub mod errors;
pub mod instructions;
pub mod output;
pub mod rent;
pub mod submit;

pub use address::{derive_holding_address, derive_holding_address_str};
pub use assembler::{assemble, compute_signer_set};
pub use builder::{IssuanceReceipt, IssuanceRequest, MintTxBuilder};
pub use context::ExecutionContext;
pub use errors::{IssuanceError, Stage};
pub use instructions::{
    plan_mint_instructions, sanity_check_ix_order, InstructionPlan, MintInstructionKind,
    MintPlanParams, MAX_DECIMALS,
};
pub use output::{SignedEnvelope, SubmissionState, TransactionEnvelope};
pub use rent::{RentSizer, MINT_RECORD_SIZE};
pub use submit::{ConfirmedSubmission, SubmissionClient, SubmissionConfig};
