//! Mint Issuer Library
//!
//! Builds and atomically submits the Solana transaction that creates a new
//! SPL token mint, creates the owner's associated token account and issues
//! the initial supply into it.

// Solana SDK compatibility layer
pub mod compat;
pub mod config;
pub mod metrics;
pub mod structured_logging;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod tx_builder;

pub mod test_utils;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
pub use tx_builder::{IssuanceError, IssuanceReceipt, IssuanceRequest, MintTxBuilder};
