//! Error types for the issuance pipeline
//!
//! Every failure names the pipeline stage it came from so callers can tell
//! a retryable network or expiry problem from a fatal, programmer-facing
//! one without parsing messages.

use std::fmt;

use serde::Serialize;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

use crate::rpc_manager::RpcManagerError;

/// Pipeline stage a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Derive,
    Rent,
    Build,
    Liveness,
    Assemble,
    Sign,
    Send,
    Confirm,
    Fund,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Derive => "derive",
            Stage::Rent => "rent",
            Stage::Build => "build",
            Stage::Liveness => "liveness",
            Stage::Assemble => "assemble",
            Stage::Sign => "sign",
            Stage::Send => "send",
            Stage::Confirm => "confirm",
            Stage::Fund => "fund",
        };
        f.write_str(s)
    }
}

/// Error taxonomy for building and submitting the issuance transaction
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// Malformed address input
    #[error("Invalid identity '{input}': {reason}")]
    InvalidIdentity { input: String, reason: String },

    /// RPC unreachable or timed out
    #[error("Network unavailable during {stage}: {message}")]
    NetworkUnavailable { stage: Stage, message: String },

    /// Target account already has storage
    #[error("Duplicate address {address} during {stage}: {message}")]
    DuplicateAddress {
        stage: Stage,
        address: Pubkey,
        message: String,
    },

    /// Fee payer is not referenced by any instruction
    #[error("Fee payer {fee_payer} is not referenced by any instruction")]
    MissingFeePayer { fee_payer: Pubkey },

    /// Checked issuance decimals disagree with the mint record
    #[error("Decimals mismatch during {stage}: issuance declared {declared} decimals ({message})")]
    DecimalsMismatch {
        stage: Stage,
        declared: u8,
        message: String,
    },

    /// Blockhash window elapsed without confirmation
    #[error("Transaction expired past block height {expiry_height} (signature: {signature:?})")]
    Expired {
        signature: Option<Signature>,
        expiry_height: u64,
    },

    /// Any other definitive ledger refusal, text preserved verbatim
    #[error("Ledger rejected the transaction during {stage}: {message}")]
    Rejected { stage: Stage, message: String },

    /// Instructions are not in allocate → initialize → create → issue order
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Whole-token supply does not fit in u64 base units
    #[error("Supply of {tokens} tokens at {decimals} decimals overflows u64 base units")]
    InvalidAmount { tokens: u64, decimals: u8 },

    /// Decimals outside the supported range
    #[error("Decimals {decimals} exceeds the supported maximum of {max}")]
    InvalidDecimals { decimals: u8, max: u8 },

    /// A required controller is missing or signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Configuration or validation error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IssuanceError {
    /// Check if the caller may retry with a freshly built envelope
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkUnavailable { .. } => true,
            Self::Expired { .. } => true,

            Self::InvalidIdentity { .. } => false,
            Self::DuplicateAddress { .. } => false,
            Self::MissingFeePayer { .. } => false,
            Self::DecimalsMismatch { .. } => false,
            Self::Rejected { .. } => false,
            Self::InvalidInstructionOrder(_) => false,
            Self::InvalidAmount { .. } => false,
            Self::InvalidDecimals { .. } => false,
            Self::Signing(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidIdentity { .. } => "invalid_identity",
            Self::NetworkUnavailable { .. } => "network",
            Self::DuplicateAddress { .. } => "duplicate_address",
            Self::MissingFeePayer { .. } => "missing_fee_payer",
            Self::DecimalsMismatch { .. } => "decimals_mismatch",
            Self::Expired { .. } => "expired",
            Self::Rejected { .. } => "rejected",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::InvalidAmount { .. } => "validation",
            Self::InvalidDecimals { .. } => "validation",
            Self::Signing(_) => "signing",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Stage the failure is attributed to
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidIdentity { .. } => Stage::Derive,
            Self::NetworkUnavailable { stage, .. } => *stage,
            Self::DuplicateAddress { stage, .. } => *stage,
            Self::MissingFeePayer { .. } => Stage::Assemble,
            Self::DecimalsMismatch { stage, .. } => *stage,
            Self::Expired { .. } => Stage::Confirm,
            Self::Rejected { stage, .. } => *stage,
            Self::InvalidInstructionOrder(_) => Stage::Assemble,
            Self::InvalidAmount { .. } => Stage::Build,
            Self::InvalidDecimals { .. } => Stage::Build,
            Self::Signing(_) => Stage::Sign,
            Self::Configuration(_) => Stage::Build,
            Self::Internal(_) => Stage::Assemble,
        }
    }

    /// Map an RPC failure that is not tied to a specific instruction
    pub fn from_rpc(err: RpcManagerError, stage: Stage) -> Self {
        match err {
            RpcManagerError::BlockhashNotFound { .. } => Self::Expired {
                signature: None,
                expiry_height: 0,
            },
            RpcManagerError::TransactionRejected { error, .. } => Self::Rejected {
                stage,
                message: error.to_string(),
            },
            RpcManagerError::Validation(message) => Self::Configuration(message),
            RpcManagerError::Internal(message) => Self::Internal(message),
            err if err.is_retryable() => Self::NetworkUnavailable {
                stage,
                message: err.to_string(),
            },
            RpcManagerError::RpcResponse { message, .. } => Self::Rejected { stage, message },
            other => Self::NetworkUnavailable {
                stage,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::transaction::TransactionError;

    #[test]
    fn test_error_display() {
        let err = IssuanceError::NetworkUnavailable {
            stage: Stage::Rent,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Network unavailable during rent: connection refused"
        );

        let err = IssuanceError::InvalidAmount {
            tokens: u64::MAX,
            decimals: 9,
        };
        assert!(err.to_string().contains("overflows u64"));
    }

    #[test]
    fn test_error_retryability() {
        assert!(IssuanceError::NetworkUnavailable {
            stage: Stage::Send,
            message: String::new(),
        }
        .is_retryable());
        assert!(IssuanceError::Expired {
            signature: None,
            expiry_height: 10,
        }
        .is_retryable());

        assert!(!IssuanceError::MissingFeePayer {
            fee_payer: Pubkey::new_unique(),
        }
        .is_retryable());
        assert!(!IssuanceError::DecimalsMismatch {
            stage: Stage::Confirm,
            declared: 6,
            message: String::new(),
        }
        .is_retryable());
        assert!(!IssuanceError::Rejected {
            stage: Stage::Send,
            message: String::new(),
        }
        .is_retryable());
    }

    #[test]
    fn test_error_stage_and_category() {
        let err = IssuanceError::InvalidIdentity {
            input: "nope".to_string(),
            reason: "bad base58".to_string(),
        };
        assert_eq!(err.stage(), Stage::Derive);
        assert_eq!(err.category(), "invalid_identity");

        let err = IssuanceError::MissingFeePayer {
            fee_payer: Pubkey::new_unique(),
        };
        assert_eq!(err.stage(), Stage::Assemble);
    }

    #[test]
    fn test_from_rpc_classification() {
        let err = IssuanceError::from_rpc(
            RpcManagerError::Timeout {
                endpoint: "local".to_string(),
                timeout_ms: 100,
            },
            Stage::Rent,
        );
        assert!(matches!(
            err,
            IssuanceError::NetworkUnavailable {
                stage: Stage::Rent,
                ..
            }
        ));

        let err = IssuanceError::from_rpc(
            RpcManagerError::BlockhashNotFound {
                endpoint: "local".to_string(),
            },
            Stage::Send,
        );
        assert!(matches!(err, IssuanceError::Expired { .. }));

        let err = IssuanceError::from_rpc(
            RpcManagerError::TransactionRejected {
                endpoint: "local".to_string(),
                error: TransactionError::AccountNotFound,
            },
            Stage::Send,
        );
        match err {
            IssuanceError::Rejected { stage, message } => {
                assert_eq!(stage, Stage::Send);
                assert_eq!(message, TransactionError::AccountNotFound.to_string());
            }
            other => panic!("unexpected: {other:?}"),
        }

        let err = IssuanceError::from_rpc(
            RpcManagerError::RpcResponse {
                endpoint: "local".to_string(),
                message: "invalid params".to_string(),
                code: Some(-32602),
            },
            Stage::Liveness,
        );
        assert!(matches!(err, IssuanceError::Rejected { .. }));
    }
}
