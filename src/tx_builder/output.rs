//! Transaction envelope and submission state
//!
//! `TransactionEnvelope` is the unsigned, fully assembled transaction. It is
//! turned into a `SignedEnvelope` exactly once, and only when a controller
//! is supplied for every required signer.

use std::fmt;

use serde::Serialize;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};

use crate::tx_builder::errors::IssuanceError;
use crate::tx_builder::instructions::MintInstructionKind;

/// Where a submission currently is
///
/// ```text
/// Unsigned -> Signed -> Submitted -> Confirmed
///                                 -> Expired
///                                 -> Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Unsigned,
    Signed,
    Submitted,
    Confirmed,
    Expired,
    Rejected,
}

impl SubmissionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Expired | Self::Rejected)
    }

    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Unsigned, Signed)
                | (Signed, Submitted)
                | (Submitted, Confirmed)
                | (Submitted, Expired)
                | (Submitted, Rejected)
        )
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unsigned => "unsigned",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Assembled, unsigned issuance transaction
#[derive(Debug, Clone)]
pub struct TransactionEnvelope {
    pub fee_payer: Pubkey,
    pub recent_blockhash: Hash,
    /// Last block height at which the ledger accepts this envelope
    pub expiry_height: u64,
    /// Instructions in submission order
    pub instructions: Vec<Instruction>,
    pub kinds: Vec<MintInstructionKind>,
    /// Compiled legacy message
    pub message: Message,
    /// Fee payer first, then every other signer in first-seen order
    pub required_signers: Vec<Pubkey>,
    pub mint: Pubkey,
    pub holding_account: Pubkey,
    /// Decimals the issuance step declares
    pub decimals: u8,
}

impl TransactionEnvelope {
    pub fn state(&self) -> SubmissionState {
        SubmissionState::Unsigned
    }

    /// Required signers with no matching controller in `controllers`
    pub fn missing_signers(&self, controllers: &[&Keypair]) -> Vec<Pubkey> {
        self.required_signers
            .iter()
            .filter(|key| !controllers.iter().any(|kp| kp.pubkey() == **key))
            .copied()
            .collect()
    }

    /// Sign with the controllers of every required signer
    ///
    /// Extra controllers are ignored. No network access happens here.
    pub fn sign(&self, controllers: &[&Keypair]) -> Result<SignedEnvelope, IssuanceError> {
        let missing = self.missing_signers(controllers);
        if !missing.is_empty() {
            let missing: Vec<String> = missing.iter().map(ToString::to_string).collect();
            return Err(IssuanceError::Signing(format!(
                "no controller for required signer(s): {}",
                missing.join(", ")
            )));
        }

        // try_sign wants exactly the keys the message declares
        let signers: Vec<&Keypair> = self
            .required_signers
            .iter()
            .filter_map(|key| controllers.iter().copied().find(|kp| kp.pubkey() == *key))
            .collect();

        let mut transaction = Transaction::new_unsigned(self.message.clone());
        transaction
            .try_sign(&signers, self.recent_blockhash)
            .map_err(|e| IssuanceError::Signing(e.to_string()))?;

        Ok(SignedEnvelope {
            signature: transaction.signatures[0],
            transaction,
            expiry_height: self.expiry_height,
            mint: self.mint,
            holding_account: self.holding_account,
            decimals: self.decimals,
        })
    }
}

/// Envelope with every required signature present
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub transaction: Transaction,
    /// The fee payer's signature, which identifies the transaction
    pub signature: Signature,
    pub expiry_height: u64,
    pub mint: Pubkey,
    pub holding_account: Pubkey,
    pub decimals: u8,
}

impl SignedEnvelope {
    pub fn state(&self) -> SubmissionState {
        SubmissionState::Signed
    }

    pub fn is_fully_signed(&self) -> bool {
        self.transaction.is_signed() && self.transaction.verify().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use SubmissionState::*;

        assert!(Unsigned.can_transition_to(Signed));
        assert!(Signed.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Expired));
        assert!(!Unsigned.can_transition_to(Submitted));
        assert!(!Confirmed.can_transition_to(Submitted));
        assert!(!Expired.can_transition_to(Confirmed));

        assert!(Rejected.is_terminal());
        assert!(!Submitted.is_terminal());
        assert_eq!(Expired.to_string(), "expired");
    }
}
