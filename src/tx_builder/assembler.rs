//! Envelope assembly
//!
//! Compiles an [`InstructionPlan`] into a single legacy message anchored to
//! one liveness token. The plan is never split: either all four steps go
//! into one envelope or assembly fails.

use solana_sdk::{instruction::Instruction, message::Message, pubkey::Pubkey};
use tracing::debug;

use crate::compat;
use crate::rpc_manager::LivenessToken;
use crate::tx_builder::errors::IssuanceError;
use crate::tx_builder::instructions::{sanity_check_ix_order, InstructionPlan, MintInstructionKind};
use crate::tx_builder::output::TransactionEnvelope;

/// Union of every `is_signer` account, fee payer first, then first-seen order
pub fn compute_signer_set(instructions: &[Instruction], fee_payer: &Pubkey) -> Vec<Pubkey> {
    let mut signers = vec![*fee_payer];
    for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
        if meta.is_signer && !signers.contains(&meta.pubkey) {
            signers.push(meta.pubkey);
        }
    }
    signers
}

fn references(instructions: &[Instruction], key: &Pubkey) -> bool {
    instructions
        .iter()
        .flat_map(|ix| ix.accounts.iter())
        .any(|meta| meta.pubkey == *key)
}

/// Assemble the unsigned envelope for `plan`
///
/// # Errors
///
/// - `InvalidInstructionOrder` unless the plan is exactly the canonical sequence
/// - `MissingFeePayer` if no instruction references `fee_payer`
/// - `Internal` if the compiled header disagrees with the computed signer set
pub fn assemble(
    plan: &InstructionPlan,
    fee_payer: &Pubkey,
    liveness: &LivenessToken,
) -> Result<TransactionEnvelope, IssuanceError> {
    sanity_check_ix_order(&plan.instructions)?;

    if !references(&plan.instructions, fee_payer) {
        return Err(IssuanceError::MissingFeePayer {
            fee_payer: *fee_payer,
        });
    }

    let required_signers = compute_signer_set(&plan.instructions, fee_payer);
    let message =
        Message::new_with_blockhash(&plan.instructions, Some(fee_payer), &liveness.blockhash);

    // The compiler orders signers by writability; compare as sets
    let compiled = compat::get_required_signers(&message);
    if compiled.len() != required_signers.len()
        || !required_signers.iter().all(|key| compiled.contains(key))
        || compat::get_fee_payer(&message) != Some(fee_payer)
    {
        return Err(IssuanceError::Internal(format!(
            "compiled message declares signers {:?}, expected {:?}",
            compiled, required_signers
        )));
    }

    let kinds: Vec<MintInstructionKind> = MintInstructionKind::CANONICAL_ORDER.to_vec();

    debug!(
        fee_payer = %fee_payer,
        signers = required_signers.len(),
        expiry_height = liveness.last_valid_block_height,
        "Assembled issuance envelope"
    );

    Ok(TransactionEnvelope {
        fee_payer: *fee_payer,
        recent_blockhash: liveness.blockhash,
        expiry_height: liveness.last_valid_block_height,
        instructions: plan.instructions.clone(),
        kinds,
        message,
        required_signers,
        mint: plan.mint,
        holding_account: plan.holding_account,
        decimals: plan.decimals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::instructions::{plan_mint_instructions, MintPlanParams};
    use solana_sdk::{
        hash::Hash,
        instruction::AccountMeta,
        signature::{Keypair, Signer},
    };

    fn liveness() -> LivenessToken {
        LivenessToken {
            blockhash: Hash::new_unique(),
            last_valid_block_height: 300,
        }
    }

    fn plan_for(payer: &Pubkey, mint: &Pubkey, authority: &Pubkey) -> InstructionPlan {
        plan_mint_instructions(&MintPlanParams {
            fee_payer: *payer,
            mint: *mint,
            owner: *payer,
            mint_authority: *authority,
            freeze_authority: Some(*authority),
            decimals: 6,
            supply_base_units: 1_000_000,
            rent_lamports: 1_461_600,
        })
        .unwrap()
    }

    #[test]
    fn test_signer_set_order_and_dedup() {
        let payer = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let plan = plan_for(&payer, &mint, &authority);

        let signers = compute_signer_set(&plan.instructions, &payer);
        assert_eq!(signers, vec![payer, mint, authority]);
    }

    #[test]
    fn test_signer_set_collapses_shared_roles() {
        let payer = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let plan = plan_for(&payer, &mint, &payer);

        assert_eq!(compute_signer_set(&plan.instructions, &payer), vec![payer, mint]);
    }

    #[test]
    fn test_assemble_preserves_order() {
        let payer = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let plan = plan_for(&payer, &mint, &payer);
        let token = liveness();

        let envelope = assemble(&plan, &payer, &token).unwrap();
        assert_eq!(envelope.instructions, plan.instructions);
        assert_eq!(envelope.kinds, MintInstructionKind::CANONICAL_ORDER.to_vec());
        assert_eq!(envelope.recent_blockhash, token.blockhash);
        assert_eq!(envelope.expiry_height, 300);
        assert_eq!(envelope.message.instructions.len(), 4);
        assert_eq!(envelope.message.account_keys[0], payer);
        assert_eq!(envelope.required_signers, vec![payer, mint]);
    }

    #[test]
    fn test_assemble_rejects_reordered_plan() {
        let payer = Pubkey::new_unique();
        let mut plan = plan_for(&payer, &Pubkey::new_unique(), &payer);
        plan.instructions.swap(1, 2);

        let err = assemble(&plan, &payer, &liveness()).unwrap_err();
        assert!(matches!(err, IssuanceError::InvalidInstructionOrder(_)));
    }

    #[test]
    fn test_assemble_rejects_unreferenced_fee_payer() {
        let payer = Pubkey::new_unique();
        let plan = plan_for(&payer, &Pubkey::new_unique(), &payer);
        let stranger = Pubkey::new_unique();

        let err = assemble(&plan, &stranger, &liveness()).unwrap_err();
        assert!(matches!(
            err,
            IssuanceError::MissingFeePayer { fee_payer } if fee_payer == stranger
        ));
    }

    #[test]
    fn test_sign_requires_every_controller() {
        let payer = Keypair::new();
        let mint = Keypair::new();
        let plan = plan_for(&payer.pubkey(), &mint.pubkey(), &payer.pubkey());
        let envelope = assemble(&plan, &payer.pubkey(), &liveness()).unwrap();

        let err = envelope.sign(&[&payer]).unwrap_err();
        assert!(matches!(err, IssuanceError::Signing(ref m) if m.contains(&mint.pubkey().to_string())));

        let stray = Keypair::new();
        let signed = envelope.sign(&[&stray, &mint, &payer]).unwrap();
        assert!(signed.is_fully_signed());
        assert_eq!(signed.transaction.signatures.len(), 2);
        assert_eq!(signed.signature, signed.transaction.signatures[0]);
    }

    #[test]
    fn test_foreign_signer_in_unrelated_instruction_is_counted() {
        let payer = Pubkey::new_unique();
        let extra = Pubkey::new_unique();
        let plan = plan_for(&payer, &Pubkey::new_unique(), &payer);

        let mut ixs = plan.instructions.clone();
        ixs.push(Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[],
            vec![AccountMeta::new_readonly(extra, true)],
        ));
        assert_eq!(compute_signer_set(&ixs, &payer).last(), Some(&extra));
    }
}
