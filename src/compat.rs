//! Compatibility layer for Solana message types
//!
//! Answers the two questions the assembler and the signer check ask of a
//! compiled message: which keys must sign and who pays the fee.
//!
//! Required signers are always the first `header.num_required_signatures`
//! static account keys, and the fee payer is the first of them.

use solana_sdk::{
    message::{Message, MessageHeader},
    pubkey::Pubkey,
};

/// Read-only view over a compiled message's header and static keys
pub trait SignerView {
    fn header(&self) -> &MessageHeader;

    fn static_account_keys(&self) -> &[Pubkey];
}

impl SignerView for Message {
    #[inline]
    fn header(&self) -> &MessageHeader {
        &self.header
    }

    #[inline]
    fn static_account_keys(&self) -> &[Pubkey] {
        &self.account_keys
    }
}

/// Keys that must sign, in message order
#[inline]
#[must_use]
pub fn get_required_signers<M: SignerView + ?Sized>(message: &M) -> &[Pubkey] {
    let keys = message.static_account_keys();
    let num_signers = message.header().num_required_signatures as usize;
    &keys[..num_signers.min(keys.len())]
}

/// The account charged the fee, if the message has any signer
#[inline]
pub fn get_fee_payer<M: SignerView + ?Sized>(message: &M) -> Option<&Pubkey> {
    get_required_signers(message).first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        instruction::{AccountMeta, Instruction},
        signature::Keypair,
        signer::Signer,
    };

    fn two_signer_instruction(payer: &Pubkey, mint: &Pubkey, authority: &Pubkey) -> Instruction {
        Instruction::new_with_bytes(
            spl_token::id(),
            &[14],
            vec![
                AccountMeta::new(*mint, true),
                AccountMeta::new_readonly(*authority, true),
                AccountMeta::new(*payer, true),
                AccountMeta::new(Pubkey::new_unique(), false),
            ],
        )
    }

    #[test]
    fn test_legacy_required_signers_start_with_payer() {
        let payer = Keypair::new();
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();

        let ix = two_signer_instruction(&payer.pubkey(), &mint, &authority);
        let message = Message::new(&[ix], Some(&payer.pubkey()));

        let signers = get_required_signers(&message);
        assert_eq!(signers.len(), 3);
        assert_eq!(get_fee_payer(&message), Some(&payer.pubkey()));
        assert!(signers.contains(&mint));
        assert!(signers.contains(&authority));
        assert_eq!(message.header.num_required_signatures, 3);
    }

    #[test]
    fn test_message_without_signers_has_no_fee_payer() {
        let mut message = Message::new(&[], None);
        message.header.num_required_signatures = 0;

        assert!(get_required_signers(&message).is_empty());
        assert_eq!(get_fee_payer(&message), None);
    }

    #[test]
    fn test_header_larger_than_keys_is_clamped() {
        let payer = Keypair::new();
        let mut message = Message::new(&[], Some(&payer.pubkey()));
        message.header.num_required_signatures = 5;

        assert_eq!(get_required_signers(&message).len(), message.account_keys.len());
    }
}
