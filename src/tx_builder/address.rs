//! Holding-account address derivation
//!
//! The holding account is the standard associated token account: a
//! program-derived address of `[owner, token_program, mint]` under the
//! associated token account program. Any client deriving it from the same
//! pair gets the same address without talking to anyone.

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;

use crate::tx_builder::errors::IssuanceError;

/// Derive the holding account address for `(mint, owner)`
#[inline]
#[must_use]
pub fn derive_holding_address(mint: &Pubkey, owner: &Pubkey) -> Pubkey {
    get_associated_token_address_with_program_id(owner, mint, &spl_token::id())
}

/// Same derivation with the bump seed, computed from the raw seeds
pub fn find_holding_address(mint: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[owner.as_ref(), spl_token::id().as_ref(), mint.as_ref()],
        &spl_associated_token_account::id(),
    )
}

/// Parse a base58 identity
pub fn parse_identity(input: &str) -> Result<Pubkey, IssuanceError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IssuanceError::InvalidIdentity {
            input: input.to_string(),
            reason: "empty identity".to_string(),
        });
    }

    Pubkey::from_str(trimmed).map_err(|e| IssuanceError::InvalidIdentity {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Derive from base58 inputs, failing with `InvalidIdentity` on malformed ones
pub fn derive_holding_address_str(mint: &str, owner: &str) -> Result<Pubkey, IssuanceError> {
    let mint = parse_identity(mint)?;
    let owner = parse_identity(owner)?;
    Ok(derive_holding_address(&mint, &owner))
}
