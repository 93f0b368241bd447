//! Integration tests for the offline build path
//!
//! Exercises the public API from configuration through a signed envelope
//! without touching a ledger.

use std::collections::HashMap;
use std::io::Write;

use mint_issuer::compat;
use mint_issuer::config::Config;
use mint_issuer::rpc_manager::{ConfirmationLevel, LivenessToken};
use mint_issuer::tx_builder::{
    assemble, derive_holding_address, plan_mint_instructions, IssuanceError, MintInstructionKind,
    MintPlanParams, SubmissionState,
};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Keypair, signer::Signer};

fn liveness() -> LivenessToken {
    LivenessToken {
        blockhash: Hash::new_unique(),
        last_valid_block_height: 500,
    }
}

#[test]
fn test_config_file_to_signed_envelope() {
    let payer = Keypair::new();
    let owner = Pubkey::new_unique();

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[rpc]
endpoint = "http://127.0.0.1:8899"

[issuance]
decimals = 6
supply_tokens = 21000000
owner = "{owner}"
no_freeze_authority = true
confirmation = "confirmed"
"#
    )
    .unwrap();

    let config = Config::layered(Some(file.path()), Some(HashMap::new())).unwrap();
    config.validate().unwrap();
    assert_eq!(config.confirmation().unwrap(), ConfirmationLevel::Confirmed);

    let request = config.issuance_request(payer.pubkey()).unwrap();
    assert_eq!(request.owner, owner);
    assert_eq!(request.mint_authority, payer.pubkey());
    assert_eq!(request.freeze_authority, None);

    let mint = Keypair::new();
    let plan = plan_mint_instructions(&MintPlanParams {
        fee_payer: request.fee_payer,
        mint: mint.pubkey(),
        owner: request.owner,
        mint_authority: request.mint_authority,
        freeze_authority: request.freeze_authority,
        decimals: request.decimals,
        supply_base_units: request.base_units().unwrap(),
        rent_lamports: 1_461_600,
    })
    .unwrap();
    assert_eq!(plan.supply_base_units, 21_000_000_000_000);
    assert_eq!(plan.holding_account, derive_holding_address(&mint.pubkey(), &owner));

    let envelope = assemble(&plan, &payer.pubkey(), &liveness()).unwrap();
    assert_eq!(envelope.state(), SubmissionState::Unsigned);
    assert_eq!(envelope.kinds, MintInstructionKind::CANONICAL_ORDER.to_vec());
    assert_eq!(compat::get_fee_payer(&envelope.message), Some(&payer.pubkey()));

    let signed = envelope.sign(&[&payer, &mint]).unwrap();
    assert!(signed.is_fully_signed());
    assert_eq!(signed.state(), SubmissionState::Signed);
    assert!(signed.transaction.verify().is_ok());
}

#[test]
fn test_env_overrides_file_values() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[issuance]\ndecimals = 2\n").unwrap();

    let env = HashMap::from([("MINT_ISSUANCE__DECIMALS".to_string(), "9".to_string())]);
    let config = Config::layered(Some(file.path()), Some(env)).unwrap();
    assert_eq!(config.issuance.decimals, 9);
}

#[test]
fn test_build_errors_are_not_retryable() {
    let payer = Pubkey::new_unique();
    let err = plan_mint_instructions(&MintPlanParams {
        fee_payer: payer,
        mint: payer,
        owner: payer,
        mint_authority: payer,
        freeze_authority: None,
        decimals: 6,
        supply_base_units: 1,
        rent_lamports: 1_461_600,
    })
    .unwrap_err();

    assert!(matches!(err, IssuanceError::DuplicateAddress { .. }));
    assert!(!err.is_retryable());
}
