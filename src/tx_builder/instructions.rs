//! Instruction planning and ordering validation
//!
//! Builds the four issuance instructions in their only valid order:
//! 1. create the mint account (system program)
//! 2. initialize it as a mint (token program, `InitializeMint2`)
//! 3. create the owner's associated token account
//! 4. issue supply with `MintToChecked`
//!
//! Planning is pure. Nothing here talks to the network.

use serde::Serialize;
#[allow(deprecated)]
use solana_sdk::system_instruction;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_program};
use spl_associated_token_account::instruction::{
    create_associated_token_account, AssociatedTokenAccountInstruction,
};
use spl_token::instruction::TokenInstruction;

use crate::tx_builder::address::derive_holding_address;
use crate::tx_builder::errors::{IssuanceError, Stage};
use crate::tx_builder::rent::MINT_RECORD_SIZE;

/// Largest decimals value accepted for a new mint
///
/// Deliberately tighter than the record's `u8` field: 9 is the precision of
/// native lamports, and `u64::MAX` base units at 9 decimals still leaves
/// headroom of about 18 billion whole tokens. Larger values mostly come from
/// typos and make nearly every supply overflow.
pub const MAX_DECIMALS: u8 = 9;

// Little-endian u32 tag of `SystemInstruction::CreateAccount`
const SYSTEM_CREATE_ACCOUNT: [u8; 4] = [0, 0, 0, 0];
const ATA_CREATE: u8 = AssociatedTokenAccountInstruction::Create as u8;

/// The four issuance steps, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MintInstructionKind {
    AllocateRecord,
    InitializeMint,
    CreateHoldingAccount,
    IssueSupply,
}

impl MintInstructionKind {
    pub const CANONICAL_ORDER: [MintInstructionKind; 4] = [
        MintInstructionKind::AllocateRecord,
        MintInstructionKind::InitializeMint,
        MintInstructionKind::CreateHoldingAccount,
        MintInstructionKind::IssueSupply,
    ];

    /// Kind expected at a position of a canonical plan
    pub fn at_position(index: u8) -> Option<Self> {
        Self::CANONICAL_ORDER.get(index as usize).copied()
    }

    /// Recognise a planned instruction by program id and discriminator
    pub fn classify(ix: &Instruction) -> Option<Self> {
        if ix.program_id == system_program::id() {
            return (ix.data.len() >= 4 && ix.data[..4] == SYSTEM_CREATE_ACCOUNT)
                .then_some(Self::AllocateRecord);
        }

        if ix.program_id == spl_token::id() {
            return match TokenInstruction::unpack(&ix.data) {
                Ok(TokenInstruction::InitializeMint2 { .. }) => Some(Self::InitializeMint),
                Ok(TokenInstruction::MintToChecked { .. }) => Some(Self::IssueSupply),
                _ => None,
            };
        }

        if ix.program_id == spl_associated_token_account::id() {
            // Older clients encode Create as empty data
            return match ix.data.first() {
                None | Some(&ATA_CREATE) => Some(Self::CreateHoldingAccount),
                _ => None,
            };
        }

        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AllocateRecord => "allocate_record",
            Self::InitializeMint => "initialize_mint",
            Self::CreateHoldingAccount => "create_holding_account",
            Self::IssueSupply => "issue_supply",
        }
    }
}

/// Inputs for planning one issuance
#[derive(Debug, Clone)]
pub struct MintPlanParams {
    pub fee_payer: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub mint_authority: Pubkey,
    pub freeze_authority: Option<Pubkey>,
    pub decimals: u8,
    /// Supply in base units (already scaled by `10^decimals`)
    pub supply_base_units: u64,
    /// Rent-exempt minimum for the mint record
    pub rent_lamports: u64,
}

/// Ordered issuance instructions with the addresses they touch
#[derive(Debug, Clone)]
pub struct InstructionPlan {
    /// The ordered list of instructions for the transaction
    pub instructions: Vec<Instruction>,
    pub mint: Pubkey,
    pub holding_account: Pubkey,
    pub decimals: u8,
    pub supply_base_units: u64,
}

impl InstructionPlan {
    /// Kind of each instruction, in plan order
    pub fn kinds(&self) -> Vec<Option<MintInstructionKind>> {
        self.instructions
            .iter()
            .map(MintInstructionKind::classify)
            .collect()
    }
}

/// Scale whole tokens into base units
pub fn to_base_units(tokens: u64, decimals: u8) -> Result<u64, IssuanceError> {
    if decimals > MAX_DECIMALS {
        return Err(IssuanceError::InvalidDecimals {
            decimals,
            max: MAX_DECIMALS,
        });
    }

    10u64
        .checked_pow(decimals as u32)
        .and_then(|scale| tokens.checked_mul(scale))
        .ok_or(IssuanceError::InvalidAmount { tokens, decimals })
}

/// Plan the four issuance instructions in canonical order
///
/// # Errors
///
/// - `InvalidDecimals` if `decimals` exceeds [`MAX_DECIMALS`]
/// - `DuplicateAddress` if the mint identity is one this run already knows
///   to have storage (fee payer, owner or an authority)
/// - `Internal` if the token program helpers refuse the inputs
pub fn plan_mint_instructions(params: &MintPlanParams) -> Result<InstructionPlan, IssuanceError> {
    if params.decimals > MAX_DECIMALS {
        return Err(IssuanceError::InvalidDecimals {
            decimals: params.decimals,
            max: MAX_DECIMALS,
        });
    }

    let reused = [
        Some(params.fee_payer),
        Some(params.owner),
        Some(params.mint_authority),
        params.freeze_authority,
    ]
    .into_iter()
    .flatten()
    .any(|identity| identity == params.mint);
    if reused {
        return Err(IssuanceError::DuplicateAddress {
            stage: Stage::Build,
            address: params.mint,
            message: "mint identity is reused from another role in this issuance".to_string(),
        });
    }

    let token_program = spl_token::id();
    let holding_account = derive_holding_address(&params.mint, &params.owner);

    // Pre-allocate vector with capacity for all instructions
    let mut instructions = Vec::with_capacity(4);

    // 1. Allocate the mint record, owned by the token program
    instructions.push(system_instruction::create_account(
        &params.fee_payer,
        &params.mint,
        params.rent_lamports,
        MINT_RECORD_SIZE as u64,
        &token_program,
    ));

    // 2. Initialize it; InitializeMint2 needs no rent sysvar account
    instructions.push(
        spl_token::instruction::initialize_mint2(
            &token_program,
            &params.mint,
            &params.mint_authority,
            params.freeze_authority.as_ref(),
            params.decimals,
        )
        .map_err(|e| IssuanceError::Internal(format!("initialize_mint2: {e}")))?,
    );

    // 3. Holding account for (mint, owner), funded by the fee payer
    instructions.push(create_associated_token_account(
        &params.fee_payer,
        &params.owner,
        &params.mint,
        &token_program,
    ));

    // 4. Checked issuance so a stale decimals assumption is refused on-ledger
    instructions.push(
        spl_token::instruction::mint_to_checked(
            &token_program,
            &params.mint,
            &holding_account,
            &params.mint_authority,
            &[],
            params.supply_base_units,
            params.decimals,
        )
        .map_err(|e| IssuanceError::Internal(format!("mint_to_checked: {e}")))?,
    );

    Ok(InstructionPlan {
        instructions,
        mint: params.mint,
        holding_account,
        decimals: params.decimals,
        supply_base_units: params.supply_base_units,
    })
}

/// Validate that `instructions` is exactly the canonical issuance sequence
///
/// Later steps read state created by earlier ones inside the same atomic
/// unit, so any other order is refused before it reaches the ledger.
pub fn sanity_check_ix_order(instructions: &[Instruction]) -> Result<(), IssuanceError> {
    if instructions.is_empty() {
        return Err(IssuanceError::InvalidInstructionOrder(
            "Instruction list is empty".to_string(),
        ));
    }

    if instructions.len() != MintInstructionKind::CANONICAL_ORDER.len() {
        return Err(IssuanceError::InvalidInstructionOrder(format!(
            "Expected {} instructions, got {}",
            MintInstructionKind::CANONICAL_ORDER.len(),
            instructions.len()
        )));
    }

    for (idx, (ix, expected)) in instructions
        .iter()
        .zip(MintInstructionKind::CANONICAL_ORDER)
        .enumerate()
    {
        match MintInstructionKind::classify(ix) {
            Some(kind) if kind == expected => {}
            Some(kind) => {
                return Err(IssuanceError::InvalidInstructionOrder(format!(
                    "Position {} must be {}, found {}",
                    idx,
                    expected.name(),
                    kind.name()
                )))
            }
            None => {
                return Err(IssuanceError::InvalidInstructionOrder(format!(
                    "Position {} must be {}, found unrecognised instruction for program {}",
                    idx,
                    expected.name(),
                    ix.program_id
                )))
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;

    fn params() -> MintPlanParams {
        let payer = Pubkey::new_unique();
        MintPlanParams {
            fee_payer: payer,
            mint: Pubkey::new_unique(),
            owner: payer,
            mint_authority: payer,
            freeze_authority: Some(payer),
            decimals: 6,
            supply_base_units: 21_000_000_000_000,
            rent_lamports: 1_461_600,
        }
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(21_000_000, 6).unwrap(), 21_000_000_000_000);
        assert_eq!(to_base_units(5, 0).unwrap(), 5);
        assert!(matches!(
            to_base_units(u64::MAX, 1),
            Err(IssuanceError::InvalidAmount { .. })
        ));
        assert!(matches!(
            to_base_units(1, 10),
            Err(IssuanceError::InvalidDecimals { decimals: 10, .. })
        ));
    }

    #[test]
    fn test_plan_canonical_order() {
        let p = params();
        let plan = plan_mint_instructions(&p).expect("Should plan instructions");

        assert_eq!(plan.instructions.len(), 4);
        assert_eq!(
            plan.kinds(),
            MintInstructionKind::CANONICAL_ORDER.map(Some).to_vec()
        );
        assert_eq!(plan.instructions[0].program_id, system_program::id());
        assert_eq!(plan.instructions[1].program_id, spl_token::id());
        assert_eq!(
            plan.instructions[2].program_id,
            spl_associated_token_account::id()
        );
        assert_eq!(plan.instructions[3].program_id, spl_token::id());
        assert_eq!(plan.holding_account, derive_holding_address(&p.mint, &p.owner));
        assert!(sanity_check_ix_order(&plan.instructions).is_ok());
    }

    #[test]
    fn test_allocate_record_payload() {
        let p = params();
        let plan = plan_mint_instructions(&p).unwrap();
        let ix = &plan.instructions[0];

        // CreateAccount { lamports, space, owner }
        assert_eq!(&ix.data[4..12], &p.rent_lamports.to_le_bytes());
        assert_eq!(&ix.data[12..20], &(MINT_RECORD_SIZE as u64).to_le_bytes());
        assert_eq!(&ix.data[20..52], spl_token::id().as_ref());

        // both the payer and the new account sign
        assert!(ix.accounts[0].is_signer && ix.accounts[0].pubkey == p.fee_payer);
        assert!(ix.accounts[1].is_signer && ix.accounts[1].pubkey == p.mint);
    }

    #[test]
    fn test_issue_supply_payload_carries_decimals() {
        let p = params();
        let plan = plan_mint_instructions(&p).unwrap();
        let ix = &plan.instructions[3];

        assert!(matches!(
            TokenInstruction::unpack(&ix.data).unwrap(),
            TokenInstruction::MintToChecked {
                amount: 21_000_000_000_000,
                decimals: 6
            }
        ));

        assert_eq!(ix.accounts[0].pubkey, p.mint);
        assert_eq!(ix.accounts[1].pubkey, plan.holding_account);
        assert_eq!(ix.accounts[2].pubkey, p.mint_authority);
        assert!(ix.accounts[2].is_signer);
    }

    #[test]
    fn test_initialize_mint_without_freeze_authority() {
        let mut p = params();
        p.freeze_authority = None;
        let plan = plan_mint_instructions(&p).unwrap();
        let ix = &plan.instructions[1];

        match TokenInstruction::unpack(&ix.data).unwrap() {
            TokenInstruction::InitializeMint2 {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                assert_eq!(decimals, 6);
                assert_eq!(mint_authority, p.mint_authority);
                assert!(freeze_authority.is_none());
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
        // only the mint account, no rent sysvar
        assert_eq!(ix.accounts.len(), 1);
    }

    #[test]
    fn test_signers_are_declared_explicitly() {
        let mut p = params();
        p.mint_authority = Pubkey::new_unique();
        let plan = plan_mint_instructions(&p).unwrap();

        let signers: Vec<Pubkey> = plan
            .instructions
            .iter()
            .flat_map(|ix| ix.accounts.iter())
            .filter(|meta| meta.is_signer)
            .map(|meta| meta.pubkey)
            .collect();

        assert!(signers.contains(&p.fee_payer));
        assert!(signers.contains(&p.mint));
        assert!(signers.contains(&p.mint_authority));
        // the holding account is derived, it never signs
        assert!(!signers.contains(&plan.holding_account));
    }

    #[test]
    fn test_reused_mint_identity_is_duplicate() {
        let mut p = params();
        p.mint = p.fee_payer;
        let err = plan_mint_instructions(&p).unwrap_err();
        assert!(matches!(err, IssuanceError::DuplicateAddress { .. }));
        assert_eq!(err.stage(), Stage::Build);

        let mut p = params();
        let authority = Pubkey::new_unique();
        p.mint_authority = authority;
        p.mint = authority;
        assert!(matches!(
            plan_mint_instructions(&p),
            Err(IssuanceError::DuplicateAddress { .. })
        ));
    }

    #[test]
    fn test_decimals_out_of_range() {
        let mut p = params();
        p.decimals = MAX_DECIMALS;
        assert!(plan_mint_instructions(&p).is_ok());
        assert_eq!(to_base_units(1, MAX_DECIMALS).unwrap(), 1_000_000_000);

        p.decimals = MAX_DECIMALS + 1;
        assert!(matches!(
            plan_mint_instructions(&p),
            Err(IssuanceError::InvalidDecimals { .. })
        ));
    }

    #[test]
    fn test_sanity_check_empty_list() {
        assert!(matches!(
            sanity_check_ix_order(&[]),
            Err(IssuanceError::InvalidInstructionOrder(_))
        ));
    }

    #[test]
    fn test_sanity_check_rejects_every_swap() {
        let plan = plan_mint_instructions(&params()).unwrap();

        for i in 0..4 {
            for j in (i + 1)..4 {
                let mut swapped = plan.instructions.clone();
                swapped.swap(i, j);
                let err = sanity_check_ix_order(&swapped).unwrap_err();
                assert!(
                    matches!(err, IssuanceError::InvalidInstructionOrder(_)),
                    "swap ({i},{j}) accepted"
                );
            }
        }
    }

    #[test]
    fn test_sanity_check_rejects_missing_and_foreign() {
        let plan = plan_mint_instructions(&params()).unwrap();

        let mut missing = plan.instructions.clone();
        missing.remove(2);
        let err = sanity_check_ix_order(&missing).unwrap_err();
        assert!(err.to_string().contains("Expected 4 instructions"));

        let mut foreign = plan.instructions.clone();
        foreign[2] = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1, 2, 3],
            vec![AccountMeta::new(Pubkey::new_unique(), false)],
        );
        let err = sanity_check_ix_order(&foreign).unwrap_err();
        assert!(err.to_string().contains("unrecognised"));
    }

    #[test]
    fn test_at_position() {
        assert_eq!(
            MintInstructionKind::at_position(0),
            Some(MintInstructionKind::AllocateRecord)
        );
        assert_eq!(
            MintInstructionKind::at_position(3),
            Some(MintInstructionKind::IssueSupply)
        );
        assert_eq!(MintInstructionKind::at_position(4), None);
    }
}
