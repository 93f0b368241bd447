//! Test Utilities Module
//!
//! An in-memory ledger implementing [`LedgerRpc`] for deterministic tests.
//! It executes the system `CreateAccount`, token `InitializeMint2` and
//! `MintToChecked`, and associated-token-account `Create`/`CreateIdempotent`
//! instructions atomically: a transaction either applies every instruction
//! or leaves account state untouched.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::{
    hash::Hash,
    instruction::InstructionError,
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    system_program,
    transaction::{Transaction, TransactionError},
};
#[allow(deprecated)]
use solana_sdk::system_instruction::SystemError;
use spl_token::error::TokenError;
use spl_token::instruction::TokenInstruction;
use spl_token::solana_program::program_option::COption;

use crate::rpc_manager::{
    ConfirmationLevel, LedgerRpc, LivenessToken, RpcManagerError, SignatureStatus,
};
use crate::tx_builder::address::derive_holding_address;
use crate::tx_builder::rent::MINT_RECORD_SIZE;

pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

/// Block heights a blockhash stays valid for after it is handed out
pub const BLOCKHASH_VALIDITY: u64 = 150;

/// Byte size of an SPL token account record
pub const TOKEN_ACCOUNT_SIZE: usize = 165;

const RENT_ACCOUNT_OVERHEAD: u64 = 128;
const RENT_LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
const RENT_EXEMPTION_YEARS: u64 = 2;

const ENDPOINT: &str = "mock://ledger";

const SYSTEM_ACCOUNT_ALREADY_IN_USE: u32 = SystemError::AccountAlreadyInUse as u32;
const SYSTEM_RESULT_WITH_NEGATIVE_LAMPORTS: u32 = SystemError::ResultWithNegativeLamports as u32;

const TOKEN_NOT_RENT_EXEMPT: u32 = TokenError::NotRentExempt as u32;
const TOKEN_MINT_MISMATCH: u32 = TokenError::MintMismatch as u32;
const TOKEN_OWNER_MISMATCH: u32 = TokenError::OwnerMismatch as u32;
const TOKEN_ALREADY_IN_USE: u32 = TokenError::AlreadyInUse as u32;
const TOKEN_OVERFLOW: u32 = TokenError::Overflow as u32;
const TOKEN_MINT_DECIMALS_MISMATCH: u32 = TokenError::MintDecimalsMismatch as u32;

/// Initialized mint record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockMint {
    pub decimals: u8,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub supply: u64,
}

/// Initialized token account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountData {
    Empty,
    /// Allocated but not initialized
    Raw(usize),
    Mint(MockMint),
    Token(MockTokenAccount),
}

#[derive(Debug, Clone)]
struct MockAccount {
    lamports: u64,
    owner: Pubkey,
    data: AccountData,
}

impl MockAccount {
    fn wallet(lamports: u64) -> Self {
        Self {
            lamports,
            owner: system_program::id(),
            data: AccountData::Empty,
        }
    }
}

#[derive(Debug)]
struct LedgerState {
    accounts: HashMap<Pubkey, MockAccount>,
    block_height: u64,
    slot: u64,
    /// Blockhash -> last valid block height
    blockhashes: HashMap<Hash, u64>,
    statuses: HashMap<Signature, SignatureStatus>,
}

/// One instruction resolved against the message's account keys
struct ResolvedInstruction {
    program_id: Pubkey,
    accounts: Vec<(Pubkey, bool)>,
    data: Vec<u8>,
}

impl ResolvedInstruction {
    fn account(&self, index: usize) -> Result<Pubkey, InstructionError> {
        self.accounts
            .get(index)
            .map(|(key, _)| *key)
            .ok_or(InstructionError::NotEnoughAccountKeys)
    }

    fn require_signer(&self, index: usize) -> Result<Pubkey, InstructionError> {
        match self.accounts.get(index) {
            Some((key, true)) => Ok(*key),
            Some((_, false)) => Err(InstructionError::MissingRequiredSignature),
            None => Err(InstructionError::NotEnoughAccountKeys),
        }
    }
}

/// In-memory ledger with fault injection
#[derive(Debug)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    confirmation: Mutex<ConfirmationLevel>,

    // Faults
    rent_unavailable: AtomicBool,
    liveness_unavailable: AtomicBool,
    fail_next_sends: AtomicU32,
    drop_next_sends: AtomicU32,
    fail_next_status_polls: AtomicU32,
    fail_next_height_queries: AtomicU32,
    black_hole: AtomicBool,
    skip_preflight: AtomicBool,
    height_step: AtomicU64,

    // Counters
    rent_queries: AtomicU32,
    blockhash_queries: AtomicU32,
    send_count: AtomicU32,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                accounts: HashMap::new(),
                block_height: 1_000,
                slot: 1_000,
                blockhashes: HashMap::new(),
                statuses: HashMap::new(),
            }),
            confirmation: Mutex::new(ConfirmationLevel::Finalized),
            rent_unavailable: AtomicBool::new(false),
            liveness_unavailable: AtomicBool::new(false),
            fail_next_sends: AtomicU32::new(0),
            drop_next_sends: AtomicU32::new(0),
            fail_next_status_polls: AtomicU32::new(0),
            fail_next_height_queries: AtomicU32::new(0),
            black_hole: AtomicBool::new(false),
            skip_preflight: AtomicBool::new(false),
            height_step: AtomicU64::new(0),
            rent_queries: AtomicU32::new(0),
            blockhash_queries: AtomicU32::new(0),
            send_count: AtomicU32::new(0),
        }
    }

    /// Ledger with `pubkey` already holding `lamports`
    pub fn with_funded(pubkey: &Pubkey, lamports: u64) -> Self {
        let ledger = Self::new();
        ledger.fund(pubkey, lamports);
        ledger
    }

    /// Rent-exempt minimum for `size` bytes
    pub fn rent_for(size: usize) -> u64 {
        (RENT_ACCOUNT_OVERHEAD + size as u64) * RENT_LAMPORTS_PER_BYTE_YEAR * RENT_EXEMPTION_YEARS
    }

    pub fn fund(&self, pubkey: &Pubkey, lamports: u64) {
        let mut state = self.state.lock();
        state
            .accounts
            .entry(*pubkey)
            .and_modify(|account| account.lamports += lamports)
            .or_insert_with(|| MockAccount::wallet(lamports));
    }

    /// Seed an allocated, uninitialized account
    pub fn create_raw_account(&self, pubkey: &Pubkey, space: usize, owner: &Pubkey) {
        self.state.lock().accounts.insert(
            *pubkey,
            MockAccount {
                lamports: Self::rent_for(space),
                owner: *owner,
                data: AccountData::Raw(space),
            },
        );
    }

    // Fault injection

    pub fn set_rent_unavailable(&self, unavailable: bool) {
        self.rent_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_liveness_unavailable(&self, unavailable: bool) {
        self.liveness_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `count` sends with a transport error
    pub fn fail_next_sends(&self, count: u32) {
        self.fail_next_sends.store(count, Ordering::SeqCst);
    }

    /// Accept the next `count` sends without landing them
    pub fn drop_next_sends(&self, count: u32) {
        self.drop_next_sends.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` signature status reads with a transport error
    pub fn set_status_unavailable(&self, count: u32) {
        self.fail_next_status_polls.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` block height reads with a transport error
    pub fn set_height_unavailable(&self, count: u32) {
        self.fail_next_height_queries.store(count, Ordering::SeqCst);
    }

    /// Accept sends without ever landing them
    pub fn set_black_hole(&self, black_hole: bool) {
        self.black_hole.store(black_hole, Ordering::SeqCst);
    }

    /// Land failing transactions (fee charged, no state change) instead of
    /// refusing them at send time
    pub fn set_skip_preflight(&self, skip: bool) {
        self.skip_preflight.store(skip, Ordering::SeqCst);
    }

    /// Advance the block height by `step` on every height query
    pub fn set_height_step(&self, step: u64) {
        self.height_step.store(step, Ordering::SeqCst);
    }

    /// Commitment reported for landed transactions
    pub fn set_confirmation(&self, level: ConfirmationLevel) {
        *self.confirmation.lock() = level;
    }

    pub fn advance_block_height(&self, blocks: u64) {
        let mut state = self.state.lock();
        state.block_height += blocks;
        state.slot += blocks;
    }

    // Inspection

    pub fn block_height(&self) -> u64 {
        self.state.lock().block_height
    }

    pub fn rent_queries(&self) -> u32 {
        self.rent_queries.load(Ordering::SeqCst)
    }

    pub fn blockhash_queries(&self) -> u32 {
        self.blockhash_queries.load(Ordering::SeqCst)
    }

    /// Sends received, including ones failed by injected faults
    pub fn send_count(&self) -> u32 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn account_exists(&self, pubkey: &Pubkey) -> bool {
        self.state.lock().accounts.contains_key(pubkey)
    }

    pub fn lamports(&self, pubkey: &Pubkey) -> u64 {
        self.state
            .lock()
            .accounts
            .get(pubkey)
            .map(|account| account.lamports)
            .unwrap_or(0)
    }

    pub fn account_owner(&self, pubkey: &Pubkey) -> Option<Pubkey> {
        self.state.lock().accounts.get(pubkey).map(|a| a.owner)
    }

    pub fn mint_state(&self, mint: &Pubkey) -> Option<MockMint> {
        match self.state.lock().accounts.get(mint).map(|a| &a.data) {
            Some(AccountData::Mint(mint)) => Some(mint.clone()),
            _ => None,
        }
    }

    pub fn token_account(&self, holding: &Pubkey) -> Option<MockTokenAccount> {
        match self.state.lock().accounts.get(holding).map(|a| &a.data) {
            Some(AccountData::Token(account)) => Some(account.clone()),
            _ => None,
        }
    }

    pub fn token_balance(&self, holding: &Pubkey) -> Option<u64> {
        self.token_account(holding).map(|account| account.amount)
    }

    /// Signatures of transactions that landed, successful or not
    pub fn landed_count(&self) -> usize {
        self.state.lock().statuses.len()
    }

    fn take_one(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn transport_error(&self, message: &str) -> RpcManagerError {
        RpcManagerError::Transport {
            endpoint: ENDPOINT.to_string(),
            message: message.to_string(),
        }
    }

    fn rejected(error: TransactionError) -> RpcManagerError {
        RpcManagerError::from_transaction_error(error, ENDPOINT)
    }

    fn resolve(message: &Message) -> Result<Vec<ResolvedInstruction>, TransactionError> {
        message
            .instructions
            .iter()
            .map(|ix| {
                let program_id = *message
                    .account_keys
                    .get(ix.program_id_index as usize)
                    .ok_or(TransactionError::ProgramAccountNotFound)?;
                let accounts = ix
                    .accounts
                    .iter()
                    .map(|&i| {
                        message
                            .account_keys
                            .get(i as usize)
                            .map(|key| (*key, message.is_signer(i as usize)))
                            .ok_or(TransactionError::AccountNotFound)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ResolvedInstruction {
                    program_id,
                    accounts,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }

    fn execute(
        accounts: &mut HashMap<Pubkey, MockAccount>,
        ix: &ResolvedInstruction,
    ) -> Result<(), InstructionError> {
        if ix.program_id == system_program::id() {
            Self::execute_system(accounts, ix)
        } else if ix.program_id == spl_token::id() {
            Self::execute_token(accounts, ix)
        } else if ix.program_id == spl_associated_token_account::id() {
            Self::execute_associated(accounts, ix)
        } else {
            Err(InstructionError::UnsupportedProgramId)
        }
    }

    fn execute_system(
        accounts: &mut HashMap<Pubkey, MockAccount>,
        ix: &ResolvedInstruction,
    ) -> Result<(), InstructionError> {
        let data = &ix.data;
        if data.len() < 52 || data[..4] != [0, 0, 0, 0] {
            return Err(InstructionError::InvalidInstructionData);
        }

        let read_u64 = |range: std::ops::Range<usize>| {
            <[u8; 8]>::try_from(&data[range])
                .map(u64::from_le_bytes)
                .map_err(|_| InstructionError::InvalidInstructionData)
        };
        let lamports = read_u64(4..12)?;
        let space = read_u64(12..20)? as usize;
        let owner = Pubkey::try_from(&data[20..52])
            .map_err(|_| InstructionError::InvalidInstructionData)?;

        let from = ix.require_signer(0)?;
        let to = ix.require_signer(1)?;

        Self::create_account(accounts, &from, &to, lamports, space, owner)
    }

    fn create_account(
        accounts: &mut HashMap<Pubkey, MockAccount>,
        from: &Pubkey,
        to: &Pubkey,
        lamports: u64,
        space: usize,
        owner: Pubkey,
    ) -> Result<(), InstructionError> {
        if accounts.contains_key(to) {
            return Err(InstructionError::Custom(SYSTEM_ACCOUNT_ALREADY_IN_USE));
        }

        let payer = accounts
            .get_mut(from)
            .ok_or(InstructionError::Custom(SYSTEM_RESULT_WITH_NEGATIVE_LAMPORTS))?;
        if payer.lamports < lamports {
            return Err(InstructionError::Custom(SYSTEM_RESULT_WITH_NEGATIVE_LAMPORTS));
        }
        payer.lamports -= lamports;

        accounts.insert(
            *to,
            MockAccount {
                lamports,
                owner,
                data: AccountData::Raw(space),
            },
        );
        Ok(())
    }

    fn execute_token(
        accounts: &mut HashMap<Pubkey, MockAccount>,
        ix: &ResolvedInstruction,
    ) -> Result<(), InstructionError> {
        let instruction =
            TokenInstruction::unpack(&ix.data).map_err(|_| InstructionError::InvalidInstructionData)?;

        match instruction {
            TokenInstruction::InitializeMint2 {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                let mint_key = ix.account(0)?;
                let account = accounts
                    .get_mut(&mint_key)
                    .ok_or(InstructionError::InvalidAccountData)?;

                if account.owner != spl_token::id() {
                    return Err(InstructionError::IncorrectProgramId);
                }
                match account.data {
                    AccountData::Mint(_) => {
                        return Err(InstructionError::Custom(TOKEN_ALREADY_IN_USE))
                    }
                    AccountData::Raw(size) if size == MINT_RECORD_SIZE => {}
                    _ => return Err(InstructionError::InvalidAccountData),
                }
                if account.lamports < Self::rent_for(MINT_RECORD_SIZE) {
                    return Err(InstructionError::Custom(TOKEN_NOT_RENT_EXEMPT));
                }

                let freeze_authority = match freeze_authority {
                    COption::Some(key) => Some(key),
                    COption::None => None,
                };
                account.data = AccountData::Mint(MockMint {
                    decimals,
                    mint_authority: Some(mint_authority),
                    freeze_authority,
                    supply: 0,
                });
                Ok(())
            }

            TokenInstruction::MintToChecked { amount, decimals } => {
                let mint_key = ix.account(0)?;
                let destination_key = ix.account(1)?;
                let (authority, authority_signed) = *ix
                    .accounts
                    .get(2)
                    .ok_or(InstructionError::NotEnoughAccountKeys)?;

                match accounts.get(&destination_key).map(|a| &a.data) {
                    Some(AccountData::Token(token)) if token.mint == mint_key => {}
                    Some(AccountData::Token(_)) => {
                        return Err(InstructionError::Custom(TOKEN_MINT_MISMATCH))
                    }
                    _ => return Err(InstructionError::UninitializedAccount),
                }

                let mint = match accounts.get_mut(&mint_key).map(|a| &mut a.data) {
                    Some(AccountData::Mint(mint)) => mint,
                    _ => return Err(InstructionError::UninitializedAccount),
                };
                if decimals != mint.decimals {
                    return Err(InstructionError::Custom(TOKEN_MINT_DECIMALS_MISMATCH));
                }
                if mint.mint_authority != Some(authority) {
                    return Err(InstructionError::Custom(TOKEN_OWNER_MISMATCH));
                }
                if !authority_signed {
                    return Err(InstructionError::MissingRequiredSignature);
                }
                mint.supply = mint
                    .supply
                    .checked_add(amount)
                    .ok_or(InstructionError::Custom(TOKEN_OVERFLOW))?;

                if let Some(AccountData::Token(token)) =
                    accounts.get_mut(&destination_key).map(|a| &mut a.data)
                {
                    token.amount = token
                        .amount
                        .checked_add(amount)
                        .ok_or(InstructionError::Custom(TOKEN_OVERFLOW))?;
                }
                Ok(())
            }

            _ => Err(InstructionError::InvalidInstructionData),
        }
    }

    fn execute_associated(
        accounts: &mut HashMap<Pubkey, MockAccount>,
        ix: &ResolvedInstruction,
    ) -> Result<(), InstructionError> {
        let idempotent = match ix.data.first() {
            None | Some(0) => false,
            Some(1) => true,
            Some(_) => return Err(InstructionError::InvalidInstructionData),
        };

        let payer = ix.require_signer(0)?;
        let holding = ix.account(1)?;
        let wallet = ix.account(2)?;
        let mint = ix.account(3)?;

        if derive_holding_address(&mint, &wallet) != holding {
            return Err(InstructionError::InvalidSeeds);
        }

        match accounts.get(&mint) {
            Some(account) if account.owner != spl_token::id() => {
                return Err(InstructionError::IllegalOwner)
            }
            Some(MockAccount {
                data: AccountData::Mint(_),
                ..
            }) => {}
            _ => return Err(InstructionError::InvalidAccountData),
        }

        if let Some(existing) = accounts.get(&holding) {
            return match &existing.data {
                AccountData::Token(token)
                    if idempotent && token.mint == mint && token.owner == wallet =>
                {
                    Ok(())
                }
                _ => Err(InstructionError::Custom(SYSTEM_ACCOUNT_ALREADY_IN_USE)),
            };
        }

        Self::create_account(
            accounts,
            &payer,
            &holding,
            Self::rent_for(TOKEN_ACCOUNT_SIZE),
            TOKEN_ACCOUNT_SIZE,
            spl_token::id(),
        )?;
        if let Some(account) = accounts.get_mut(&holding) {
            account.data = AccountData::Token(MockTokenAccount {
                mint,
                owner: wallet,
                amount: 0,
            });
        }
        Ok(())
    }

    fn process(&self, transaction: &Transaction) -> Result<Signature, RpcManagerError> {
        transaction
            .verify()
            .map_err(|_| Self::rejected(TransactionError::SignatureFailure))?;
        let signature = *transaction
            .signatures
            .first()
            .ok_or_else(|| Self::rejected(TransactionError::SignatureFailure))?;
        let message = &transaction.message;

        let mut state = self.state.lock();

        if state.statuses.contains_key(&signature) {
            return Err(Self::rejected(TransactionError::AlreadyProcessed));
        }

        match state.blockhashes.get(&message.recent_blockhash) {
            Some(&last_valid) if state.block_height <= last_valid => {}
            _ => {
                return Err(RpcManagerError::BlockhashNotFound {
                    endpoint: ENDPOINT.to_string(),
                })
            }
        }

        if self.black_hole.load(Ordering::SeqCst) || Self::take_one(&self.drop_next_sends) {
            return Ok(signature);
        }

        let fee_payer = message
            .account_keys
            .first()
            .copied()
            .ok_or_else(|| Self::rejected(TransactionError::AccountNotFound))?;
        let fee = LAMPORTS_PER_SIGNATURE * message.header.num_required_signatures as u64;
        match state.accounts.get(&fee_payer) {
            Some(account) if account.lamports >= fee => {}
            Some(_) => return Err(Self::rejected(TransactionError::InsufficientFundsForFee)),
            None => return Err(Self::rejected(TransactionError::AccountNotFound)),
        }

        let instructions = Self::resolve(message).map_err(Self::rejected)?;

        let mut working = state.accounts.clone();
        if let Some(payer) = working.get_mut(&fee_payer) {
            payer.lamports -= fee;
        }

        let mut outcome = Ok(());
        for (index, ix) in instructions.iter().enumerate() {
            if let Err(e) = Self::execute(&mut working, ix) {
                outcome = Err(TransactionError::InstructionError(index as u8, e));
                break;
            }
        }

        if let Err(err) = outcome {
            if !self.skip_preflight.load(Ordering::SeqCst) {
                return Err(Self::rejected(err));
            }
            // Landed but failed: only the fee is charged
            if let Some(payer) = state.accounts.get_mut(&fee_payer) {
                payer.lamports -= fee;
            }
            self.record(&mut state, signature, Some(err));
            return Ok(signature);
        }

        state.accounts = working;
        self.record(&mut state, signature, None);
        Ok(signature)
    }

    fn record(&self, state: &mut LedgerState, signature: Signature, err: Option<TransactionError>) {
        state.slot += 1;
        let status = SignatureStatus {
            slot: state.slot,
            err,
            confirmation: *self.confirmation.lock(),
        };
        state.statuses.insert(signature, status);
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    fn endpoint(&self) -> String {
        ENDPOINT.to_string()
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, RpcManagerError> {
        self.rent_queries.fetch_add(1, Ordering::SeqCst);
        if self.rent_unavailable.load(Ordering::SeqCst) {
            return Err(self.transport_error("connection refused"));
        }
        Ok(Self::rent_for(data_len))
    }

    async fn get_latest_blockhash(&self) -> Result<LivenessToken, RpcManagerError> {
        self.blockhash_queries.fetch_add(1, Ordering::SeqCst);
        if self.liveness_unavailable.load(Ordering::SeqCst) {
            return Err(self.transport_error("connection refused"));
        }

        let mut state = self.state.lock();
        let blockhash = Hash::new_unique();
        let last_valid_block_height = state.block_height + BLOCKHASH_VALIDITY;
        state.blockhashes.insert(blockhash, last_valid_block_height);
        Ok(LivenessToken {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn get_block_height(&self) -> Result<u64, RpcManagerError> {
        if Self::take_one(&self.fail_next_height_queries) {
            return Err(self.transport_error("connection reset by peer"));
        }

        let step = self.height_step.load(Ordering::SeqCst);
        let mut state = self.state.lock();
        let height = state.block_height;
        state.block_height += step;
        state.slot += step;
        Ok(height)
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, RpcManagerError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);

        if Self::take_one(&self.fail_next_sends) {
            return Err(self.transport_error("connection reset by peer"));
        }

        self.process(transaction)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcManagerError> {
        if Self::take_one(&self.fail_next_status_polls) {
            return Err(self.transport_error("connection reset by peer"));
        }

        Ok(self.state.lock().statuses.get(signature).cloned())
    }

    async fn request_airdrop(
        &self,
        to: &Pubkey,
        lamports: u64,
    ) -> Result<Signature, RpcManagerError> {
        self.fund(to, lamports);
        let signature = Signature::new_unique();
        let mut state = self.state.lock();
        self.record(&mut state, signature, None);
        Ok(signature)
    }
}
