//! Program instruction builders
//!
//! Every builder returns a [`ProgramInstruction`]: the raw Solana
//! instruction tagged with what it does. Bundle-level checks (exactly one
//! tip, tip placement) read the tag instead of sniffing program ids and
//! payload bytes.
//!
//! All validation here is local. No builder performs network I/O; PDAs
//! and pool keys are derived or supplied up front.

use std::str::FromStr;

use borsh::BorshSerialize;
use solana_sdk::{
    address_lookup_table::instruction::{create_lookup_table, extend_lookup_table},
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction, system_program, sysvar,
};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

use super::constants::{
    amm_tags, discriminators, AMM_V4_CREATE_FEE_DESTINATION, LOOKUP_TABLE_EXTEND_BATCH,
    METADATA_PROGRAM_ID, PUMP_EVENT_AUTHORITY, PUMP_FEE_RECIPIENT, PUMP_GLOBAL,
    PUMP_MINT_AUTHORITY, PUMP_PROGRAM_ID,
};
use super::errors::BundleError;
use super::pda;

/// What an instruction does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    CreateToken,
    Buy,
    Sell,
    CreatePool,
    Swap,
    RemoveLiquidity,
    CreateAssociatedAccount,
    CreateLookupTable,
    ExtendLookupTable,
    Transfer,
    TokenTransfer,
    SyncNative,
    Tip,
    ComputeBudget,
}

/// An instruction tagged with its kind
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInstruction {
    kind: InstructionKind,
    instruction: Instruction,
}

impl ProgramInstruction {
    pub fn new(kind: InstructionKind, instruction: Instruction) -> Self {
        Self { kind, instruction }
    }

    pub fn kind(&self) -> InstructionKind {
        self.kind
    }

    pub fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.instruction.program_id
    }

    pub fn accounts(&self) -> &[AccountMeta] {
        &self.instruction.accounts
    }

    pub fn data(&self) -> &[u8] {
        &self.instruction.data
    }

    /// Accounts flagged as signers
    pub fn signers(&self) -> impl Iterator<Item = &Pubkey> {
        self.instruction
            .accounts
            .iter()
            .filter(|meta| meta.is_signer)
            .map(|meta| &meta.pubkey)
    }
}

/// Parse a base-58 address
pub fn parse_address(input: &str) -> Result<Pubkey, BundleError> {
    let trimmed = input.trim();
    let decoded = bs58::decode(trimmed)
        .into_vec()
        .map_err(|e| BundleError::invalid_address(trimmed, e.to_string()))?;
    if decoded.len() != 32 {
        return Err(BundleError::invalid_address(
            trimmed,
            format!("expected 32 bytes, got {}", decoded.len()),
        ));
    }
    Pubkey::from_str(trimmed).map_err(|e| BundleError::invalid_address(trimmed, e.to_string()))
}

/// Parse a wallet address, rejecting program-derived (off-curve) addresses
pub fn parse_wallet_address(input: &str) -> Result<Pubkey, BundleError> {
    let address = parse_address(input)?;
    if !address.is_on_curve() {
        return Err(BundleError::invalid_address(
            input.trim(),
            "address is not on the ed25519 curve",
        ));
    }
    Ok(address)
}

#[derive(BorshSerialize)]
struct CreateArgs {
    name: String,
    symbol: String,
    uri: String,
}

#[derive(BorshSerialize)]
struct BuyArgs {
    amount: u64,
    max_sol_cost: u64,
}

#[derive(BorshSerialize)]
struct SellArgs {
    amount: u64,
    min_sol_output: u64,
}

fn anchor_data<T: BorshSerialize>(discriminator: [u8; 8], args: &T) -> Result<Vec<u8>, BundleError> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)
        .map_err(|e| BundleError::internal(format!("failed to encode instruction args: {}", e)))?;
    Ok(data)
}

/// Launch a token on the bonding-curve program
///
/// `mint` must sign the transaction carrying this instruction (fresh
/// keypair); `creator` pays for every account created.
pub fn build_create_token(
    mint: &Pubkey,
    creator: &Pubkey,
    name: &str,
    symbol: &str,
    metadata_uri: &str,
) -> Result<ProgramInstruction, BundleError> {
    if name.is_empty() || symbol.is_empty() {
        return Err(BundleError::Configuration(
            "token name and symbol must not be empty".to_string(),
        ));
    }

    let data = anchor_data(
        discriminators::CREATE,
        &CreateArgs {
            name: name.to_string(),
            symbol: symbol.to_string(),
            uri: metadata_uri.to_string(),
        },
    )?;

    let accounts = vec![
        AccountMeta::new(*mint, true),
        AccountMeta::new_readonly(PUMP_MINT_AUTHORITY, false),
        AccountMeta::new(pda::bonding_curve(mint), false),
        AccountMeta::new(pda::associated_bonding_curve(mint), false),
        AccountMeta::new_readonly(PUMP_GLOBAL, false),
        AccountMeta::new_readonly(METADATA_PROGRAM_ID, false),
        AccountMeta::new(pda::metadata(mint), false),
        AccountMeta::new(*creator, true),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(PUMP_EVENT_AUTHORITY, false),
        AccountMeta::new_readonly(PUMP_PROGRAM_ID, false),
    ];

    Ok(ProgramInstruction::new(
        InstructionKind::CreateToken,
        Instruction {
            program_id: PUMP_PROGRAM_ID,
            accounts,
            data,
        },
    ))
}

/// Buy `min_tokens_out` tokens spending at most `sol_amount` lamports
///
/// Amounts are raw units; no decimal scaling happens here.
pub fn build_buy(
    mint: &Pubkey,
    buyer: &Pubkey,
    sol_amount: u64,
    min_tokens_out: u64,
) -> Result<ProgramInstruction, BundleError> {
    let data = anchor_data(
        discriminators::BUY,
        &BuyArgs {
            amount: min_tokens_out,
            max_sol_cost: sol_amount,
        },
    )?;

    let accounts = vec![
        AccountMeta::new_readonly(PUMP_GLOBAL, false),
        AccountMeta::new(PUMP_FEE_RECIPIENT, false),
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new(pda::bonding_curve(mint), false),
        AccountMeta::new(pda::associated_bonding_curve(mint), false),
        AccountMeta::new(pda::associated_token(buyer, mint), false),
        AccountMeta::new(*buyer, true),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(PUMP_EVENT_AUTHORITY, false),
        AccountMeta::new_readonly(PUMP_PROGRAM_ID, false),
    ];

    Ok(ProgramInstruction::new(
        InstructionKind::Buy,
        Instruction {
            program_id: PUMP_PROGRAM_ID,
            accounts,
            data,
        },
    ))
}

/// Sell `token_amount` raw token units for at least `min_sol_out` lamports
pub fn build_sell(
    mint: &Pubkey,
    seller: &Pubkey,
    token_amount: u64,
    min_sol_out: u64,
) -> Result<ProgramInstruction, BundleError> {
    let data = anchor_data(
        discriminators::SELL,
        &SellArgs {
            amount: token_amount,
            min_sol_output: min_sol_out,
        },
    )?;

    let accounts = vec![
        AccountMeta::new_readonly(PUMP_GLOBAL, false),
        AccountMeta::new(PUMP_FEE_RECIPIENT, false),
        AccountMeta::new_readonly(*mint, false),
        AccountMeta::new(pda::bonding_curve(mint), false),
        AccountMeta::new(pda::associated_bonding_curve(mint), false),
        AccountMeta::new(pda::associated_token(seller, mint), false),
        AccountMeta::new(*seller, true),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(PUMP_EVENT_AUTHORITY, false),
        AccountMeta::new_readonly(PUMP_PROGRAM_ID, false),
    ];

    Ok(ProgramInstruction::new(
        InstructionKind::Sell,
        Instruction {
            program_id: PUMP_PROGRAM_ID,
            accounts,
            data,
        },
    ))
}

/// Accounts of an AMM v4 pool and its backing market
///
/// Resolved by the caller from on-chain pool state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmmPoolKeys {
    pub program_id: Pubkey,
    pub id: Pubkey,
    pub authority: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub config: Pubkey,
    pub lp_mint: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub withdraw_queue: Pubkey,
    pub lp_vault: Pubkey,
    pub market_program_id: Pubkey,
    pub market_id: Pubkey,
    pub market_authority: Pubkey,
    pub market_base_vault: Pubkey,
    pub market_quote_vault: Pubkey,
    pub market_bids: Pubkey,
    pub market_asks: Pubkey,
    pub market_event_queue: Pubkey,
}

/// Initial liquidity for a new AMM v4 pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct CreatePoolParams {
    pub nonce: u8,
    pub open_time: u64,
    pub base_amount: u64,
    pub quote_amount: u64,
}

/// Create and seed an AMM v4 pool from `owner`'s token accounts
pub fn build_create_pool(
    keys: &AmmPoolKeys,
    owner: &Pubkey,
    params: &CreatePoolParams,
) -> Result<ProgramInstruction, BundleError> {
    if params.base_amount == 0 || params.quote_amount == 0 {
        return Err(BundleError::Configuration(
            "initial pool liquidity must be non-zero on both sides".to_string(),
        ));
    }

    let mut data = Vec::with_capacity(26);
    data.push(amm_tags::INITIALIZE2);
    data.push(params.nonce);
    data.extend_from_slice(&params.open_time.to_le_bytes());
    data.extend_from_slice(&params.quote_amount.to_le_bytes());
    data.extend_from_slice(&params.base_amount.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(spl_associated_token_account::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new(keys.id, false),
        AccountMeta::new_readonly(keys.authority, false),
        AccountMeta::new(keys.open_orders, false),
        AccountMeta::new(keys.lp_mint, false),
        AccountMeta::new_readonly(keys.base_mint, false),
        AccountMeta::new_readonly(keys.quote_mint, false),
        AccountMeta::new(keys.base_vault, false),
        AccountMeta::new(keys.quote_vault, false),
        AccountMeta::new(keys.target_orders, false),
        AccountMeta::new_readonly(keys.config, false),
        AccountMeta::new(AMM_V4_CREATE_FEE_DESTINATION, false),
        AccountMeta::new_readonly(keys.market_program_id, false),
        AccountMeta::new_readonly(keys.market_id, false),
        AccountMeta::new(*owner, true),
        AccountMeta::new(pda::associated_token(owner, &keys.base_mint), false),
        AccountMeta::new(pda::associated_token(owner, &keys.quote_mint), false),
        AccountMeta::new(pda::associated_token(owner, &keys.lp_mint), false),
    ];

    Ok(ProgramInstruction::new(
        InstructionKind::CreatePool,
        Instruction {
            program_id: keys.program_id,
            accounts,
            data,
        },
    ))
}

/// Fixed-input swap through an AMM v4 pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    pub source: Pubkey,
    pub destination: Pubkey,
    pub amount_in: u64,
    pub min_amount_out: u64,
}

/// Swap `amount_in` from `source` into `destination`, both owned by `owner`
pub fn build_swap(
    keys: &AmmPoolKeys,
    owner: &Pubkey,
    params: &SwapParams,
) -> Result<ProgramInstruction, BundleError> {
    let mut data = Vec::with_capacity(17);
    data.push(amm_tags::SWAP_BASE_IN);
    data.extend_from_slice(&params.amount_in.to_le_bytes());
    data.extend_from_slice(&params.min_amount_out.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(keys.id, false),
        AccountMeta::new_readonly(keys.authority, false),
        AccountMeta::new(keys.open_orders, false),
        AccountMeta::new(keys.target_orders, false),
        AccountMeta::new(keys.base_vault, false),
        AccountMeta::new(keys.quote_vault, false),
        AccountMeta::new_readonly(keys.market_program_id, false),
        AccountMeta::new(keys.market_id, false),
        AccountMeta::new(keys.market_bids, false),
        AccountMeta::new(keys.market_asks, false),
        AccountMeta::new(keys.market_event_queue, false),
        AccountMeta::new(keys.market_base_vault, false),
        AccountMeta::new(keys.market_quote_vault, false),
        AccountMeta::new_readonly(keys.market_authority, false),
        AccountMeta::new(params.source, false),
        AccountMeta::new(params.destination, false),
        AccountMeta::new_readonly(*owner, true),
    ];

    Ok(ProgramInstruction::new(
        InstructionKind::Swap,
        Instruction {
            program_id: keys.program_id,
            accounts,
            data,
        },
    ))
}

/// Burn `lp_amount` LP tokens from `owner` and withdraw both sides
pub fn build_remove_liquidity(
    keys: &AmmPoolKeys,
    owner: &Pubkey,
    lp_amount: u64,
) -> Result<ProgramInstruction, BundleError> {
    if lp_amount == 0 {
        return Err(BundleError::Configuration(
            "LP amount to withdraw must be non-zero".to_string(),
        ));
    }

    let mut data = Vec::with_capacity(9);
    data.push(amm_tags::WITHDRAW);
    data.extend_from_slice(&lp_amount.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new(keys.id, false),
        AccountMeta::new_readonly(keys.authority, false),
        AccountMeta::new(keys.open_orders, false),
        AccountMeta::new(keys.target_orders, false),
        AccountMeta::new(keys.lp_mint, false),
        AccountMeta::new(keys.base_vault, false),
        AccountMeta::new(keys.quote_vault, false),
        AccountMeta::new(keys.withdraw_queue, false),
        AccountMeta::new(keys.lp_vault, false),
        AccountMeta::new_readonly(keys.market_program_id, false),
        AccountMeta::new(keys.market_id, false),
        AccountMeta::new(keys.market_base_vault, false),
        AccountMeta::new(keys.market_quote_vault, false),
        AccountMeta::new_readonly(keys.market_authority, false),
        AccountMeta::new(pda::associated_token(owner, &keys.lp_mint), false),
        AccountMeta::new(pda::associated_token(owner, &keys.base_mint), false),
        AccountMeta::new(pda::associated_token(owner, &keys.quote_mint), false),
        AccountMeta::new_readonly(*owner, true),
        AccountMeta::new(keys.market_event_queue, false),
        AccountMeta::new(keys.market_bids, false),
        AccountMeta::new(keys.market_asks, false),
    ];

    Ok(ProgramInstruction::new(
        InstructionKind::RemoveLiquidity,
        Instruction {
            program_id: keys.program_id,
            accounts,
            data,
        },
    ))
}

/// Create `owner`'s token account for `mint`, paid by `owner`
///
/// Idempotent: succeeds on-chain when the account already exists, so no
/// existence check is needed before including it.
pub fn build_associated_account_idempotent(owner: &Pubkey, mint: &Pubkey) -> ProgramInstruction {
    build_associated_account_for(owner, owner, mint)
}

/// Same as [`build_associated_account_idempotent`] with a separate funder
pub fn build_associated_account_for(
    funder: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> ProgramInstruction {
    ProgramInstruction::new(
        InstructionKind::CreateAssociatedAccount,
        create_associated_token_account_idempotent(funder, owner, mint, &spl_token::id()),
    )
}

/// Create an address lookup table; returns the instruction and table address
pub fn build_create_lookup_table(
    authority: &Pubkey,
    payer: &Pubkey,
    recent_slot: u64,
) -> (ProgramInstruction, Pubkey) {
    let (instruction, table) = create_lookup_table(*authority, *payer, recent_slot);
    (
        ProgramInstruction::new(InstructionKind::CreateLookupTable, instruction),
        table,
    )
}

/// Extend a lookup table with at most one batch of addresses
pub fn build_extend_lookup_table(
    table: &Pubkey,
    authority: &Pubkey,
    payer: &Pubkey,
    addresses: &[Pubkey],
) -> Result<ProgramInstruction, BundleError> {
    if addresses.is_empty() || addresses.len() > LOOKUP_TABLE_EXTEND_BATCH {
        return Err(BundleError::Configuration(format!(
            "lookup table extension takes 1..={} addresses, got {}",
            LOOKUP_TABLE_EXTEND_BATCH,
            addresses.len()
        )));
    }

    Ok(ProgramInstruction::new(
        InstructionKind::ExtendLookupTable,
        extend_lookup_table(*table, *authority, Some(*payer), addresses.to_vec()),
    ))
}

/// Plain lamport transfer
pub fn build_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> ProgramInstruction {
    ProgramInstruction::new(
        InstructionKind::Transfer,
        system_instruction::transfer(from, to, lamports),
    )
}

/// Move `amount` raw units of `mint` between two owners' associated accounts
///
/// `transfer_checked`, so a wrong `decimals` fails on-chain instead of
/// moving a mis-scaled amount.
pub fn build_token_transfer(
    mint: &Pubkey,
    from_owner: &Pubkey,
    to_owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<ProgramInstruction, BundleError> {
    if amount == 0 {
        return Err(BundleError::Configuration(
            "token transfer amount must be non-zero".to_string(),
        ));
    }
    let instruction = spl_token::instruction::transfer_checked(
        &spl_token::id(),
        &pda::associated_token(from_owner, mint),
        mint,
        &pda::associated_token(to_owner, mint),
        from_owner,
        &[],
        amount,
        decimals,
    )
    .map_err(|e| BundleError::internal(format!("failed to build transfer_checked: {}", e)))?;

    Ok(ProgramInstruction::new(InstructionKind::TokenTransfer, instruction))
}

/// Wrap `lamports` of SOL into `owner`'s native-mint token account
///
/// Creates the account if needed, funds it, then syncs the token balance.
pub fn build_wrap_sol(owner: &Pubkey, lamports: u64) -> Result<Vec<ProgramInstruction>, BundleError> {
    let native_mint = spl_token::native_mint::id();
    let wrapped = pda::associated_token(owner, &native_mint);
    let sync = spl_token::instruction::sync_native(&spl_token::id(), &wrapped)
        .map_err(|e| BundleError::internal(format!("failed to build sync_native: {}", e)))?;

    Ok(vec![
        build_associated_account_idempotent(owner, &native_mint),
        build_transfer(owner, &wrapped, lamports),
        ProgramInstruction::new(InstructionKind::SyncNative, sync),
    ])
}

/// Compute unit limit and price, in that order
///
/// A zero value skips the corresponding instruction.
pub fn build_compute_budget(unit_limit: u32, unit_price: u64) -> Vec<ProgramInstruction> {
    let mut instructions = Vec::with_capacity(2);
    if unit_limit > 0 {
        instructions.push(ProgramInstruction::new(
            InstructionKind::ComputeBudget,
            ComputeBudgetInstruction::set_compute_unit_limit(unit_limit),
        ));
    }
    if unit_price > 0 {
        instructions.push(ProgramInstruction::new(
            InstructionKind::ComputeBudget,
            ComputeBudgetInstruction::set_compute_unit_price(unit_price),
        ));
    }
    instructions
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::{Keypair, Signer};

    fn pool_keys() -> AmmPoolKeys {
        AmmPoolKeys {
            program_id: super::super::constants::AMM_V4_PROGRAM_ID,
            id: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            open_orders: Pubkey::new_unique(),
            target_orders: Pubkey::new_unique(),
            config: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: spl_token::native_mint::id(),
            base_vault: Pubkey::new_unique(),
            quote_vault: Pubkey::new_unique(),
            withdraw_queue: Pubkey::new_unique(),
            lp_vault: Pubkey::new_unique(),
            market_program_id: super::super::constants::OPENBOOK_PROGRAM_ID,
            market_id: Pubkey::new_unique(),
            market_authority: Pubkey::new_unique(),
            market_base_vault: Pubkey::new_unique(),
            market_quote_vault: Pubkey::new_unique(),
            market_bids: Pubkey::new_unique(),
            market_asks: Pubkey::new_unique(),
            market_event_queue: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_create_token_layout() {
        let mint = Pubkey::new_unique();
        let creator = Pubkey::new_unique();
        let ix = build_create_token(&mint, &creator, "X", "XX", "https://u").unwrap();

        assert_eq!(ix.kind(), InstructionKind::CreateToken);
        assert_eq!(ix.program_id(), &PUMP_PROGRAM_ID);
        assert_eq!(ix.accounts().len(), 14);
        assert_eq!(&ix.data()[..8], &discriminators::CREATE);
        // name: u32 len + bytes
        assert_eq!(&ix.data()[8..13], &[1, 0, 0, 0, b'X']);

        let signers: Vec<_> = ix.signers().copied().collect();
        assert_eq!(signers, vec![mint, creator]);
        assert_eq!(ix.accounts()[2].pubkey, pda::bonding_curve(&mint));
    }

    #[test]
    fn test_create_token_rejects_empty_name() {
        let err = build_create_token(&Pubkey::new_unique(), &Pubkey::new_unique(), "", "X", "u");
        assert!(matches!(err, Err(BundleError::Configuration(_))));
    }

    #[test]
    fn test_buy_payload() {
        let mint = Pubkey::new_unique();
        let buyer = Pubkey::new_unique();
        let ix = build_buy(&mint, &buyer, 1_500, 42).unwrap();

        assert_eq!(ix.kind(), InstructionKind::Buy);
        assert_eq!(&ix.data()[..8], &discriminators::BUY);
        assert_eq!(&ix.data()[8..16], &42u64.to_le_bytes());
        assert_eq!(&ix.data()[16..24], &1_500u64.to_le_bytes());
        assert_eq!(ix.accounts()[5].pubkey, pda::associated_token(&buyer, &mint));
        assert_eq!(ix.signers().count(), 1);
    }

    #[test]
    fn test_sell_payload() {
        let mint = Pubkey::new_unique();
        let seller = Pubkey::new_unique();
        let ix = build_sell(&mint, &seller, 250, 0).unwrap();

        assert_eq!(ix.kind(), InstructionKind::Sell);
        assert_eq!(&ix.data()[..8], &discriminators::SELL);
        assert_eq!(&ix.data()[8..16], &250u64.to_le_bytes());
        assert_eq!(ix.data().len(), 24);
        assert_eq!(ix.signers().next(), Some(&seller));
    }

    #[test]
    fn test_amm_instruction_shapes() {
        let keys = pool_keys();
        let owner = Pubkey::new_unique();

        let create = build_create_pool(
            &keys,
            &owner,
            &CreatePoolParams {
                nonce: 254,
                open_time: 0,
                base_amount: 1_000,
                quote_amount: 2_000,
            },
        )
        .unwrap();
        assert_eq!(create.accounts().len(), 21);
        assert_eq!(create.data()[0], amm_tags::INITIALIZE2);
        assert_eq!(create.data()[1], 254);
        assert_eq!(&create.data()[10..18], &2_000u64.to_le_bytes());

        let swap = build_swap(
            &keys,
            &owner,
            &SwapParams {
                source: Pubkey::new_unique(),
                destination: Pubkey::new_unique(),
                amount_in: 10,
                min_amount_out: 1,
            },
        )
        .unwrap();
        assert_eq!(swap.accounts().len(), 18);
        assert_eq!(swap.data(), &[9, 10, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]);

        let remove = build_remove_liquidity(&keys, &owner, 77).unwrap();
        assert_eq!(remove.accounts().len(), 22);
        assert_eq!(remove.data()[0], amm_tags::WITHDRAW);
        assert!(build_remove_liquidity(&keys, &owner, 0).is_err());
    }

    #[test]
    fn test_parse_address() {
        let key = Pubkey::new_unique();
        assert_eq!(parse_address(&key.to_string()).unwrap(), key);

        assert!(matches!(
            parse_address("not_base58_0OIl"),
            Err(BundleError::InvalidAddress { .. })
        ));
        let short = bs58::encode([1u8; 31]).into_string();
        assert!(matches!(
            parse_address(&short),
            Err(BundleError::InvalidAddress { ref reason, .. }) if reason.contains("31")
        ));
    }

    #[test]
    fn test_parse_wallet_address_rejects_pda() {
        let pda = pda::bonding_curve(&Pubkey::new_unique());
        assert!(parse_wallet_address(&pda.to_string()).is_err());
        let wallet = Keypair::new();
        assert!(parse_wallet_address(&wallet.pubkey().to_string()).is_ok());
    }

    #[test]
    fn test_lookup_table_extension_batch_limit() {
        let authority = Pubkey::new_unique();
        let (create, table) = build_create_lookup_table(&authority, &authority, 100);
        assert_eq!(create.kind(), InstructionKind::CreateLookupTable);

        let addresses: Vec<_> = (0..31).map(|_| Pubkey::new_unique()).collect();
        assert!(build_extend_lookup_table(&table, &authority, &authority, &addresses).is_err());
        assert!(build_extend_lookup_table(&table, &authority, &authority, &addresses[..30]).is_ok());
        assert!(build_extend_lookup_table(&table, &authority, &authority, &[]).is_err());
    }

    #[test]
    fn test_wrap_sol_sequence() {
        let owner = Pubkey::new_unique();
        let wrap = build_wrap_sol(&owner, 5_000).unwrap();
        let kinds: Vec<_> = wrap.iter().map(|ix| ix.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                InstructionKind::CreateAssociatedAccount,
                InstructionKind::Transfer,
                InstructionKind::SyncNative
            ]
        );
        let wrapped = pda::associated_token(&owner, &spl_token::native_mint::id());
        assert_eq!(wrap[1].accounts()[1].pubkey, wrapped);
    }

    #[test]
    fn test_token_transfer_checked_layout() {
        let mint = Pubkey::new_unique();
        let from = Pubkey::new_unique();
        let to = Pubkey::new_unique();
        let ix = build_token_transfer(&mint, &from, &to, 1_500, 6).unwrap();

        assert_eq!(ix.kind(), InstructionKind::TokenTransfer);
        assert_eq!(ix.program_id(), &spl_token::id());
        assert_eq!(ix.accounts()[0].pubkey, pda::associated_token(&from, &mint));
        assert_eq!(ix.accounts()[2].pubkey, pda::associated_token(&to, &mint));
        assert_eq!(ix.signers().collect::<Vec<_>>(), vec![&from]);
        // tag 12, amount, decimals
        assert_eq!(ix.data()[0], 12);
        assert_eq!(u64::from_le_bytes(ix.data()[1..9].try_into().unwrap()), 1_500);
        assert_eq!(ix.data()[9], 6);

        assert!(build_token_transfer(&mint, &from, &to, 0, 6).is_err());
    }

    #[test]
    fn test_compute_budget_skips_zero() {
        assert_eq!(build_compute_budget(0, 0).len(), 0);
        assert_eq!(build_compute_budget(250_000, 0).len(), 1);
        let both = build_compute_budget(250_000, 250_000);
        assert_eq!(both.len(), 2);
        assert!(both.iter().all(|ix| ix.kind() == InstructionKind::ComputeBudget));
    }

    #[test]
    fn test_associated_account_is_idempotent_variant() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ix = build_associated_account_idempotent(&owner, &mint);
        assert_eq!(ix.program_id(), &spl_associated_token_account::id());
        // CreateIdempotent = 1
        assert_eq!(ix.data(), &[1]);
    }
}
