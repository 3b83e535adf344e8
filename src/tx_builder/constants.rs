//! Fixed program addresses and protocol limits
//!
//! These are process-wide constants wired into instructions by convention;
//! none of them are user input.

use solana_sdk::{pubkey, pubkey::Pubkey};

/// Bonding-curve launch program
pub const PUMP_PROGRAM_ID: Pubkey = pubkey!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");
/// Launch program global state account
pub const PUMP_GLOBAL: Pubkey = pubkey!("4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf");
/// Launch program fee recipient
pub const PUMP_FEE_RECIPIENT: Pubkey = pubkey!("CebN5WGQ4jvEPvsVU4EoHEpgzq1VV7AbicfhtW4xC9iM");
/// Launch program event authority
pub const PUMP_EVENT_AUTHORITY: Pubkey = pubkey!("Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1");
/// Launch program mint authority
pub const PUMP_MINT_AUTHORITY: Pubkey = pubkey!("TSLvdd1pWpHVjahSpsvCXUbgwsL3JAcvokwaKt1eokM");
/// Token metadata program
pub const METADATA_PROGRAM_ID: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// AMM v4 program
pub const AMM_V4_PROGRAM_ID: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wnSUt1Mp8");
/// AMM v4 pool creation fee destination
pub const AMM_V4_CREATE_FEE_DESTINATION: Pubkey =
    pubkey!("7YttLkHDoNj9wyDur5pM1ejNaAvT9X4eqaYcHQqtj2G5");
/// OpenBook market program used by AMM v4 pools
pub const OPENBOOK_PROGRAM_ID: Pubkey = pubkey!("srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX");

/// Well-known block-engine tip accounts
pub const DEFAULT_TIP_ACCOUNTS: [&str; 8] = [
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
];

/// Maximum serialized transaction size (bytes)
pub const MAX_TRANSACTION_SIZE: usize = 1232;
/// Maximum accounts a single transaction may lock
pub const MAX_ACCOUNT_LOCKS: usize = 64;
/// Maximum transactions the relay accepts per bundle
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

/// Decimals of tokens minted by the launch program
pub const PUMP_TOKEN_DECIMALS: u8 = 6;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
/// Lamports held back when a buyer spends its whole balance
pub const BUYER_RESERVE_LAMPORTS: u64 = 3_000_000;
/// Share of the balance above the reserve an auto-sized buyer spends
pub const AUTO_SPEND_PERCENT: u64 = 98;
/// Launch program fee on every buy (basis points of the SOL cost)
pub const PUMP_FEE_BPS: u64 = 100;
/// Base fee per transaction signature
pub const SIGNATURE_FEE_LAMPORTS: u64 = 5_000;

/// Rent: lamports per byte-year, two years to be exempt
pub const RENT_LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
pub const RENT_EXEMPTION_YEARS: u64 = 2;
/// Bytes the runtime charges for on top of an account's data
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

/// Account sizes created by a launch
pub mod account_sizes {
    pub const MINT: u64 = 82;
    pub const TOKEN_ACCOUNT: u64 = 165;
    pub const BONDING_CURVE: u64 = 150;
    pub const METADATA: u64 = 679;
    /// Lookup table header; each address adds 32 bytes
    pub const LOOKUP_TABLE_META: u64 = 56;
}

/// Default compute unit limit for the deployer transaction
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 250_000;
/// Default compute unit price (micro-lamports) for the deployer transaction
pub const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 250_000;

/// Transfers packed into one distribution transaction
pub const TRANSFERS_PER_TRANSACTION: usize = 5;
/// Account creations plus token transfers packed into one transaction
pub const TOKEN_TRANSFERS_PER_TRANSACTION: usize = 4;
/// Addresses added per lookup-table extension instruction
pub const LOOKUP_TABLE_EXTEND_BATCH: usize = 30;

/// Anchor discriminators of the launch program
pub mod discriminators {
    pub const CREATE: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
    pub const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
    pub const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
}

/// AMM v4 instruction tags
pub mod amm_tags {
    pub const INITIALIZE2: u8 = 1;
    pub const WITHDRAW: u8 = 4;
    pub const SWAP_BASE_IN: u8 = 9;
}
