//! Bundle construction
//!
//! The builder is split into focused modules:
//! - **errors**: error taxonomy shared by the whole crate
//! - **constants**: program ids, protocol limits and default amounts
//! - **pda**: program-derived addresses
//! - **curve**: bonding-curve quoting
//! - **costs**: rent, fees and buy sizing against wallet balances
//! - **instructions**: tagged program instruction builders
//! - **tip**: tip account selection and placement
//! - **assembler**: V0 message compilation, size checks and signing
//! - **bundle**: multi-transaction bundle builds
//!
//! Nothing in here performs I/O. Balances, blockhashes and lookup tables
//! are fetched by the service layer and handed in.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bundler::tx_builder::{BundleBuilder, BundleError, Seller, TipConfig};
//! use bundler::wallet::Wallet;
//! use solana_sdk::{hash::Hash, pubkey::Pubkey};
//!
//! # fn example(wallets: &[Wallet], mint: Pubkey, blockhash: Hash) -> Result<(), BundleError> {
//! let tips = TipConfig::with_default_accounts(1_000_000)?;
//! let builder = BundleBuilder::new(&tips, blockhash);
//!
//! let sellers: Vec<_> = wallets
//!     .iter()
//!     .map(|wallet| Seller { wallet, token_balance: 1_000_000 })
//!     .collect();
//! let bundle = builder.build_sell_bundle(&sellers, &mint, 50, None)?;
//! let encoded = bundle.encode_transactions()?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub use errors::BundleError;

pub mod assembler;
pub mod bundle;
pub mod constants;
pub mod costs;
pub mod curve;
pub mod instructions;
pub mod pda;
pub mod tip;

pub use assembler::{assemble, sign, SignedTransaction, UnsignedTransaction};
pub use bundle::{
    sell_amount, weighted_split, Bundle, BundleBuilder, BuildStage, BuyPlan, Buyer, ComputeBudget,
    LiquidityParams, Seller, TaxTransfer, TipPlacement, TokenParams,
};
pub use curve::BondingCurveState;
pub use instructions::{
    parse_address, parse_wallet_address, AmmPoolKeys, CreatePoolParams, InstructionKind,
    ProgramInstruction, SwapParams,
};
pub use tip::{last_participant_index, TipConfig};

pub type Result<T> = std::result::Result<T, BundleError>;
