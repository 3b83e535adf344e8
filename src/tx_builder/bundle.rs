//! Atomic bundle construction
//!
//! A [`BundleBuilder`] turns already-resolved inputs (decoded wallets,
//! balances, one shared blockhash) into an ordered list of signed
//! transactions the relay executes all-or-nothing.
//!
//! Every build walks the same stages, `Init -> InstructionsBuilt ->
//! Assembled -> Signed -> Ready`, and any failure discards the whole
//! bundle. Multi-wallet builds are two-pass: the first pass finds the last
//! participating wallet (it carries the tip), the second emits transactions.
//! For launches the first pass quotes every buy along the curve, so a buyer
//! left with zero tokens by earlier buys sits out and never carries the tip.
//!
//! No I/O happens here; balances and the blockhash are fetched by the caller
//! before building starts.

use std::fmt;

use solana_sdk::{
    hash::Hash, message::AddressLookupTableAccount, pubkey::Pubkey, system_program,
};
use tracing::{debug, warn};

use super::assembler::{assemble, sign, SignedTransaction};
use super::constants::{
    DEFAULT_COMPUTE_UNIT_LIMIT, DEFAULT_COMPUTE_UNIT_PRICE, LOOKUP_TABLE_EXTEND_BATCH,
    MAX_BUNDLE_TRANSACTIONS, TOKEN_TRANSFERS_PER_TRANSACTION, TRANSFERS_PER_TRANSACTION,
};
use super::costs::buy_outlay;
use super::curve::{max_sol_cost, BondingCurveState};
use super::errors::BundleError;
use super::instructions::{
    build_associated_account_for, build_associated_account_idempotent, build_buy,
    build_compute_budget, build_create_lookup_table, build_create_pool, build_create_token,
    build_extend_lookup_table, build_sell, build_swap, build_token_transfer, build_transfer,
    build_wrap_sol, AmmPoolKeys, CreatePoolParams, InstructionKind, ProgramInstruction,
    SwapParams,
};
use super::pda;
use super::tip::{last_participant_index, TipConfig};
use crate::compat;
use crate::wallet::Wallet;

/// Largest extension batch that still fits next to a tip transfer
const LOOKUP_TABLE_BATCH_WITH_TIP: usize = 26;

/// Construction stage of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStage {
    Init,
    InstructionsBuilt,
    Assembled,
    Signed,
    Ready,
}

impl BuildStage {
    /// The only stage reachable from this one
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::InstructionsBuilt),
            Self::InstructionsBuilt => Some(Self::Assembled),
            Self::Assembled => Some(Self::Signed),
            Self::Signed => Some(Self::Ready),
            Self::Ready => None,
        }
    }

    /// Move to `target`, refusing to skip or repeat a stage
    pub fn advance(&mut self, target: BuildStage) -> Result<(), BundleError> {
        if self.next() != Some(target) {
            return Err(BundleError::internal(format!(
                "invalid bundle stage transition {:?} -> {:?}",
                self, target
            )));
        }
        *self = target;
        Ok(())
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::InstructionsBuilt => "instructions_built",
            Self::Assembled => "assembled",
            Self::Signed => "signed",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Compute budget prepended to the deployer transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_limit: u32,
    pub unit_price: u64,
}

impl Default for ComputeBudget {
    fn default() -> Self {
        Self {
            unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
        }
    }
}

/// Optional fee transfer appended to the deployer transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxTransfer {
    pub recipient: Pubkey,
    pub lamports: u64,
}

/// Token launch parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    pub name: String,
    pub symbol: String,
    pub metadata_uri: String,
    /// Lamports the deployer spends on its own initial buy
    pub dev_buy_lamports: u64,
    /// Slippage allowed on every buy's SOL cost (basis points)
    pub slippage_bps: u16,
    /// Most the dev buy may debit, fee included; caps the slippage allowance
    pub dev_buy_max_cost: Option<u64>,
    pub tax: Option<TaxTransfer>,
}

/// A buyer and the lamports it spends
#[derive(Debug, Clone, Copy)]
pub struct Buyer<'w> {
    pub wallet: &'w Wallet,
    pub lamports: u64,
    /// Most the buy may debit, fee included; caps the slippage allowance
    pub max_cost: Option<u64>,
}

impl<'w> Buyer<'w> {
    pub fn new(wallet: &'w Wallet, lamports: u64) -> Self {
        Self {
            wallet,
            lamports,
            max_cost: None,
        }
    }
}

/// Tokens every buy of a launch receives, quoted in bundle order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyPlan {
    pub dev_tokens: u64,
    /// Zero for a buyer that sits out
    pub buyer_tokens: Vec<u64>,
    /// Index of the buyer carrying the tip; `None` tips from the deployer
    pub tip_buyer: Option<usize>,
}

impl BuyPlan {
    /// Quote the dev buy, then each buyer against the reserves the
    /// earlier buys leave behind
    ///
    /// A buyer whose spend buys zero tokens (the curve's real reserves are
    /// exhausted) does not move the reserves and does not participate.
    pub fn quote(dev_buy_lamports: u64, spends: &[u64]) -> Result<Self, BundleError> {
        let (dev_tokens, mut curve) = BondingCurveState::initial().quote_buy(dev_buy_lamports)?;

        let mut buyer_tokens = Vec::with_capacity(spends.len());
        for spend in spends {
            let (tokens, next) = curve.quote_buy(*spend)?;
            if tokens > 0 {
                curve = next;
            }
            buyer_tokens.push(tokens);
        }
        let tip_buyer = last_participant_index(&buyer_tokens);

        Ok(Self {
            dev_tokens,
            buyer_tokens,
            tip_buyer,
        })
    }

    pub fn participants(&self) -> usize {
        self.buyer_tokens.iter().filter(|t| **t > 0).count()
    }
}

/// Slippage-adjusted cost of a buy, capped at what its wallet can pay
fn capped_max_cost(
    buyer: &Pubkey,
    lamports: u64,
    slippage_bps: u16,
    cap: Option<u64>,
) -> Result<u64, BundleError> {
    let max_cost = max_sol_cost(lamports, slippage_bps)?;
    let Some(cap) = cap else {
        return Ok(max_cost);
    };
    let outlay = buy_outlay(lamports)?;
    if cap < outlay {
        return Err(BundleError::InsufficientBalance(format!(
            "{} can pay {} lamports for a buy costing {}",
            buyer, cap, outlay
        )));
    }
    Ok(max_cost.min(cap))
}

/// A seller and its current raw token balance
#[derive(Debug, Clone, Copy)]
pub struct Seller<'w> {
    pub wallet: &'w Wallet,
    pub token_balance: u64,
}

/// Pool creation plus the buyer's first swap
#[derive(Debug, Clone)]
pub struct LiquidityParams {
    pub keys: AmmPoolKeys,
    pub pool: CreatePoolParams,
    /// Lamports the buyer swaps into the base token
    pub buy_lamports: u64,
    pub min_amount_out: u64,
}

/// Where the single tip of a bundle sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipPlacement {
    /// Index of the carrying transaction
    pub transaction_index: usize,
    /// Account funding the tip
    pub funded_by: Pubkey,
}

/// An ordered, signed set of transactions ready for the relay
#[derive(Debug, Clone)]
pub struct Bundle {
    stage: BuildStage,
    transactions: Vec<SignedTransaction>,
    tip: Option<TipPlacement>,
    warnings: Vec<String>,
    lookup_table: Option<Pubkey>,
}

impl Bundle {
    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn tip(&self) -> Option<&TipPlacement> {
        self.tip.as_ref()
    }

    /// Caller-visible warnings raised while building
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Address of the lookup table this bundle creates, if any
    pub fn lookup_table(&self) -> Option<&Pubkey> {
        self.lookup_table.as_ref()
    }

    /// Blockhash shared by every transaction
    pub fn recent_blockhash(&self) -> Option<&Hash> {
        self.transactions.first().map(|tx| tx.recent_blockhash())
    }

    /// Base-58 encoded wire transactions, in bundle order
    pub fn encode_transactions(&self) -> Result<Vec<String>, BundleError> {
        self.transactions
            .iter()
            .map(SignedTransaction::encode_base58)
            .collect()
    }

    /// Re-check the bundle invariants
    ///
    /// Non-empty, within the relay cap, one shared blockhash, at most one
    /// tip, paid to a configured tip account by a signer of its own
    /// transaction.
    pub fn validate(&self, tip_config: &TipConfig) -> Result<(), BundleError> {
        let first = self
            .transactions
            .first()
            .ok_or_else(|| BundleError::internal("bundle has no transactions"))?;
        if self.transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            return Err(BundleError::BundleTooLarge {
                len: self.transactions.len(),
                max: MAX_BUNDLE_TRANSACTIONS,
            });
        }

        // Compare what was actually compiled into each message
        let blockhash = compat::get_recent_blockhash(&first.transaction().message);
        if let Some(idx) = self
            .transactions
            .iter()
            .position(|tx| compat::get_recent_blockhash(&tx.transaction().message) != blockhash)
        {
            return Err(BundleError::internal(format!(
                "transaction {} uses a different blockhash",
                idx
            )));
        }

        let mut found = None;
        for (idx, tx) in self.transactions.iter().enumerate() {
            let instructions = tx.instructions();
            for (position, ix) in instructions
                .iter()
                .enumerate()
                .filter(|(_, ix)| ix.kind() == InstructionKind::Tip)
            {
                if found.is_some() {
                    return Err(BundleError::internal("bundle carries more than one tip"));
                }
                if position + 1 != instructions.len() {
                    return Err(BundleError::internal(format!(
                        "tip in transaction {} is not its last instruction",
                        idx
                    )));
                }
                let funder = ix.accounts()[0].pubkey;
                let receiver = ix.accounts()[1].pubkey;
                if ix.program_id() != &system_program::id() || !tip_config.is_tip_account(&receiver)
                {
                    return Err(BundleError::internal(format!(
                        "tip in transaction {} is not a transfer to a tip account",
                        idx
                    )));
                }
                if !tx.signers().contains(&funder) {
                    return Err(BundleError::internal(format!(
                        "tip funder {} does not sign transaction {}",
                        funder, idx
                    )));
                }
                found = Some(TipPlacement {
                    transaction_index: idx,
                    funded_by: funder,
                });
            }
        }

        if found != self.tip {
            return Err(BundleError::internal("recorded tip placement does not match"));
        }
        Ok(())
    }
}

/// One transaction before assembly
struct TxPlan<'w> {
    payer: Pubkey,
    instructions: Vec<ProgramInstruction>,
    signers: Vec<&'w Wallet>,
}

impl<'w> TxPlan<'w> {
    fn new(payer: &'w Wallet) -> Self {
        Self {
            payer: payer.pubkey(),
            instructions: Vec::new(),
            signers: vec![payer],
        }
    }

    fn with_signer(mut self, signer: &'w Wallet) -> Self {
        if !self.signers.iter().any(|s| s.pubkey() == signer.pubkey()) {
            self.signers.push(signer);
        }
        self
    }

    fn push(&mut self, ix: ProgramInstruction) {
        self.instructions.push(ix);
    }

    fn extend(&mut self, ixs: impl IntoIterator<Item = ProgramInstruction>) {
        self.instructions.extend(ixs);
    }
}

/// Builds bundles against one shared blockhash
#[derive(Debug, Clone)]
pub struct BundleBuilder<'a> {
    tip: &'a TipConfig,
    recent_blockhash: Hash,
    compute: ComputeBudget,
    max_transactions: usize,
    lookup_tables: Vec<AddressLookupTableAccount>,
}

impl<'a> BundleBuilder<'a> {
    /// `recent_blockhash` is fetched once per bundle and used by every
    /// transaction in it.
    pub fn new(tip: &'a TipConfig, recent_blockhash: Hash) -> Self {
        Self {
            tip,
            recent_blockhash,
            compute: ComputeBudget::default(),
            max_transactions: MAX_BUNDLE_TRANSACTIONS,
            lookup_tables: Vec::new(),
        }
    }

    pub fn with_compute_budget(mut self, compute: ComputeBudget) -> Self {
        self.compute = compute;
        self
    }

    /// Relay cap on transactions per bundle, clamped to `1..=5`
    pub fn with_max_transactions(mut self, max: usize) -> Self {
        self.max_transactions = max.clamp(1, MAX_BUNDLE_TRANSACTIONS);
        self
    }

    pub fn with_lookup_tables(mut self, tables: Vec<AddressLookupTableAccount>) -> Self {
        self.lookup_tables = tables;
        self
    }

    pub fn recent_blockhash(&self) -> &Hash {
        &self.recent_blockhash
    }

    /// Launch a token and buy it from several wallets in one bundle
    ///
    /// Transaction 0 is the deployer's (compute budget, create, ATA, dev
    /// buy, optional tax), signed by the deployer and the fresh mint. Each
    /// buyer whose spend still buys tokens gets one transaction (ATA, buy)
    /// signed by itself alone. The tip goes on the last such buyer's
    /// transaction, or on the deployer's when no buyer participates. Every
    /// buy's `max_sol_cost` is capped at its wallet's `max_cost`.
    pub fn build_create_and_buy_bundle(
        &self,
        deployer: &Wallet,
        mint: &Wallet,
        buyers: &[Buyer<'_>],
        token: &TokenParams,
    ) -> Result<Bundle, BundleError> {
        let mut stage = BuildStage::Init;
        let mint_key = mint.pubkey();
        let deployer_key = deployer.pubkey();

        // Pass 1: quote every buy along the curve; the tip follows the quotes
        let spends: Vec<u64> = buyers.iter().map(|b| b.lamports).collect();
        let plan = BuyPlan::quote(token.dev_buy_lamports, &spends)?;
        let participants = plan.participants();
        self.check_len(1 + participants)?;

        // Pass 2: emit transactions
        let mut plans = Vec::with_capacity(1 + participants);
        let mut warnings = Vec::new();

        let mut dev = TxPlan::new(deployer).with_signer(mint);
        dev.extend(build_compute_budget(
            self.compute.unit_limit,
            self.compute.unit_price,
        ));
        dev.push(build_create_token(
            &mint_key,
            &deployer_key,
            &token.name,
            &token.symbol,
            &token.metadata_uri,
        )?);
        dev.push(build_associated_account_idempotent(&deployer_key, &mint_key));
        if plan.dev_tokens > 0 {
            let max_cost = capped_max_cost(
                &deployer_key,
                token.dev_buy_lamports,
                token.slippage_bps,
                token.dev_buy_max_cost,
            )?;
            dev.push(build_buy(&mint_key, &deployer_key, max_cost, plan.dev_tokens)?);
        }
        if let Some(tax) = &token.tax {
            dev.push(build_transfer(&deployer_key, &tax.recipient, tax.lamports));
        }
        if plan.tip_buyer.is_none() {
            dev.push(self.tip.build_configured_tip(&deployer_key));
        }
        plans.push(dev);

        for (idx, (buyer, tokens)) in buyers.iter().zip(&plan.buyer_tokens).enumerate() {
            let buyer_key = buyer.wallet.pubkey();
            if buyer.lamports == 0 {
                debug!(buyer = %buyer_key, "Skipping buyer with zero spend");
                continue;
            }
            if *tokens == 0 {
                warn!(
                    buyer = %buyer_key,
                    lamports = buyer.lamports,
                    "Bonding curve exhausted before this buyer; skipping"
                );
                warnings.push(format!(
                    "buyer {} skipped: {} lamports buy no tokens after earlier buys",
                    buyer_key, buyer.lamports
                ));
                continue;
            }
            let max_cost =
                capped_max_cost(&buyer_key, buyer.lamports, token.slippage_bps, buyer.max_cost)?;

            let mut tx = TxPlan::new(buyer.wallet);
            tx.push(build_associated_account_idempotent(&buyer_key, &mint_key));
            tx.push(build_buy(&mint_key, &buyer_key, max_cost, *tokens)?);
            if plan.tip_buyer == Some(idx) {
                tx.push(self.tip.build_configured_tip(&buyer_key));
            }
            plans.push(tx);
        }

        stage.advance(BuildStage::InstructionsBuilt)?;
        self.finish(stage, plans, warnings)
    }

    /// Sell `sell_percentage` of every wallet's balance in one bundle
    ///
    /// Wallets whose computed amount is zero produce no transaction. The
    /// last wallet that does sell carries the tip, funded by `fee_payer`
    /// when given (which then pays every transaction), else by that seller.
    /// Fails with `InsufficientBalance` when no wallet has anything to sell.
    pub fn build_sell_bundle(
        &self,
        sellers: &[Seller<'_>],
        mint: &Pubkey,
        sell_percentage: u8,
        fee_payer: Option<&Wallet>,
    ) -> Result<Bundle, BundleError> {
        if sell_percentage == 0 || sell_percentage > 100 {
            return Err(BundleError::Configuration(format!(
                "sell percentage must be within 1..=100, got {}",
                sell_percentage
            )));
        }
        let mut stage = BuildStage::Init;

        // Pass 1: amounts and the tip carrier
        let amounts = sellers
            .iter()
            .map(|s| sell_amount(s.token_balance, sell_percentage))
            .collect::<Result<Vec<_>, _>>()?;
        let tip_index = match last_participant_index(&amounts) {
            Some(idx) => idx,
            None => {
                warn!(
                    mint = %mint,
                    wallets = sellers.len(),
                    "No wallet holds tokens to sell; nothing to submit"
                );
                return Err(BundleError::InsufficientBalance(format!(
                    "none of {} wallets holds {} tokens",
                    sellers.len(),
                    mint
                )));
            }
        };
        let participants = amounts.iter().filter(|a| **a > 0).count();
        self.check_len(participants)?;

        // Pass 2: one transaction per participating wallet
        let mut plans = Vec::with_capacity(participants);
        let mut warnings = Vec::new();
        for (idx, (seller, amount)) in sellers.iter().zip(&amounts).enumerate() {
            let seller_key = seller.wallet.pubkey();
            if *amount == 0 {
                debug!(seller = %seller_key, "Skipping wallet with nothing to sell");
                if seller.token_balance > 0 {
                    warnings.push(format!(
                        "wallet {} balance {} rounds to zero at {}%",
                        seller_key, seller.token_balance, sell_percentage
                    ));
                }
                continue;
            }

            let mut plan = match fee_payer {
                Some(payer) => TxPlan::new(payer).with_signer(seller.wallet),
                None => TxPlan::new(seller.wallet),
            };
            plan.push(build_sell(mint, &seller_key, *amount, 0)?);
            if idx == tip_index {
                let funder = plan.payer;
                plan.push(self.tip.build_configured_tip(&funder));
            }
            plans.push(plan);
        }

        stage.advance(BuildStage::InstructionsBuilt)?;
        self.finish(stage, plans, warnings)
    }

    /// Create an AMM pool and make the first swap into it
    ///
    /// The deployer's transaction creates and seeds the pool; the buyer's
    /// wraps SOL, opens its base-token account, swaps, and pays the tip.
    pub fn build_liquidity_bundle(
        &self,
        deployer: &Wallet,
        buyer: &Wallet,
        params: &LiquidityParams,
    ) -> Result<Bundle, BundleError> {
        let native_mint = spl_token::native_mint::id();
        if params.keys.quote_mint != native_mint {
            return Err(BundleError::Configuration(
                "liquidity bundles require a SOL-quoted pool".to_string(),
            ));
        }
        if params.buy_lamports == 0 {
            return Err(BundleError::Configuration(
                "liquidity bundle buy amount must be non-zero".to_string(),
            ));
        }
        self.check_len(2)?;
        let mut stage = BuildStage::Init;
        let deployer_key = deployer.pubkey();
        let buyer_key = buyer.pubkey();

        let mut pool = TxPlan::new(deployer);
        pool.extend(build_compute_budget(
            self.compute.unit_limit,
            self.compute.unit_price,
        ));
        pool.push(build_create_pool(&params.keys, &deployer_key, &params.pool)?);

        let mut swap = TxPlan::new(buyer);
        swap.extend(build_wrap_sol(&buyer_key, params.buy_lamports)?);
        swap.push(build_associated_account_idempotent(
            &buyer_key,
            &params.keys.base_mint,
        ));
        swap.push(build_swap(
            &params.keys,
            &buyer_key,
            &SwapParams {
                source: pda::associated_token(&buyer_key, &native_mint),
                destination: pda::associated_token(&buyer_key, &params.keys.base_mint),
                amount_in: params.buy_lamports,
                min_amount_out: params.min_amount_out,
            },
        )?);
        swap.push(self.tip.build_configured_tip(&buyer_key));

        stage.advance(BuildStage::InstructionsBuilt)?;
        self.finish(stage, vec![pool, swap], Vec::new())
    }

    /// Spread SOL from `sender` to many recipients
    ///
    /// Transfers are packed five per transaction, each paid by `fee_payer`
    /// and signed by both; the last transaction carries the tip.
    pub fn build_distribute_sol_bundle(
        &self,
        fee_payer: &Wallet,
        sender: &Wallet,
        recipients: &[(Pubkey, u64)],
    ) -> Result<Bundle, BundleError> {
        let transfers: Vec<_> = recipients.iter().filter(|(_, lamports)| *lamports > 0).collect();
        if transfers.is_empty() {
            return Err(BundleError::Configuration(
                "no recipient has a non-zero amount".to_string(),
            ));
        }
        let total = transfers
            .iter()
            .try_fold(0u64, |acc, (_, lamports)| acc.checked_add(*lamports))
            .ok_or(BundleError::ArithmeticOverflow("distribution total"))?;
        let chunks: Vec<_> = transfers.chunks(TRANSFERS_PER_TRANSACTION).collect();
        self.check_len(chunks.len())?;

        let mut stage = BuildStage::Init;
        let sender_key = sender.pubkey();
        let last = chunks.len() - 1;
        let mut plans = Vec::with_capacity(chunks.len());
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let mut plan = TxPlan::new(fee_payer).with_signer(sender);
            plan.extend(
                chunk
                    .iter()
                    .map(|(to, lamports)| build_transfer(&sender_key, to, *lamports)),
            );
            if idx == last {
                plan.push(self.tip.build_configured_tip(&fee_payer.pubkey()));
            }
            plans.push(plan);
        }

        debug!(
            recipients = transfers.len(),
            total_lamports = total,
            "Distribution planned"
        );
        stage.advance(BuildStage::InstructionsBuilt)?;
        self.finish(stage, plans, Vec::new())
    }

    /// Spread `mint` tokens from `funder` to many wallets
    ///
    /// Per recipient: an idempotent associated-account creation paid by the
    /// funder, then a checked transfer. Four recipients per transaction,
    /// all paid and signed by the funder. The optional tax rides in the
    /// first transaction; the last carries the tip.
    pub fn build_distribute_tokens_bundle(
        &self,
        funder: &Wallet,
        mint: &Pubkey,
        decimals: u8,
        recipients: &[(Pubkey, u64)],
        tax: Option<&TaxTransfer>,
    ) -> Result<Bundle, BundleError> {
        let transfers: Vec<_> = recipients.iter().filter(|(_, amount)| *amount > 0).collect();
        if transfers.is_empty() {
            return Err(BundleError::Configuration(
                "no recipient has a non-zero token amount".to_string(),
            ));
        }
        let chunks: Vec<_> = transfers.chunks(TOKEN_TRANSFERS_PER_TRANSACTION).collect();
        self.check_len(chunks.len())?;

        let mut stage = BuildStage::Init;
        let funder_key = funder.pubkey();
        let last = chunks.len() - 1;
        let mut plans = Vec::with_capacity(chunks.len());
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let mut plan = TxPlan::new(funder);
            for (owner, amount) in chunk {
                plan.push(build_associated_account_for(&funder_key, owner, mint));
                plan.push(build_token_transfer(mint, &funder_key, owner, *amount, decimals)?);
            }
            if idx == 0 {
                if let Some(tax) = tax {
                    plan.push(build_transfer(&funder_key, &tax.recipient, tax.lamports));
                }
            }
            if idx == last {
                plan.push(self.tip.build_configured_tip(&funder_key));
            }
            plans.push(plan);
        }

        debug!(mint = %mint, recipients = transfers.len(), "Token distribution planned");
        stage.advance(BuildStage::InstructionsBuilt)?;
        self.finish(stage, plans, Vec::new())
    }

    /// Create a lookup table and fill it with `addresses`
    ///
    /// The table is created in the first transaction and extended in
    /// batches of up to 30 addresses, one batch per transaction. The last
    /// batch is halved when it would not fit next to the tip.
    pub fn build_lookup_table_bundle(
        &self,
        authority: &Wallet,
        recent_slot: u64,
        addresses: &[Pubkey],
    ) -> Result<(Bundle, Pubkey), BundleError> {
        let authority_key = authority.pubkey();
        let mut batches: Vec<&[Pubkey]> = addresses.chunks(LOOKUP_TABLE_EXTEND_BATCH).collect();
        if let Some(last) = batches.pop() {
            if last.len() > LOOKUP_TABLE_BATCH_WITH_TIP {
                let (head, tail) = last.split_at(last.len() / 2);
                batches.push(head);
                batches.push(tail);
            } else {
                batches.push(last);
            }
        }
        self.check_len(1 + batches.len())?;

        let mut stage = BuildStage::Init;
        let (create, table) = build_create_lookup_table(&authority_key, &authority_key, recent_slot);
        let mut plans = vec![TxPlan::new(authority)];
        plans[0].push(create);

        for batch in batches {
            let mut plan = TxPlan::new(authority);
            plan.push(build_extend_lookup_table(
                &table,
                &authority_key,
                &authority_key,
                batch,
            )?);
            plans.push(plan);
        }
        if let Some(last) = plans.last_mut() {
            last.push(self.tip.build_configured_tip(&authority_key));
        }

        stage.advance(BuildStage::InstructionsBuilt)?;
        let mut bundle = self.finish(stage, plans, Vec::new())?;
        bundle.lookup_table = Some(table);
        Ok((bundle, table))
    }

    fn check_len(&self, len: usize) -> Result<(), BundleError> {
        if len > self.max_transactions {
            return Err(BundleError::BundleTooLarge {
                len,
                max: self.max_transactions,
            });
        }
        Ok(())
    }

    /// Assemble, sign and validate planned transactions
    fn finish(
        &self,
        mut stage: BuildStage,
        plans: Vec<TxPlan<'_>>,
        warnings: Vec<String>,
    ) -> Result<Bundle, BundleError> {
        let mut assembled = Vec::with_capacity(plans.len());
        for plan in plans {
            let unsigned = assemble(
                &plan.payer,
                plan.instructions,
                self.recent_blockhash,
                &self.lookup_tables,
            )?;
            assembled.push((unsigned, plan.signers));
        }
        stage.advance(BuildStage::Assembled)?;

        let transactions = assembled
            .into_iter()
            .map(|(unsigned, signers)| sign(unsigned, &signers))
            .collect::<Result<Vec<_>, _>>()?;
        stage.advance(BuildStage::Signed)?;

        let tip = transactions.iter().enumerate().find_map(|(idx, tx)| {
            tx.instructions()
                .iter()
                .find(|ix| ix.kind() == InstructionKind::Tip)
                .map(|ix| TipPlacement {
                    transaction_index: idx,
                    funded_by: ix.accounts()[0].pubkey,
                })
        });

        let mut bundle = Bundle {
            stage,
            transactions,
            tip,
            warnings,
            lookup_table: None,
        };
        bundle.validate(self.tip)?;
        stage.advance(BuildStage::Ready)?;
        bundle.stage = stage;

        debug!(
            transactions = bundle.len(),
            tip_index = ?bundle.tip.map(|t| t.transaction_index),
            blockhash = %self.recent_blockhash,
            "Bundle ready"
        );
        Ok(bundle)
    }
}

/// `floor(balance * percentage / 100)`
pub fn sell_amount(balance: u64, percentage: u8) -> Result<u64, BundleError> {
    let amount = u128::from(balance)
        .checked_mul(u128::from(percentage))
        .map(|v| v / 100)
        .ok_or(BundleError::ArithmeticOverflow("sell amount"))?;
    u64::try_from(amount).map_err(|_| BundleError::ArithmeticOverflow("sell amount"))
}

/// Split `total` in proportion to `weights`; the last share takes the
/// rounding remainder so the shares always sum to `total`
pub fn weighted_split(total: u64, weights: &[u64]) -> Result<Vec<u64>, BundleError> {
    let Some((_, head)) = weights.split_last() else {
        return Ok(Vec::new());
    };
    let weight_sum: u128 = weights.iter().map(|w| u128::from(*w)).sum();
    if weight_sum == 0 {
        return Err(BundleError::Configuration(
            "split weights must not all be zero".to_string(),
        ));
    }

    let mut shares = Vec::with_capacity(weights.len());
    let mut assigned = 0u64;
    for weight in head {
        let share = u64::try_from(u128::from(total) * u128::from(*weight) / weight_sum)
            .map_err(|_| BundleError::ArithmeticOverflow("split share"))?;
        assigned += share;
        shares.push(share);
    }
    shares.push(total - assigned);
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::constants::PUMP_PROGRAM_ID;

    fn tip_config() -> TipConfig {
        TipConfig::with_default_accounts(10_000_000).unwrap()
    }

    fn token_params() -> TokenParams {
        TokenParams {
            name: "X".to_string(),
            symbol: "X".to_string(),
            metadata_uri: "https://ipfs.io/ipfs/Qm".to_string(),
            dev_buy_lamports: 100_000_000,
            slippage_bps: 500,
            dev_buy_max_cost: None,
            tax: None,
        }
    }

    fn kinds(tx: &SignedTransaction) -> Vec<InstructionKind> {
        tx.instructions()
            .iter()
            .map(|ix| ix.kind())
            .filter(|k| *k != InstructionKind::ComputeBudget)
            .collect()
    }

    #[test]
    fn test_stage_transitions() {
        let mut stage = BuildStage::Init;
        assert!(stage.advance(BuildStage::Assembled).is_err());
        stage.advance(BuildStage::InstructionsBuilt).unwrap();
        stage.advance(BuildStage::Assembled).unwrap();
        assert!(stage.advance(BuildStage::Assembled).is_err());
        stage.advance(BuildStage::Signed).unwrap();
        stage.advance(BuildStage::Ready).unwrap();
        assert_eq!(stage.next(), None);
    }

    #[test]
    fn test_sell_amount_floors() {
        assert_eq!(sell_amount(500, 50).unwrap(), 250);
        assert_eq!(sell_amount(301, 50).unwrap(), 150);
        assert_eq!(sell_amount(1, 50).unwrap(), 0);
        assert_eq!(sell_amount(u64::MAX, 100).unwrap(), u64::MAX);
    }

    #[test]
    fn test_create_and_buy_without_buyers_tips_deployer() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();

        let bundle = builder
            .build_create_and_buy_bundle(&deployer, &mint, &[], &token_params())
            .unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(
            bundle.tip(),
            Some(&TipPlacement {
                transaction_index: 0,
                funded_by: deployer.pubkey()
            })
        );
        assert_eq!(bundle.stage(), BuildStage::Ready);
        let signers = bundle.transactions()[0].signers();
        assert!(signers.contains(&mint.pubkey()));
        assert!(signers.contains(&deployer.pubkey()));
    }

    #[test]
    fn test_create_and_buy_skips_zero_spend_buyers() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();
        let a = Wallet::generate();
        let b = Wallet::generate();
        let buyers = [Buyer::new(&a, 200_000_000), Buyer::new(&b, 0)];

        let bundle = builder
            .build_create_and_buy_bundle(&deployer, &mint, &buyers, &token_params())
            .unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.tip().unwrap().transaction_index, 1);
        assert_eq!(bundle.tip().unwrap().funded_by, a.pubkey());
        assert_eq!(
            kinds(&bundle.transactions()[1]),
            vec![
                InstructionKind::CreateAssociatedAccount,
                InstructionKind::Buy,
                InstructionKind::Tip
            ]
        );
    }

    #[test]
    fn test_create_and_buy_with_tax() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();
        let mut params = token_params();
        params.tax = Some(TaxTransfer {
            recipient: Pubkey::new_unique(),
            lamports: 250_000_000,
        });
        let buyer = Wallet::generate();

        let bundle = builder
            .build_create_and_buy_bundle(
                &deployer,
                &mint,
                &[Buyer::new(&buyer, 1)],
                &params,
            )
            .unwrap();
        assert_eq!(
            kinds(&bundle.transactions()[0]),
            vec![
                InstructionKind::CreateToken,
                InstructionKind::CreateAssociatedAccount,
                InstructionKind::Buy,
                InstructionKind::Transfer
            ]
        );
    }

    #[test]
    fn test_create_and_buy_over_cap() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();
        let wallets: Vec<_> = (0..5).map(|_| Wallet::generate()).collect();
        let buyers: Vec<_> = wallets
            .iter()
            .map(|w| Buyer::new(w, 10_000_000))
            .collect();

        let err = builder
            .build_create_and_buy_bundle(&deployer, &mint, &buyers, &token_params())
            .unwrap_err();
        assert_eq!(err, BundleError::BundleTooLarge { len: 6, max: 5 });
    }

    #[test]
    fn test_sell_with_shared_fee_payer() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let payer = Wallet::generate();
        let a = Wallet::generate();
        let b = Wallet::generate();
        let mint = Pubkey::new_unique();
        let sellers = [
            Seller {
                wallet: &a,
                token_balance: 1_000,
            },
            Seller {
                wallet: &b,
                token_balance: 2_000,
            },
        ];

        let bundle = builder.build_sell_bundle(&sellers, &mint, 100, Some(&payer)).unwrap();
        assert_eq!(bundle.len(), 2);
        for tx in bundle.transactions() {
            assert_eq!(tx.payer(), &payer.pubkey());
        }
        assert_eq!(bundle.tip().unwrap().funded_by, payer.pubkey());
        assert_eq!(bundle.tip().unwrap().transaction_index, 1);
    }

    #[test]
    fn test_sell_no_balances() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let a = Wallet::generate();
        let sellers = [Seller {
            wallet: &a,
            token_balance: 0,
        }];
        let err = builder
            .build_sell_bundle(&sellers, &Pubkey::new_unique(), 50, None)
            .unwrap_err();
        assert!(matches!(err, BundleError::InsufficientBalance(_)));
    }

    #[test]
    fn test_sell_rejects_bad_percentage() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        assert!(builder.build_sell_bundle(&[], &Pubkey::new_unique(), 0, None).is_err());
        assert!(builder.build_sell_bundle(&[], &Pubkey::new_unique(), 101, None).is_err());
    }

    #[test]
    fn test_sell_rounding_to_zero_warns() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let a = Wallet::generate();
        let b = Wallet::generate();
        let sellers = [
            Seller {
                wallet: &a,
                token_balance: 1,
            },
            Seller {
                wallet: &b,
                token_balance: 10,
            },
        ];
        let bundle = builder
            .build_sell_bundle(&sellers, &Pubkey::new_unique(), 50, None)
            .unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.warnings().len(), 1);
    }

    #[test]
    fn test_distribute_chunks_transfers() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let payer = Wallet::generate();
        let sender = Wallet::generate();
        let recipients: Vec<_> = (0..12).map(|_| (Pubkey::new_unique(), 1_000)).collect();

        let bundle = builder
            .build_distribute_sol_bundle(&payer, &sender, &recipients)
            .unwrap();
        assert_eq!(bundle.len(), 3);
        let transfers: Vec<_> = bundle
            .transactions()
            .iter()
            .map(|tx| {
                tx.instructions()
                    .iter()
                    .filter(|ix| ix.kind() == InstructionKind::Transfer)
                    .count()
            })
            .collect();
        assert_eq!(transfers, vec![5, 5, 2]);
        assert_eq!(bundle.tip().unwrap().transaction_index, 2);
        assert!(bundle.transactions()[0].signers().contains(&sender.pubkey()));
    }

    #[test]
    fn test_distribute_over_cap() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique()).with_max_transactions(2);
        let payer = Wallet::generate();
        let recipients: Vec<_> = (0..11).map(|_| (Pubkey::new_unique(), 1)).collect();
        assert_eq!(
            builder
                .build_distribute_sol_bundle(&payer, &payer, &recipients)
                .unwrap_err(),
            BundleError::BundleTooLarge { len: 3, max: 2 }
        );
    }

    #[test]
    fn test_lookup_table_bundle_splits_last_batch() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let authority = Wallet::generate();
        let addresses: Vec<_> = (0..60).map(|_| Pubkey::new_unique()).collect();

        let (bundle, table) = builder.build_lookup_table_bundle(&authority, 1_000, &addresses).unwrap();
        // create, 30, 15 + 15 (tip)
        assert_eq!(bundle.len(), 4);
        assert_ne!(table, Pubkey::default());
        assert_eq!(bundle.lookup_table(), Some(&table));
        assert_eq!(bundle.tip().unwrap().transaction_index, 3);
        for tx in bundle.transactions() {
            assert!(bincode::serialize(tx.transaction()).unwrap().len() <= 1232);
        }
    }

    #[test]
    fn test_validate_rejects_foreign_tip_config() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();
        let bundle = builder
            .build_create_and_buy_bundle(&deployer, &mint, &[], &token_params())
            .unwrap();

        let other = TipConfig::new(1, vec![Pubkey::new_unique()]).unwrap();
        assert!(bundle.validate(&other).is_err());
        assert!(bundle.validate(&tips).is_ok());
    }

    #[test]
    fn test_buy_amounts_follow_curve() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();
        let a = Wallet::generate();
        let b = Wallet::generate();
        let mut params = token_params();
        params.dev_buy_lamports = 0;
        let buyers = [Buyer::new(&a, 1_000_000_000), Buyer::new(&b, 1_000_000_000)];
        let bundle = builder
            .build_create_and_buy_bundle(&deployer, &mint, &buyers, &params)
            .unwrap();

        let token_amount = |tx: &SignedTransaction| {
            let buy = tx
                .instructions()
                .iter()
                .find(|ix| ix.kind() == InstructionKind::Buy)
                .unwrap();
            assert_eq!(buy.program_id(), &PUMP_PROGRAM_ID);
            u64::from_le_bytes(buy.data()[8..16].try_into().unwrap())
        };
        let first = token_amount(&bundle.transactions()[1]);
        let second = token_amount(&bundle.transactions()[2]);
        assert!(first > second);
        let (expected, _) = BondingCurveState::initial().quote_buy(1_000_000_000).unwrap();
        assert_eq!(first, expected);
    }

    fn buy_args(tx: &SignedTransaction) -> (u64, u64) {
        let buy = tx
            .instructions()
            .iter()
            .find(|ix| ix.kind() == InstructionKind::Buy)
            .unwrap();
        let data = buy.data();
        (
            u64::from_le_bytes(data[8..16].try_into().unwrap()),
            u64::from_le_bytes(data[16..24].try_into().unwrap()),
        )
    }

    #[test]
    fn test_create_and_buy_skips_buyer_after_curve_exhausted() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();
        let whale = Wallet::generate();
        let late = Wallet::generate();
        let mut params = token_params();
        params.dev_buy_lamports = 0;
        let buyers = [
            Buyer::new(&whale, 200 * 1_000_000_000),
            Buyer::new(&late, 1_000_000_000),
        ];

        let plan = BuyPlan::quote(0, &[buyers[0].lamports, buyers[1].lamports]).unwrap();
        assert_eq!(plan.buyer_tokens[1], 0);
        assert_eq!(plan.tip_buyer, Some(0));

        let bundle = builder
            .build_create_and_buy_bundle(&deployer, &mint, &buyers, &params)
            .unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(
            bundle.tip(),
            Some(&TipPlacement {
                transaction_index: 1,
                funded_by: whale.pubkey()
            })
        );
        let (tokens, _) = buy_args(&bundle.transactions()[1]);
        assert_eq!(tokens, crate::tx_builder::curve::INITIAL_REAL_TOKEN_RESERVES);
        assert_eq!(bundle.warnings().len(), 1);
        assert!(bundle.warnings()[0].contains(&late.pubkey().to_string()));
        for tx in bundle.transactions() {
            assert!(!tx.signers().contains(&late.pubkey()));
        }
    }

    #[test]
    fn test_buy_max_cost_capped_by_wallet() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let deployer = Wallet::generate();
        let mint = Wallet::generate();
        let buyer = Wallet::generate();
        let mut params = token_params();
        params.dev_buy_max_cost = Some(103_000_000);

        let mut capped = Buyer::new(&buyer, 1_000_000_000);
        capped.max_cost = Some(1_020_000_000);
        let bundle = builder
            .build_create_and_buy_bundle(&deployer, &mint, &[capped], &params)
            .unwrap();
        // 5% slippage would allow 1.05 SOL and 0.105 SOL
        assert_eq!(buy_args(&bundle.transactions()[1]).1, 1_020_000_000);
        assert_eq!(buy_args(&bundle.transactions()[0]).1, 103_000_000);

        // Below the buy plus its 1% fee
        capped.max_cost = Some(1_009_999_999);
        let err = builder
            .build_create_and_buy_bundle(&deployer, &mint, &[capped], &params)
            .unwrap_err();
        assert!(matches!(err, BundleError::InsufficientBalance(_)));
    }

    #[test]
    fn test_distribute_tokens_chunks_and_tips_last() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique());
        let funder = Wallet::generate();
        let mint = Pubkey::new_unique();
        let recipients: Vec<_> = (0..9).map(|i| (Pubkey::new_unique(), 1_000 + i)).collect();
        let tax = TaxTransfer {
            recipient: Pubkey::new_unique(),
            lamports: 200_000_000,
        };

        let bundle = builder
            .build_distribute_tokens_bundle(&funder, &mint, 6, &recipients, Some(&tax))
            .unwrap();
        assert_eq!(bundle.len(), 3);
        let count = |tx: &SignedTransaction, kind: InstructionKind| {
            tx.instructions().iter().filter(|ix| ix.kind() == kind).count()
        };
        let transfers: Vec<_> = bundle
            .transactions()
            .iter()
            .map(|tx| count(tx, InstructionKind::TokenTransfer))
            .collect();
        assert_eq!(transfers, vec![4, 4, 1]);
        assert_eq!(count(&bundle.transactions()[0], InstructionKind::Transfer), 1);
        assert_eq!(count(&bundle.transactions()[2], InstructionKind::Transfer), 0);
        assert_eq!(
            bundle.tip(),
            Some(&TipPlacement {
                transaction_index: 2,
                funded_by: funder.pubkey()
            })
        );
        for tx in bundle.transactions() {
            assert_eq!(tx.payer(), &funder.pubkey());
            assert_eq!(tx.signers(), vec![funder.pubkey()]);
            assert!(bincode::serialize(tx.transaction()).unwrap().len() <= 1232);
        }
    }

    #[test]
    fn test_distribute_tokens_requires_amounts() {
        let tips = tip_config();
        let builder = BundleBuilder::new(&tips, Hash::new_unique()).with_max_transactions(2);
        let funder = Wallet::generate();
        let mint = Pubkey::new_unique();
        assert!(matches!(
            builder.build_distribute_tokens_bundle(&funder, &mint, 6, &[(Pubkey::new_unique(), 0)], None),
            Err(BundleError::Configuration(_))
        ));
        let many: Vec<_> = (0..9).map(|_| (Pubkey::new_unique(), 1)).collect();
        assert_eq!(
            builder
                .build_distribute_tokens_bundle(&funder, &mint, 6, &many, None)
                .unwrap_err(),
            BundleError::BundleTooLarge { len: 3, max: 2 }
        );
    }

    #[test]
    fn test_weighted_split_remainder_goes_last() {
        assert_eq!(weighted_split(10, &[1, 1, 1]).unwrap(), vec![3, 3, 4]);
        assert_eq!(weighted_split(1_000, &[3, 1]).unwrap(), vec![750, 250]);
        assert_eq!(weighted_split(5, &[]).unwrap(), Vec::<u64>::new());
        assert!(weighted_split(5, &[0, 0]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_weighted_split_sums_to_total(
            total in proptest::prelude::any::<u64>(),
            weights in proptest::collection::vec(1u64..1_000, 1..20),
        ) {
            let shares = weighted_split(total, &weights).unwrap();
            proptest::prop_assert_eq!(shares.len(), weights.len());
            let sum: u128 = shares.iter().map(|s| u128::from(*s)).sum();
            proptest::prop_assert_eq!(sum, u128::from(total));
        }

        #[test]
        fn prop_sell_amount_bounded(balance in proptest::prelude::any::<u64>(), pct in 1u8..=100) {
            let amount = sell_amount(balance, pct).unwrap();
            proptest::prop_assert!(amount <= balance);
            proptest::prop_assert_eq!(amount == balance, pct == 100 || balance == 0);
        }
    }
}
