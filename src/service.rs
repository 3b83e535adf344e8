//! Bundle service: the single entry point callers use
//!
//! `build_and_submit` decodes wallets and parses addresses, then fetches the
//! one blockhash and every balance the build depends on, builds and
//! validates the bundle, submits it and polls until it settles. A request
//! that fails to decode never touches the network. Reads are concurrent;
//! nothing is assembled until all of them have completed.

use std::sync::Arc;

use futures::future::try_join_all;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn, Instrument};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::metrics::{metrics, InFlightGuard, Timer};
use crate::observability::TraceContext;
use crate::relay::{poll_status, BundleRelay, BundleResult, BundleStatus, PollConfig};
use crate::rpc::ChainRpc;
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::constants::{SIGNATURE_FEE_LAMPORTS, TOKEN_TRANSFERS_PER_TRANSACTION};
use crate::tx_builder::costs::{
    auto_buy_lamports, buy_outlay, buyer_overhead, launch_overhead, lookup_table_rent,
    TOKEN_ACCOUNT_RENT_LAMPORTS,
};
use crate::tx_builder::{
    parse_address, parse_wallet_address, weighted_split, Bundle, BundleBuilder, BundleError,
    BuyPlan, Buyer, ComputeBudget, LiquidityParams, Seller, TaxTransfer, TipConfig, TokenParams,
};
use crate::wallet::{decode_all, Wallet};

/// One buyer of a create-and-buy bundle
pub struct BuyerSpec {
    /// Base-58 64-byte secret
    pub secret: Zeroizing<String>,
    /// Lamports to spend; `None` spends 98% of the balance above a 0.003 SOL
    /// reserve, less whatever fees, rent and tip the wallet still owes
    pub sol_amount: Option<u64>,
}

pub struct CreateAndBuyRequest {
    pub deployer_secret: Zeroizing<String>,
    /// Fresh mint keypair; generated when absent
    pub mint_secret: Option<Zeroizing<String>>,
    pub buyers: Vec<BuyerSpec>,
    pub token: TokenParams,
}

pub struct SellRequest {
    pub wallet_secrets: Vec<Zeroizing<String>>,
    pub mint: String,
    /// 1..=100
    pub sell_percentage: u8,
    /// Pays every transaction and the tip when set
    pub fee_payer_secret: Option<Zeroizing<String>>,
}

pub struct LiquidityRequest {
    pub deployer_secret: Zeroizing<String>,
    pub buyer_secret: Zeroizing<String>,
    pub params: LiquidityParams,
}

pub struct DistributeSolRequest {
    pub fee_payer_secret: Zeroizing<String>,
    pub sender_secret: Zeroizing<String>,
    /// Base-58 wallet address and lamports
    pub recipients: Vec<(String, u64)>,
}

/// How a token distribution divides the funder's tokens
pub enum TokenAllocation {
    /// Base-58 wallet address and raw token amount
    Fixed(Vec<(String, u64)>),
    /// The funder's whole balance, split across these wallets at random
    SplitBalance(Vec<String>),
}

pub struct DistributeTokensRequest {
    pub funder_secret: Zeroizing<String>,
    pub mint: String,
    pub decimals: u8,
    pub allocation: TokenAllocation,
    pub tax: Option<TaxTransfer>,
}

pub struct LookupTableRequest {
    pub authority_secret: Zeroizing<String>,
    /// Base-58 addresses to store in the new table
    pub addresses: Vec<String>,
}

/// Everything a caller can ask the service to build
pub enum BundleRequest {
    CreateAndBuy(CreateAndBuyRequest),
    Sell(SellRequest),
    Liquidity(LiquidityRequest),
    DistributeSol(DistributeSolRequest),
    DistributeTokens(DistributeTokensRequest),
    LookupTable(LookupTableRequest),
}

impl BundleRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateAndBuy(_) => "create_and_buy",
            Self::Sell(_) => "sell",
            Self::Liquidity(_) => "liquidity",
            Self::DistributeSol(_) => "distribute_sol",
            Self::DistributeTokens(_) => "distribute_tokens",
            Self::LookupTable(_) => "lookup_table",
        }
    }

    fn wallet_count(&self) -> usize {
        match self {
            Self::CreateAndBuy(r) => 1 + r.buyers.len(),
            Self::Sell(r) => r.wallet_secrets.len(),
            Self::Liquidity(_) => 2,
            Self::DistributeSol(_) => 2,
            Self::DistributeTokens(_) => 1,
            Self::LookupTable(_) => 1,
        }
    }
}

/// Recipients of a token distribution once addresses are parsed
enum Allocation {
    Fixed(Vec<(Pubkey, u64)>),
    SplitBalance(Vec<Pubkey>),
}

/// A request with every secret decoded and every address parsed
enum Decoded {
    CreateAndBuy {
        deployer: Wallet,
        mint: Wallet,
        buyers: Vec<Wallet>,
        amounts: Vec<Option<u64>>,
        token: TokenParams,
    },
    Sell {
        mint: Pubkey,
        wallets: Vec<Wallet>,
        fee_payer: Option<Wallet>,
        sell_percentage: u8,
    },
    Liquidity {
        deployer: Wallet,
        buyer: Wallet,
        params: LiquidityParams,
    },
    DistributeSol {
        fee_payer: Wallet,
        sender: Wallet,
        recipients: Vec<(Pubkey, u64)>,
    },
    DistributeTokens {
        funder: Wallet,
        mint: Pubkey,
        decimals: u8,
        allocation: Allocation,
        tax: Option<TaxTransfer>,
    },
    LookupTable {
        authority: Wallet,
        addresses: Vec<Pubkey>,
    },
}

fn decode_secrets(secrets: &[Zeroizing<String>]) -> Result<Vec<Wallet>, BundleError> {
    decode_all(&secrets.iter().map(|s| s.as_str()).collect::<Vec<_>>())
}

fn parse_recipients(recipients: &[(String, u64)]) -> Result<Vec<(Pubkey, u64)>, BundleError> {
    recipients
        .iter()
        .map(|(address, amount)| Ok((parse_wallet_address(address)?, *amount)))
        .collect()
}

impl Decoded {
    fn decode(request: BundleRequest) -> Result<Self, BundleError> {
        Ok(match request {
            BundleRequest::CreateAndBuy(r) => {
                let deployer = Wallet::decode(&r.deployer_secret)?;
                let mint = match &r.mint_secret {
                    Some(secret) => Wallet::decode(secret)?,
                    None => Wallet::generate(),
                };
                let secrets: Vec<&str> = r.buyers.iter().map(|b| b.secret.as_str()).collect();
                Self::CreateAndBuy {
                    deployer,
                    mint,
                    buyers: decode_all(&secrets)?,
                    amounts: r.buyers.iter().map(|b| b.sol_amount).collect(),
                    token: r.token,
                }
            }
            BundleRequest::Sell(r) => Self::Sell {
                mint: parse_address(&r.mint)?,
                wallets: decode_secrets(&r.wallet_secrets)?,
                fee_payer: r
                    .fee_payer_secret
                    .as_ref()
                    .map(|s| Wallet::decode(s))
                    .transpose()?,
                sell_percentage: r.sell_percentage,
            },
            BundleRequest::Liquidity(r) => Self::Liquidity {
                deployer: Wallet::decode(&r.deployer_secret)?,
                buyer: Wallet::decode(&r.buyer_secret)?,
                params: r.params,
            },
            BundleRequest::DistributeSol(r) => Self::DistributeSol {
                fee_payer: Wallet::decode(&r.fee_payer_secret)?,
                sender: Wallet::decode(&r.sender_secret)?,
                recipients: parse_recipients(&r.recipients)?,
            },
            BundleRequest::DistributeTokens(r) => Self::DistributeTokens {
                funder: Wallet::decode(&r.funder_secret)?,
                mint: parse_address(&r.mint)?,
                decimals: r.decimals,
                allocation: match &r.allocation {
                    TokenAllocation::Fixed(recipients) => {
                        Allocation::Fixed(parse_recipients(recipients)?)
                    }
                    TokenAllocation::SplitBalance(wallets) => Allocation::SplitBalance(
                        wallets
                            .iter()
                            .map(|w| parse_wallet_address(w))
                            .collect::<Result<_, _>>()?,
                    ),
                },
                tax: r.tax,
            },
            BundleRequest::LookupTable(r) => Self::LookupTable {
                authority: Wallet::decode(&r.authority_secret)?,
                addresses: r
                    .addresses
                    .iter()
                    .map(|a| parse_address(a))
                    .collect::<Result<_, _>>()?,
            },
        })
    }
}

fn insufficient(who: &str, key: &Pubkey, balance: u64, needed: u64) -> BundleError {
    BundleError::InsufficientBalance(format!(
        "{} {} holds {} lamports, needs {}",
        who, key, balance, needed
    ))
}

/// Spend of one buyer and the most its buy may debit
///
/// `None` when the buyer sits out: an explicit zero, or an auto-sized
/// wallet with nothing left after the reserve, fees, rent and `tip_share`.
fn size_buyer(
    wallet: &Wallet,
    balance: u64,
    amount: Option<u64>,
    tip_share: u64,
) -> Result<Option<(u64, u64)>, BundleError> {
    let overhead = buyer_overhead(tip_share)?;
    let spend = match amount {
        Some(0) => return Ok(None),
        Some(lamports) => {
            let needed = buy_outlay(lamports)?
                .checked_add(overhead)
                .ok_or(BundleError::ArithmeticOverflow("buyer spend"))?;
            if balance < needed {
                return Err(insufficient("buyer", &wallet.pubkey(), balance, needed));
            }
            lamports
        }
        None => match auto_buy_lamports(balance, tip_share)? {
            Some(lamports) => lamports,
            None => return Ok(None),
        },
    };
    Ok(Some((spend, balance - overhead)))
}

/// Builds, submits and tracks bundles
#[derive(Debug, Clone)]
pub struct BundleService {
    rpc: Arc<dyn ChainRpc>,
    relay: Arc<dyn BundleRelay>,
    tip: TipConfig,
    compute: ComputeBudget,
    max_bundle_len: usize,
    poll: PollConfig,
    lookup_tables: Vec<Pubkey>,
}

impl BundleService {
    pub fn new(rpc: Arc<dyn ChainRpc>, relay: Arc<dyn BundleRelay>, tip: TipConfig) -> Self {
        Self {
            rpc,
            relay,
            tip,
            compute: ComputeBudget::default(),
            max_bundle_len: crate::tx_builder::constants::MAX_BUNDLE_TRANSACTIONS,
            poll: PollConfig::default(),
            lookup_tables: Vec::new(),
        }
    }

    /// Service settings taken from a validated `Config`
    pub fn from_config(
        config: &Config,
        rpc: Arc<dyn ChainRpc>,
        relay: Arc<dyn BundleRelay>,
    ) -> Result<Self, BundleError> {
        config.validate()?;
        Ok(Self::new(rpc, relay, config.tip_config()?)
            .with_compute_budget(config.compute_budget())
            .with_max_bundle_len(config.relay.max_bundle_len)
            .with_poll_config(config.poll_config()))
    }

    pub fn with_compute_budget(mut self, compute: ComputeBudget) -> Self {
        self.compute = compute;
        self
    }

    pub fn with_max_bundle_len(mut self, max: usize) -> Self {
        self.max_bundle_len = max;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Lookup tables resolved before every build
    pub fn with_lookup_tables(mut self, tables: Vec<Pubkey>) -> Self {
        self.lookup_tables = tables;
        self
    }

    pub fn tip_config(&self) -> &TipConfig {
        &self.tip
    }

    /// Build, submit and poll one bundle
    ///
    /// Construction errors are returned before anything is submitted.
    /// A relay rejection at submit time is `RelayRejected`; one reported
    /// while polling is an `Ok` result with `Rejected` status. No terminal
    /// status within the poll budget is `Timeout`.
    pub async fn build_and_submit(&self, request: BundleRequest) -> Result<BundleResult, BundleError> {
        let trace = TraceContext::new(request.kind());
        let span = trace.span();
        let logger = StructuredLogger::new(trace.correlation_id());

        async {
            let _in_flight = InFlightGuard::new(&metrics().bundles_in_flight);
            let bundle = self.build_logged(request, &logger).await?;

            let bundle_id = match self
                .relay
                .submit(&bundle)
                .instrument(trace.phase("submit").span())
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    if matches!(e, BundleError::RelayRejected(_)) {
                        metrics().bundles_rejected_total.inc();
                    }
                    logger.log_submit_failure(&e.to_string());
                    return Err(e);
                }
            };
            metrics().bundles_submitted_total.inc();
            logger.log_submitted(&bundle_id, bundle.len());

            let poll = trace.phase("poll");
            let result = poll_status(self.relay.as_ref(), &bundle_id, &self.poll)
                .instrument(poll.span())
                .await;
            let latency_ms = poll.elapsed_ms();
            match &result {
                Ok(BundleResult { status, .. }) => {
                    match status {
                        BundleStatus::Confirmed { .. } => metrics().bundles_landed_total.inc(),
                        BundleStatus::Rejected { .. } => metrics().bundles_rejected_total.inc(),
                        BundleStatus::Pending => {}
                    }
                    logger.log_settled(&bundle_id, &status.to_string(), latency_ms);
                }
                Err(BundleError::Timeout { .. }) => {
                    metrics().bundles_timed_out_total.inc();
                    logger.warn(&format!("bundle {} did not settle", bundle_id));
                }
                Err(_) => {}
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Build and validate a bundle without submitting it
    pub async fn build(&self, request: BundleRequest) -> Result<Bundle, BundleError> {
        let trace = TraceContext::new(request.kind());
        let logger = StructuredLogger::new(trace.correlation_id());
        self.build_logged(request, &logger)
            .instrument(trace.span())
            .await
    }

    async fn build_logged(
        &self,
        request: BundleRequest,
        logger: &StructuredLogger,
    ) -> Result<Bundle, BundleError> {
        let kind = request.kind();
        logger.log_build_started(kind, request.wallet_count());
        let timer = Timer::new();

        match self.build_inner(request).await {
            Ok(bundle) => {
                timer.observe_duration(&metrics().build_latency);
                metrics().bundles_built_total.inc();
                for warning in bundle.warnings() {
                    logger.warn(warning);
                }
                logger.log_bundle_built(
                    kind,
                    bundle.len(),
                    bundle.tip().map(|t| t.transaction_index),
                    (timer.elapsed_secs() * 1000.0) as u64,
                );
                Ok(bundle)
            }
            Err(e) => {
                metrics().record_build_error(e.category());
                logger.log_build_failure(kind, e.category(), &e.to_string());
                Err(e)
            }
        }
    }

    async fn build_inner(&self, request: BundleRequest) -> Result<Bundle, BundleError> {
        let decoded = Decoded::decode(request)?;

        // The one blockhash shared by every transaction
        let blockhash = self.rpc.latest_blockhash().await?;
        let tables = try_join_all(self.lookup_tables.iter().map(|t| self.rpc.lookup_table(t))).await?;
        let builder = BundleBuilder::new(&self.tip, blockhash)
            .with_compute_budget(self.compute)
            .with_max_transactions(self.max_bundle_len)
            .with_lookup_tables(tables);

        match decoded {
            Decoded::CreateAndBuy {
                deployer,
                mint,
                buyers,
                amounts,
                token,
            } => {
                self.create_and_buy(&builder, &deployer, &mint, &buyers, &amounts, token)
                    .await
            }
            Decoded::Sell {
                mint,
                wallets,
                fee_payer,
                sell_percentage,
            } => {
                self.sell(&builder, &mint, &wallets, fee_payer.as_ref(), sell_percentage)
                    .await
            }
            Decoded::Liquidity {
                deployer,
                buyer,
                params,
            } => self.liquidity(&builder, &deployer, &buyer, &params).await,
            Decoded::DistributeSol {
                fee_payer,
                sender,
                recipients,
            } => {
                self.distribute_sol(&builder, &fee_payer, &sender, &recipients)
                    .await
            }
            Decoded::DistributeTokens {
                funder,
                mint,
                decimals,
                allocation,
                tax,
            } => {
                self.distribute_tokens(&builder, &funder, &mint, decimals, allocation, tax)
                    .await
            }
            Decoded::LookupTable {
                authority,
                addresses,
            } => self.lookup_table(&builder, &authority, &addresses).await,
        }
    }

    async fn create_and_buy(
        &self,
        builder: &BundleBuilder<'_>,
        deployer: &Wallet,
        mint: &Wallet,
        buyer_wallets: &[Wallet],
        amounts: &[Option<u64>],
        mut token: TokenParams,
    ) -> Result<Bundle, BundleError> {
        let owners: Vec<Pubkey> = std::iter::once(deployer.pubkey())
            .chain(buyer_wallets.iter().map(Wallet::pubkey))
            .collect();
        let balances = try_join_all(owners.iter().map(|o| self.rpc.balance(o))).await?;
        let (deployer_balance, buyer_balances) = (balances[0], &balances[1..]);
        let tip = self.tip.tip_lamports();

        // Sizing depends on who carries the tip, and the carrier depends on
        // the quotes. Re-size until both agree. An auto-sized buyer that
        // cannot afford to carry the tip sits out.
        let mut excluded = vec![false; buyer_wallets.len()];
        let mut carrier = amounts.iter().rposition(|a| *a != Some(0));
        let mut settled = None;
        for _ in 0..=2 * buyer_wallets.len() {
            let mut sized = Vec::with_capacity(buyer_wallets.len());
            for (idx, (wallet, balance)) in buyer_wallets.iter().zip(buyer_balances).enumerate() {
                if excluded[idx] {
                    sized.push(None);
                    continue;
                }
                let tip_share = if carrier == Some(idx) { tip } else { 0 };
                let size = size_buyer(wallet, *balance, amounts[idx], tip_share)?;
                if size.is_none() && amounts[idx].is_none() && tip_share > 0 {
                    excluded[idx] = true;
                }
                sized.push(size);
            }
            let spends: Vec<u64> = sized.iter().map(|s| s.map_or(0, |(spend, _)| spend)).collect();
            let plan = BuyPlan::quote(token.dev_buy_lamports, &spends)?;
            if plan.tip_buyer == carrier {
                settled = Some((sized, plan));
                break;
            }
            carrier = plan.tip_buyer;
        }
        let (sized, plan) = settled.ok_or_else(|| {
            BundleError::Configuration(
                "buyer amounts do not settle on a tip carrier; set explicit amounts".to_string(),
            )
        })?;

        for ((wallet, size), amount) in buyer_wallets.iter().zip(&sized).zip(amounts) {
            if size.is_none() && amount.is_none() {
                warn!(buyer = %wallet.pubkey(), "Skipping buyer with too little SOL to buy");
            }
        }

        let deployer_tip = if plan.tip_buyer.is_none() { tip } else { 0 };
        let tax = token.tax.map(|t| t.lamports).unwrap_or(0);
        let overhead = launch_overhead(&self.compute, tax, deployer_tip)?;
        let needed = buy_outlay(token.dev_buy_lamports)?
            .checked_add(overhead)
            .ok_or(BundleError::ArithmeticOverflow("deployer spend"))?;
        if deployer_balance < needed {
            return Err(insufficient("deployer", &deployer.pubkey(), deployer_balance, needed));
        }
        if token.dev_buy_lamports > 0 {
            let budget = deployer_balance - overhead;
            token.dev_buy_max_cost = Some(token.dev_buy_max_cost.map_or(budget, |c| c.min(budget)));
        }

        let buyers: Vec<Buyer<'_>> = buyer_wallets
            .iter()
            .zip(&sized)
            .map(|(wallet, size)| match size {
                Some((lamports, max_cost)) => Buyer {
                    wallet,
                    lamports: *lamports,
                    max_cost: Some(*max_cost),
                },
                None => Buyer::new(wallet, 0),
            })
            .collect();

        info!(
            mint = %mint.pubkey(),
            buyers = plan.participants(),
            "Create-and-buy inputs resolved"
        );
        builder.build_create_and_buy_bundle(deployer, mint, &buyers, &token)
    }

    async fn sell(
        &self,
        builder: &BundleBuilder<'_>,
        mint: &Pubkey,
        wallets: &[Wallet],
        fee_payer: Option<&Wallet>,
        sell_percentage: u8,
    ) -> Result<Bundle, BundleError> {
        let owners: Vec<Pubkey> = wallets.iter().map(Wallet::pubkey).collect();
        let balances = try_join_all(owners.iter().map(|o| self.rpc.token_balance(o, mint))).await?;

        let sellers: Vec<Seller<'_>> = wallets
            .iter()
            .zip(balances)
            .map(|(wallet, token_balance)| Seller {
                wallet,
                token_balance,
            })
            .collect();

        builder.build_sell_bundle(&sellers, mint, sell_percentage, fee_payer)
    }

    async fn liquidity(
        &self,
        builder: &BundleBuilder<'_>,
        deployer: &Wallet,
        buyer: &Wallet,
        params: &LiquidityParams,
    ) -> Result<Bundle, BundleError> {
        let buyer_balance = self.rpc.balance(&buyer.pubkey()).await?;
        let needed = params
            .buy_lamports
            .checked_add(self.tip.tip_lamports())
            .ok_or(BundleError::ArithmeticOverflow("liquidity buy"))?;
        if buyer_balance < needed {
            return Err(insufficient("buyer", &buyer.pubkey(), buyer_balance, needed));
        }

        builder.build_liquidity_bundle(deployer, buyer, params)
    }

    async fn distribute_sol(
        &self,
        builder: &BundleBuilder<'_>,
        fee_payer: &Wallet,
        sender: &Wallet,
        recipients: &[(Pubkey, u64)],
    ) -> Result<Bundle, BundleError> {
        let total = recipients
            .iter()
            .try_fold(0u64, |acc, (_, lamports)| acc.checked_add(*lamports))
            .ok_or(BundleError::ArithmeticOverflow("distribution total"))?;
        let sender_balance = self.rpc.balance(&sender.pubkey()).await?;
        if sender_balance < total {
            return Err(insufficient("sender", &sender.pubkey(), sender_balance, total));
        }

        builder.build_distribute_sol_bundle(fee_payer, sender, recipients)
    }

    async fn distribute_tokens(
        &self,
        builder: &BundleBuilder<'_>,
        funder: &Wallet,
        mint: &Pubkey,
        decimals: u8,
        allocation: Allocation,
        tax: Option<TaxTransfer>,
    ) -> Result<Bundle, BundleError> {
        let funder_key = funder.pubkey();
        let (token_balance, sol_balance) = futures::try_join!(
            self.rpc.token_balance(&funder_key, mint),
            self.rpc.balance(&funder_key),
        )?;

        let recipients = match allocation {
            Allocation::Fixed(recipients) => recipients,
            Allocation::SplitBalance(wallets) => {
                let weights: Vec<u64> = wallets.iter().map(|_| fastrand::u64(1..=1_000)).collect();
                let shares = weighted_split(token_balance, &weights)?;
                wallets.into_iter().zip(shares).collect()
            }
        };

        let total = recipients
            .iter()
            .try_fold(0u64, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(BundleError::ArithmeticOverflow("token distribution total"))?;
        if token_balance < total {
            return Err(BundleError::InsufficientBalance(format!(
                "funder {} holds {} of {}, needs {}",
                funder_key, token_balance, mint, total
            )));
        }

        let transactions = recipients.len().div_ceil(TOKEN_TRANSFERS_PER_TRANSACTION) as u64;
        let sol_needed = [
            TOKEN_ACCOUNT_RENT_LAMPORTS.saturating_mul(recipients.len() as u64),
            SIGNATURE_FEE_LAMPORTS.saturating_mul(transactions),
            tax.map(|t| t.lamports).unwrap_or(0),
            self.tip.tip_lamports(),
        ]
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .ok_or(BundleError::ArithmeticOverflow("token distribution fees"))?;
        if sol_balance < sol_needed {
            return Err(insufficient("funder", &funder_key, sol_balance, sol_needed));
        }

        builder.build_distribute_tokens_bundle(funder, mint, decimals, &recipients, tax.as_ref())
    }

    async fn lookup_table(
        &self,
        builder: &BundleBuilder<'_>,
        authority: &Wallet,
        addresses: &[Pubkey],
    ) -> Result<Bundle, BundleError> {
        let authority_key = authority.pubkey();
        let (slot, balance) = futures::try_join!(
            self.rpc.recent_slot(),
            self.rpc.balance(&authority_key),
        )?;

        let (bundle, table) = builder.build_lookup_table_bundle(authority, slot, addresses)?;
        let needed = [
            lookup_table_rent(addresses.len()),
            SIGNATURE_FEE_LAMPORTS.saturating_mul(bundle.len() as u64),
            self.tip.tip_lamports(),
        ]
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .ok_or(BundleError::ArithmeticOverflow("lookup table cost"))?;
        if balance < needed {
            return Err(insufficient("authority", &authority_key, balance, needed));
        }

        info!(table = %table, slot, addresses = addresses.len(), "Lookup table planned");
        Ok(bundle)
    }
}
