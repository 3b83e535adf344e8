//! Bundler CLI
//!
//! Builds a bundle from wallets held in environment variables or secret
//! files, submits it to the configured block-engine relay and waits for it
//! to settle. Secrets are never accepted on the command line.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

use bundler::config::Config;
use bundler::endpoints;
use bundler::metadata::{ImageFile, MetadataUploader, PinataUploader, TokenMetadata};
use bundler::relay::{poll_status, JsonRpcRelay};
use bundler::rpc::SolanaChainRpc;
use bundler::service::{
    BundleRequest, BundleService, BuyerSpec, CreateAndBuyRequest, DistributeSolRequest,
    DistributeTokensRequest, LiquidityRequest, LookupTableRequest, SellRequest, TokenAllocation,
};
use bundler::tx_builder::constants::PUMP_TOKEN_DECIMALS;
use bundler::tx_builder::{
    parse_address, parse_wallet_address, AmmPoolKeys, CreatePoolParams, LiquidityParams,
    TaxTransfer, TokenParams,
};
use bundler::Pubkey;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "BUNDLER_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines (overrides the config file)
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch a token and buy it from several wallets in one bundle
    CreateAndBuy {
        #[arg(long)]
        name: String,

        #[arg(long)]
        symbol: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Existing metadata URI; when absent the metadata is pinned first
        #[arg(long)]
        metadata_uri: Option<String>,

        /// Image pinned alongside the metadata
        #[arg(long)]
        image: Option<PathBuf>,

        #[arg(long, default_value_t = 0)]
        dev_buy_lamports: u64,

        #[arg(long, default_value_t = 500)]
        slippage_bps: u16,

        /// Lamports each buyer spends; defaults to its balance minus a reserve
        #[arg(long)]
        buy_lamports: Option<u64>,

        /// Environment variable holding the deployer secret
        #[arg(long, default_value = "DEPLOYER_SECRET")]
        deployer_env: String,

        /// Environment variable holding the mint secret; generated when unset
        #[arg(long)]
        mint_env: Option<String>,

        /// File with one base-58 buyer secret per line
        #[arg(long)]
        buyers_file: Option<PathBuf>,

        /// Fee transfer appended to the deployer transaction
        #[arg(long, requires = "tax_lamports")]
        tax_recipient: Option<String>,

        #[arg(long, requires = "tax_recipient")]
        tax_lamports: Option<u64>,

        /// Build and print the bundle without submitting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Sell a percentage of every wallet's balance in one bundle
    Sell {
        #[arg(long)]
        mint: String,

        /// 1..=100
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        percentage: u8,

        /// File with one base-58 seller secret per line
        #[arg(long)]
        wallets_file: PathBuf,

        /// Environment variable holding a shared fee payer secret
        #[arg(long)]
        fee_payer_env: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Create an AMM pool and make the first swap into it
    Liquidity {
        /// TOML file with a `[keys]` table of pool accounts and a `[pool]` table
        #[arg(long)]
        pool_file: PathBuf,

        /// Lamports the buyer swaps into the base token
        #[arg(long)]
        buy_lamports: u64,

        #[arg(long, default_value_t = 0)]
        min_amount_out: u64,

        #[arg(long, default_value = "DEPLOYER_SECRET")]
        deployer_env: String,

        #[arg(long, default_value = "BUYER_SECRET")]
        buyer_env: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Send SOL from one wallet to many
    DistributeSol {
        /// File with one `address,lamports` pair per line
        #[arg(long)]
        recipients_file: PathBuf,

        #[arg(long, default_value = "FEE_PAYER_SECRET")]
        fee_payer_env: String,

        #[arg(long, default_value = "SENDER_SECRET")]
        sender_env: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Send tokens from one wallet to many
    DistributeTokens {
        #[arg(long)]
        mint: String,

        #[arg(long, default_value_t = PUMP_TOKEN_DECIMALS)]
        decimals: u8,

        /// `address,amount` lines, or bare addresses with --split-balance
        #[arg(long)]
        recipients_file: PathBuf,

        /// Split the funder's whole balance across the listed wallets at random
        #[arg(long)]
        split_balance: bool,

        #[arg(long, default_value = "FUNDER_SECRET")]
        funder_env: String,

        #[arg(long, requires = "tax_lamports")]
        tax_recipient: Option<String>,

        #[arg(long, requires = "tax_recipient")]
        tax_lamports: Option<u64>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Create a lookup table holding the listed addresses
    LookupTable {
        /// File with one base-58 address per line
        #[arg(long)]
        addresses_file: PathBuf,

        #[arg(long, default_value = "AUTHORITY_SECRET")]
        authority_env: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Poll the relay for a bundle's status
    Status { bundle_id: String },

    /// Load and validate the configuration, then exit
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(args.verbose, args.json_logs || config.monitoring.json_logs)?;

    info!("🚀 Starting bundler v{}", env!("CARGO_PKG_VERSION"));
    config.validate().context("Invalid configuration")?;

    if config.monitoring.enable_metrics && !matches!(args.command, Command::ValidateConfig) {
        info!("📊 Starting metrics server on port {}", config.monitoring.metrics_port);
        let metrics_port = config.monitoring.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let relay = Arc::new(
        JsonRpcRelay::new(&config.relay.endpoint, config.relay_timeout())
            .context("Failed to create relay client")?,
    );

    let (request, dry_run) = match args.command {
        Command::ValidateConfig => {
            info!("✅ Configuration is valid");
            return Ok(());
        }
        Command::Status { bundle_id } => {
            let result = poll_status(relay.as_ref(), &bundle_id, &config.poll_config()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }
        Command::CreateAndBuy {
            name,
            symbol,
            description,
            metadata_uri,
            image,
            dev_buy_lamports,
            slippage_bps,
            buy_lamports,
            deployer_env,
            mint_env,
            buyers_file,
            tax_recipient,
            tax_lamports,
            dry_run,
        } => {
            let metadata_uri = match metadata_uri {
                Some(uri) => uri,
                None => {
                    let metadata = TokenMetadata {
                        name: name.clone(),
                        symbol: symbol.clone(),
                        description,
                        ..TokenMetadata::default()
                    };
                    upload_metadata(&config, image.as_deref(), &metadata).await?
                }
            };

            let tax = parse_tax(tax_recipient, tax_lamports)?;

            let buyers = match buyers_file {
                Some(path) => read_secrets_file(&path)?
                    .into_iter()
                    .map(|secret| BuyerSpec {
                        secret,
                        sol_amount: buy_lamports,
                    })
                    .collect(),
                None => Vec::new(),
            };

            let request = CreateAndBuyRequest {
                deployer_secret: read_secret_env(&deployer_env)?,
                mint_secret: mint_env.as_deref().map(read_secret_env).transpose()?,
                buyers,
                token: TokenParams {
                    name,
                    symbol,
                    metadata_uri,
                    dev_buy_lamports,
                    slippage_bps,
                    dev_buy_max_cost: None,
                    tax,
                },
            };
            (BundleRequest::CreateAndBuy(request), dry_run)
        }
        Command::Sell {
            mint,
            percentage,
            wallets_file,
            fee_payer_env,
            dry_run,
        } => {
            let request = SellRequest {
                wallet_secrets: read_secrets_file(&wallets_file)?,
                mint,
                sell_percentage: percentage,
                fee_payer_secret: fee_payer_env.as_deref().map(read_secret_env).transpose()?,
            };
            (BundleRequest::Sell(request), dry_run)
        }
        Command::Liquidity {
            pool_file,
            buy_lamports,
            min_amount_out,
            deployer_env,
            buyer_env,
            dry_run,
        } => {
            let (keys, pool) = load_pool_file(&pool_file)?;
            let request = LiquidityRequest {
                deployer_secret: read_secret_env(&deployer_env)?,
                buyer_secret: read_secret_env(&buyer_env)?,
                params: LiquidityParams {
                    keys,
                    pool,
                    buy_lamports,
                    min_amount_out,
                },
            };
            (BundleRequest::Liquidity(request), dry_run)
        }
        Command::DistributeSol {
            recipients_file,
            fee_payer_env,
            sender_env,
            dry_run,
        } => {
            let request = DistributeSolRequest {
                fee_payer_secret: read_secret_env(&fee_payer_env)?,
                sender_secret: read_secret_env(&sender_env)?,
                recipients: read_amounts_file(&recipients_file)?,
            };
            (BundleRequest::DistributeSol(request), dry_run)
        }
        Command::DistributeTokens {
            mint,
            decimals,
            recipients_file,
            split_balance,
            funder_env,
            tax_recipient,
            tax_lamports,
            dry_run,
        } => {
            let allocation = if split_balance {
                TokenAllocation::SplitBalance(read_list_file(&recipients_file)?)
            } else {
                TokenAllocation::Fixed(read_amounts_file(&recipients_file)?)
            };
            let request = DistributeTokensRequest {
                funder_secret: read_secret_env(&funder_env)?,
                mint,
                decimals,
                allocation,
                tax: parse_tax(tax_recipient, tax_lamports)?,
            };
            (BundleRequest::DistributeTokens(request), dry_run)
        }
        Command::LookupTable {
            addresses_file,
            authority_env,
            dry_run,
        } => {
            let request = LookupTableRequest {
                authority_secret: read_secret_env(&authority_env)?,
                addresses: read_list_file(&addresses_file)?,
            };
            (BundleRequest::LookupTable(request), dry_run)
        }
    };

    info!("🌐 RPC: {} | Relay: {}", config.rpc.url, relay.url());
    let rpc = Arc::new(SolanaChainRpc::new(
        config.rpc.url.clone(),
        config.commitment()?,
        config.rpc_timeout(),
        config.rpc.max_retries as usize,
    ));
    let service = BundleService::from_config(&config, rpc, relay)?;

    if dry_run {
        let bundle = service.build(request).await?;
        info!("🧪 Dry run: {} transactions built", bundle.len());
        for (idx, tx) in bundle.transactions().iter().enumerate() {
            println!("{} {} {} bytes", idx, tx.signature(), tx.serialize()?.len());
        }
        if let Some(table) = bundle.lookup_table() {
            println!("lookup table {}", table);
        }
        return Ok(());
    }

    let result = service.build_and_submit(request).await?;
    info!("🎯 Bundle {} is {}", result.bundle_id, result.status);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "bundler=debug,info"
    } else {
        "bundler=info,warn,error"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        dotenvy::dotenv().ok();
        eprintln!("Config file '{}' not found, using defaults", path);
        Ok(Config::default())
    }
}

fn read_secret_env(name: &str) -> Result<Zeroizing<String>> {
    let value = std::env::var(name)
        .map(Zeroizing::new)
        .with_context(|| format!("Environment variable {} is not set", name))?;
    if value.trim().is_empty() {
        bail!("Environment variable {} is empty", name);
    }
    Ok(value)
}

/// Lines that carry data: trimmed, without blanks and `#` comments
fn data_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// One secret per line; blank lines and `#` comments are skipped
fn read_secrets_file(path: &Path) -> Result<Vec<Zeroizing<String>>> {
    let content = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets from {}", path.display()))?,
    );
    let secrets: Vec<_> = data_lines(&content)
        .map(|line| Zeroizing::new(line.to_string()))
        .collect();
    if secrets.is_empty() {
        warn!("No secrets found in {}", path.display());
    }
    Ok(secrets)
}

/// One address per line
fn read_list_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(data_lines(&content).map(str::to_string).collect())
}

/// One `address,amount` pair per line
fn read_amounts_file(path: &Path) -> Result<Vec<(String, u64)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    data_lines(&content)
        .enumerate()
        .map(|(idx, line)| -> Result<(String, u64)> {
            let (address, amount) = line
                .split_once(',')
                .with_context(|| format!("{} line {}: expected address,amount", path.display(), idx + 1))?;
            let amount = amount
                .trim()
                .parse()
                .with_context(|| format!("{} line {}: bad amount", path.display(), idx + 1))?;
            Ok((address.trim().to_string(), amount))
        })
        .collect()
}

fn parse_tax(recipient: Option<String>, lamports: Option<u64>) -> Result<Option<TaxTransfer>> {
    match (recipient, lamports) {
        (Some(recipient), Some(lamports)) => Ok(Some(TaxTransfer {
            recipient: parse_wallet_address(&recipient)?,
            lamports,
        })),
        _ => Ok(None),
    }
}

/// Pool accounts as base-58 strings plus the initial liquidity
#[derive(Debug, Deserialize)]
struct PoolFile {
    keys: HashMap<String, String>,
    pool: CreatePoolParams,
}

fn load_pool_file(path: &Path) -> Result<(AmmPoolKeys, CreatePoolParams)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pool file {}", path.display()))?;
    let file: PoolFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse pool file {}", path.display()))?;
    let key = |name: &str| -> Result<Pubkey> {
        let value = file
            .keys
            .get(name)
            .with_context(|| format!("pool file is missing keys.{}", name))?;
        Ok(parse_address(value)?)
    };

    let keys = AmmPoolKeys {
        program_id: key("program_id")?,
        id: key("id")?,
        authority: key("authority")?,
        open_orders: key("open_orders")?,
        target_orders: key("target_orders")?,
        config: key("config")?,
        lp_mint: key("lp_mint")?,
        base_mint: key("base_mint")?,
        quote_mint: key("quote_mint")?,
        base_vault: key("base_vault")?,
        quote_vault: key("quote_vault")?,
        withdraw_queue: key("withdraw_queue")?,
        lp_vault: key("lp_vault")?,
        market_program_id: key("market_program_id")?,
        market_id: key("market_id")?,
        market_authority: key("market_authority")?,
        market_base_vault: key("market_base_vault")?,
        market_quote_vault: key("market_quote_vault")?,
        market_bids: key("market_bids")?,
        market_asks: key("market_asks")?,
        market_event_queue: key("market_event_queue")?,
    };
    Ok((keys, file.pool))
}

async fn upload_metadata(
    config: &Config,
    image: Option<&Path>,
    metadata: &TokenMetadata,
) -> Result<String> {
    let jwt = std::env::var(&config.metadata.api_key_env).ok();
    if jwt.is_none() {
        warn!("{} is not set; uploading without credentials", config.metadata.api_key_env);
    }
    let uploader = PinataUploader::new(&config.metadata.upload_endpoint, &config.metadata.gateway, jwt);

    let image = match image {
        Some(path) => Some(ImageFile {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image.png".to_string()),
            bytes: std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?,
        }),
        None => None,
    };

    let uri = uploader.upload(image, metadata).await?;
    info!("🖼️ Metadata pinned at {}", uri);
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_secrets_file_skips_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# buyers\nsecretA\n\n  secretB  \n").unwrap();
        let secrets = read_secrets_file(file.path()).unwrap();
        let secrets: Vec<&str> = secrets.iter().map(|s| s.as_str()).collect();
        assert_eq!(secrets, vec!["secretA", "secretB"]);
    }

    #[test]
    fn test_cli_parses_sell() {
        let args = Args::try_parse_from([
            "bundler",
            "sell",
            "--mint",
            "So11111111111111111111111111111111111111112",
            "--percentage",
            "50",
            "--wallets-file",
            "wallets.txt",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Sell { percentage: 50, .. }));

        assert!(Args::try_parse_from([
            "bundler",
            "sell",
            "--mint",
            "x",
            "--percentage",
            "0",
            "--wallets-file",
            "w"
        ])
        .is_err());
    }

    #[test]
    fn test_cli_parses_distribution_and_lookup_commands() {
        let args = Args::try_parse_from([
            "bundler",
            "distribute-tokens",
            "--mint",
            "So11111111111111111111111111111111111111112",
            "--recipients-file",
            "wallets.txt",
            "--split-balance",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::DistributeTokens {
                decimals: 6,
                split_balance: true,
                ..
            }
        ));

        let args =
            Args::try_parse_from(["bundler", "lookup-table", "--addresses-file", "a.txt", "--dry-run"])
                .unwrap();
        assert!(matches!(args.command, Command::LookupTable { dry_run: true, .. }));

        let args = Args::try_parse_from([
            "bundler",
            "distribute-sol",
            "--recipients-file",
            "r.txt",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::DistributeSol { .. }));
    }

    #[test]
    fn test_read_amounts_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# recipients\nAddrOne, 1000\n\nAddrTwo,25").unwrap();
        assert_eq!(
            read_amounts_file(file.path()).unwrap(),
            vec![("AddrOne".to_string(), 1000), ("AddrTwo".to_string(), 25)]
        );

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "AddrOne").unwrap();
        assert!(read_amounts_file(bad.path()).is_err());
    }

    #[test]
    fn test_load_pool_file() {
        let names = [
            "program_id", "id", "authority", "open_orders", "target_orders", "config",
            "lp_mint", "base_mint", "quote_mint", "base_vault", "quote_vault",
            "withdraw_queue", "lp_vault", "market_program_id", "market_id",
            "market_authority", "market_base_vault", "market_quote_vault", "market_bids",
            "market_asks", "market_event_queue",
        ];
        let base_mint = Pubkey::new_unique();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[keys]").unwrap();
        for name in names {
            let key = if name == "base_mint" { base_mint } else { Pubkey::new_unique() };
            writeln!(file, "{} = \"{}\"", name, key).unwrap();
        }
        writeln!(
            file,
            "[pool]\nnonce = 254\nopen_time = 0\nbase_amount = 1000\nquote_amount = 2000"
        )
        .unwrap();

        let (keys, pool) = load_pool_file(file.path()).unwrap();
        assert_eq!(keys.base_mint, base_mint);
        assert_eq!(pool.nonce, 254);
        assert_eq!(pool.quote_amount, 2000);

        let mut missing = tempfile::NamedTempFile::new().unwrap();
        writeln!(missing, "[keys]\nid = \"{}\"\n[pool]\nnonce = 1\nopen_time = 0\nbase_amount = 1\nquote_amount = 1", Pubkey::new_unique()).unwrap();
        assert!(load_pool_file(missing.path()).is_err());
    }
}
