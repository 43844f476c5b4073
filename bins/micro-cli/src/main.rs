//! microwallet: command-line front end.
//!
//! Shows the balance of an xpub account, hands out receiving addresses and
//! builds transactions, either as portable JSON for an offline signer
//! (`fund`) or signed by an external program (`send`). Logs go to stderr;
//! stdout carries only command output.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bitcoin::bip32::Fingerprint;
use bitcoin::consensus::encode::serialize_hex;
use clap::{Args, Parser, Subcommand, ValueEnum};
use micro_core::amount::{format_amount, parse_amount};
use micro_core::coins::CoinType;
use micro_core::error::{ConfigError, WalletError};
use micro_core::types::{Chain, ScriptType};
use micro_indexer::BlockbookClient;
use micro_wallet::{
    AccountKey, CommandSigner, FundedTransaction, InputOrdering, RetryPolicy, ScanConfig,
    SpendOptions, WalletSession,
};
use tracing::debug;

use crate::config::CliConfig;

/// Stateless xpub wallet for Bitcoin-family coins.
#[derive(Parser)]
#[command(name = "microwallet")]
#[command(version, about = "Stateless xpub wallet for Bitcoin-family coins")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Coin name or ticker.
    #[arg(short, long, default_value = "bitcoin")]
    coin: String,

    /// Account extended public key (xpub, ypub, zpub, ...).
    #[arg(short, long)]
    xpub: Option<String>,

    /// Account number. Defaults to the account the key was exported for.
    #[arg(short, long)]
    account: Option<u32>,

    /// Account type. Defaults to the type implied by the key prefix.
    #[arg(short = 't', long = "type", value_enum)]
    account_type: Option<AccountType>,

    /// Blockbook backend URL (default: $BLOCKBOOK_URL).
    #[arg(short, long)]
    url: Option<String>,

    /// Master key fingerprint to record for signers, as 8 hex digits.
    #[arg(long)]
    fingerprint: Option<String>,

    /// Consecutive unused addresses that end a chain scan.
    #[arg(long, default_value_t = micro_core::constants::DEFAULT_GAP_LIMIT)]
    gap_limit: u32,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum AccountType {
    /// BIP-44 pay-to-pubkey-hash.
    Legacy,
    /// The coin's default: wrapped segwit where available.
    Default,
    /// BIP-84 native segwit.
    Segwit,
}

impl AccountType {
    fn script_type(self, coin: CoinType) -> ScriptType {
        match self {
            Self::Legacy => ScriptType::P2pkh,
            Self::Default => coin.params().default_script_type(),
            Self::Segwit => ScriptType::P2wpkh,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Ordering {
    LargestFirst,
    SmallestFirst,
    OldestFirst,
}

impl From<Ordering> for InputOrdering {
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::LargestFirst => InputOrdering::LargestFirst,
            Ordering::SmallestFirst => InputOrdering::SmallestFirst,
            Ordering::OldestFirst => InputOrdering::OldestFirst,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the account balance.
    Show(ShowArgs),
    /// Print the first unused receiving address.
    Receive,
    /// Build an unsigned transaction for offline signing.
    Fund(FundArgs),
    /// Build a transaction and sign it with an external signer.
    Send(SendArgs),
}

#[derive(Args)]
struct ShowArgs {
    /// List individual UTXOs.
    #[arg(short, long)]
    utxo: bool,
}

#[derive(Args)]
struct SpendArgs {
    /// Destination address.
    address: String,

    /// Amount in whole coins, e.g. 0.0004.
    amount: String,

    /// Fee rate in smallest units per 1000 virtual bytes (default: indexer estimate).
    #[arg(long)]
    fee_rate: Option<u64>,

    /// Order in which UTXOs are considered.
    #[arg(long, value_enum, default_value_t = Ordering::LargestFirst)]
    ordering: Ordering,

    /// Ignore UTXOs with fewer confirmations.
    #[arg(long, default_value_t = 0)]
    min_confirmations: u32,

    /// Print spent UTXOs and the fee to stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl SpendArgs {
    fn options(&self) -> SpendOptions {
        SpendOptions {
            fee_rate: self.fee_rate,
            ordering: self.ordering.into(),
            min_confirmations: self.min_confirmations,
            ..SpendOptions::default()
        }
    }
}

#[derive(Args)]
struct FundArgs {
    #[command(flatten)]
    spend: SpendArgs,

    /// Write the JSON transaction to this file instead of stdout.
    #[arg(short, long)]
    json: Option<PathBuf>,
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    spend: SpendArgs,

    /// Signer program (default: $MICROWALLET_SIGNER).
    #[arg(short, long)]
    signer: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.global.log_level, cli.global.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// Process exit status for a failed command: the wallet error category's
/// code, or 1 for anything outside the wallet core.
fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<WalletError>()
        .and_then(|e| u8::try_from(e.category().exit_code()).ok())
        .unwrap_or(1)
}

/// Initialize tracing on stderr with the given level and output format.
fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = CliConfig::from_env().map_err(WalletError::from)?;
    let session = open_session(&cli.global, &config)?;
    let symbol = session.key().coin().params().shortcut;

    match cli.command {
        Commands::Show(args) => show(&session, args, symbol).await,
        Commands::Receive => {
            let address = session.receive_address().await?;
            println!("{}", address.address);
            Ok(())
        }
        Commands::Fund(args) => fund(&session, args, symbol).await,
        Commands::Send(args) => send(&session, &config, args, symbol).await,
    }
}

fn open_session(args: &GlobalArgs, config: &CliConfig) -> Result<WalletSession, WalletError> {
    let coin: CoinType = args.coin.parse()?;
    let xpub = args
        .xpub
        .as_deref()
        .ok_or_else(|| ConfigError::Invalid("--xpub is required".into()))?;
    let script_type = args.account_type.map(|t| t.script_type(coin));
    let mut key = AccountKey::from_xpub(coin, xpub, args.account, script_type)?;
    if let Some(fp) = &args.fingerprint {
        let fingerprint: Fingerprint = fp
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("fingerprint {fp:?}: {e}")))?;
        key = key.with_master_fingerprint(fingerprint);
    }

    let url = args
        .url
        .clone()
        .or_else(|| config.blockbook_url.clone())
        .ok_or_else(|| ConfigError::Invalid("no backend URL; pass --url or set BLOCKBOOK_URL".into()))?;
    let indexer = BlockbookClient::new(&url, config.timeout).map_err(|source| {
        WalletError::IndexerUnavailable {
            attempts: 0,
            source,
        }
    })?;

    debug!(%coin, account = %key.account_path(), %url, "Opening wallet session");
    let scan = ScanConfig {
        gap_limit: args.gap_limit,
        retry: RetryPolicy {
            timeout: config.timeout,
            ..RetryPolicy::default()
        },
        ..ScanConfig::default()
    };
    Ok(WalletSession::new(key, Arc::new(indexer)).with_scan_config(scan))
}

async fn show(session: &WalletSession, args: ShowArgs, symbol: &str) -> Result<()> {
    let account = session.load_account().await?;
    if args.utxo {
        for chain in Chain::BOTH {
            for scanned in account.addresses(chain) {
                for u in &scanned.info.utxos {
                    println!(
                        "{}: {}:{} - {} {symbol}",
                        scanned.derived.address,
                        u.txid,
                        u.vout,
                        format_amount(u.amount)
                    );
                }
            }
        }
    }
    println!("Balance: {} {symbol}", format_amount(account.balance()));
    Ok(())
}

fn parse_spend_amount(s: &str) -> Result<u64, WalletError> {
    let amount = parse_amount(s)?;
    if amount == 0 {
        return Err(ConfigError::InvalidAmount("amount must be positive".into()).into());
    }
    Ok(amount)
}

fn print_spend_details(funded: &FundedTransaction, symbol: &str) {
    eprintln!("Spending from:");
    for input in &funded.tx.inputs {
        eprintln!(
            "{}:{} - {} {symbol}",
            input.txid,
            input.vout,
            format_amount(input.amount)
        );
    }
    eprintln!(
        "Fee: {} {symbol} (at {} sat/KB)",
        format_amount(funded.tx.fee),
        funded.fee_rate
    );
}

async fn fund(session: &WalletSession, args: FundArgs, symbol: &str) -> Result<()> {
    let amount = parse_spend_amount(&args.spend.amount)?;
    let funded = session
        .fund(&args.spend.address, amount, &args.spend.options())
        .await?;
    if args.spend.verbose {
        print_spend_details(&funded, symbol);
    }

    let mut json = funded.to_portable()?;
    json.push(b'\n');
    match args.json {
        Some(path) => std::fs::write(&path, &json)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{}", String::from_utf8_lossy(&json)),
    }
    Ok(())
}

async fn send(session: &WalletSession, config: &CliConfig, args: SendArgs, symbol: &str) -> Result<()> {
    let program = args
        .signer
        .or_else(|| config.signer.clone())
        .ok_or_else(|| {
            WalletError::from(ConfigError::Invalid(
                "no signer; pass --signer or set MICROWALLET_SIGNER".into(),
            ))
        })?;
    let amount = parse_spend_amount(&args.spend.amount)?;
    let signer = CommandSigner::new(program);

    let (funded, signed) = session
        .send(&args.spend.address, amount, &args.spend.options(), &signer)
        .await?;
    if args.spend.verbose {
        print_spend_details(&funded, symbol);
        eprintln!("Transaction {}", signed.compute_txid());
    }
    println!("{}", serialize_hex(&signed));
    Ok(())
}
