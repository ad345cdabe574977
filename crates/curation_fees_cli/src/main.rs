//! curation-fees CLI: fetch, compute, payout, verify.

use clap::{Args, Parser, Subcommand};
use curation_fees::chain::{
    fetch_all_curations, FetchConfig, Fetcher, ReceiptCache, TimeWindow,
};
use curation_fees::curation::{resolve_item_ids, CuratorDirectory, ResolverConfig};
use curation_fees::pipeline::{
    compute_fee_summaries, unique_tx_hashes, FeeReport, PipelineConfig,
};
use curation_fees::report::PayoutConfig;
use curation_fees::verify::{reproducibility_hash, verify_bundle_hash, PayoutBundle};
use curation_fees_report::{write_audit_csv, write_payout_csv};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Fetch(args) => run_fetch(args),
        Command::Compute(args) => run_compute(args),
        Command::Payout(args) => run_payout(args),
        Command::Verify(args) => run_verify(args),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        eprintln!("nothing was kept; re-run the command to retry from scratch");
        std::process::exit(1);
    }
}

#[derive(Parser)]
#[command(name = "curation-fees")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Curator fee totals and payout files from indexed curation events")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch curations and warm the receipt cache.
    Fetch(FetchArgs),
    /// Compute per-curator fee summaries and print them as JSON.
    Compute(ComputeArgs),
    /// Write payout CSV, audit CSV, bundle and hash.
    Payout(PayoutArgs),
    /// Verify a bundle's reproducibility hash.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Start of range: YYYY-MM-DD, RFC3339 or epoch seconds.
    #[arg(long)]
    from: String,
    /// End of range (inclusive); a bare date covers the whole day.
    #[arg(long)]
    to: String,
    #[arg(long, env = "CURATION_INDEXER_URL")]
    indexer_url: Option<String>,
    #[arg(long, env = "CURATION_RPC_URL")]
    rpc_url: Option<String>,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    #[arg(long)]
    no_cache: bool,
    /// Extra curation event signature, e.g. "ItemCurated(address,address,uint256)".
    #[arg(long = "curation-event")]
    curation_events: Vec<String>,
}

#[derive(Args)]
struct FetchArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
struct ComputeArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Curator directory JSON; defaults to CURATOR_DIRECTORY_PATH or ./config/curators.json.
    #[arg(long)]
    curators: Option<PathBuf>,
}

#[derive(Args)]
struct PayoutArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long)]
    curators: Option<PathBuf>,
    #[arg(long, env = "PAYOUT_TOKEN_ADDRESS")]
    token_address: String,
    #[arg(long, default_value = "./reports")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long)]
    bundle: PathBuf,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn build_fetcher(args: &SourceArgs) -> CliResult<Fetcher> {
    let mut config = FetchConfig::default();
    if let Some(url) = &args.indexer_url {
        config.indexer_url = url.clone();
    }
    if let Some(url) = &args.rpc_url {
        config.rpc_url = url.clone();
    }
    let cache = if args.no_cache {
        None
    } else {
        Some(ReceiptCache::open(args.cache_dir.join("receipts.sqlite"))?)
    };
    Ok(Fetcher::new(config, cache)?)
}

fn pipeline_config(args: &SourceArgs) -> PipelineConfig {
    let mut resolver = ResolverConfig::default();
    resolver
        .curation_signatures
        .extend(args.curation_events.iter().cloned());
    PipelineConfig {
        resolver,
        ..Default::default()
    }
}

fn load_directory(path: Option<&Path>) -> CuratorDirectory {
    match path {
        Some(p) => CuratorDirectory::load_from_path(p),
        None => CuratorDirectory::load(),
    }
}

fn compute_report(source: &SourceArgs, curators: Option<&Path>) -> CliResult<FeeReport> {
    let window = TimeWindow::parse(&source.from, &source.to)?;
    let fetcher = build_fetcher(source)?;
    let directory = load_directory(curators);
    let config = pipeline_config(source);
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(compute_fee_summaries(
        &fetcher, &fetcher, &directory, window, &config,
    ))?;
    fetcher.log_totals();
    Ok(report)
}

fn run_fetch(args: FetchArgs) -> CliResult<()> {
    let window = TimeWindow::parse(&args.source.from, &args.source.to)?;
    let fetcher = build_fetcher(&args.source)?;
    let config = pipeline_config(&args.source);
    let rt = tokio::runtime::Runtime::new()?;
    let (records, stats) = rt.block_on(async {
        let records = fetch_all_curations(&fetcher, window, config.page_size).await?;
        let hashes = unique_tx_hashes(&records);
        let (_, stats) = resolve_item_ids(&fetcher, &hashes, &config.resolver).await;
        Ok::<_, curation_fees::FetchError>((records, stats))
    })?;
    info!(
        curations = records.len(),
        transactions = stats.total,
        failed = stats.failed,
        "fetch complete"
    );
    fetcher.log_totals();
    Ok(())
}

fn run_compute(args: ComputeArgs) -> CliResult<()> {
    let report = compute_report(&args.source, args.curators.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&report.summaries)?);
    Ok(())
}

fn day_stamp(ts: i64) -> CliResult<String> {
    let date = OffsetDateTime::from_unix_timestamp(ts)?.date();
    Ok(format!(
        "{:04}{:02}{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    ))
}

fn run_payout(args: PayoutArgs) -> CliResult<()> {
    let report = compute_report(&args.source, args.curators.as_deref())?;
    let payout = PayoutConfig {
        token_address: args.token_address.clone(),
    };
    let bundle = PayoutBundle::from_report(&report);
    let hash = reproducibility_hash(&bundle)?;

    std::fs::create_dir_all(&args.out_dir)?;
    let stem = format!(
        "curation-fees-{}-{}",
        day_stamp(report.window.from)?,
        day_stamp(report.window.to)?
    );
    let payout_path = args.out_dir.join(format!("{stem}.payout.csv"));
    let audit_path = args.out_dir.join(format!("{stem}.audit.csv"));
    let bundle_path = args.out_dir.join(format!("{stem}.bundle.json"));
    let hash_path = args.out_dir.join(format!("{stem}.sha256"));
    write_payout_csv(&report.summaries, &payout, &payout_path)?;
    write_audit_csv(&report.summaries, &audit_path)?;
    std::fs::write(&bundle_path, serde_json::to_string_pretty(&bundle)?)?;
    std::fs::write(&hash_path, format!("{}\n", hash))?;
    info!(
        curators = report.summaries.len(),
        ?payout_path,
        ?audit_path,
        ?bundle_path,
        ?hash_path,
        "payout complete"
    );
    println!("{}", hash);
    Ok(())
}

/// `<stem>.bundle.json` pairs with `<stem>.sha256`.
fn hash_path_for(bundle: &Path) -> PathBuf {
    let name = bundle
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let stem = match name.strip_suffix(".bundle.json") {
        Some(stem) => stem.to_string(),
        None => bundle
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned(),
    };
    bundle
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{stem}.sha256"))
}

fn run_verify(args: VerifyArgs) -> CliResult<()> {
    let bundle_json = std::fs::read_to_string(&args.bundle)?;
    let bundle: PayoutBundle = serde_json::from_str(&bundle_json)?;
    let expected = std::fs::read_to_string(hash_path_for(&args.bundle)).ok();
    let result = verify_bundle_hash(&bundle, expected.as_deref())?;
    if result.matches {
        println!("OK\t{}", result.bundle_hash);
    } else {
        eprintln!(
            "MISMATCH\tcomputed={}\texpected={:?}",
            result.bundle_hash, result.expected_hash
        );
        std::process::exit(1);
    }
    Ok(())
}
