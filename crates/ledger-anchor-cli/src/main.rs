//! Ledger Anchor CLI
//!
//! ```bash
//! # Create a signing key
//! ledger-anchor keygen --out signer.key
//!
//! # Sign batches from an ERP export
//! ledger-anchor --config anchor.toml commit --input entries.csv --output batches.json
//!
//! # Check them independently
//! ledger-anchor verify --input batches.json --public-key <hex>
//!
//! # Load entries into a store and dry-run anchoring of what is pending
//! ledger-anchor import --db ledger.db --input entries.json
//! ledger-anchor anchor --db ledger.db --key signer.key
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledger_anchor::{
    load_entries, prepare_entries, verify_signed_batch, Anchor, AnchorConfig, AnchorError,
    MemoryChainWriter, PublicKey, RejectPolicy, Rejection, SignedBatch,
};
use ledger_anchor_core::{chunk, merkle_root, Keypair};
use ledger_anchor_signer::write_hex_seed;
use ledger_anchor_store::{EntryStore, SqliteStore};

/// Ledger Anchor - tamper-evident anchoring of ledger entries
#[derive(Parser)]
#[command(name = "ledger-anchor")]
#[command(version, about = "Validate, hash, batch, sign and anchor ledger entries", long_about = None)]
struct Cli {
    /// Configuration file (TOML). `LEDGER_ANCHOR__*` variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a signing key and print its public key
    Keygen {
        /// Where to write the hex-encoded seed
        #[arg(short, long)]
        out: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Print the Merkle root of each batch, without signing
    Root {
        /// Entries file (JSON array or CSV)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Validate, batch and sign entries; write the signed batches as JSON
    Commit {
        /// Entries file (JSON array or CSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Signing key, overriding `key_path` from the configuration
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Verify a signed batches file
    Verify {
        /// Signed batches JSON, as written by `commit`
        #[arg(short, long)]
        input: PathBuf,

        /// Require this signer (hex)
        #[arg(long)]
        public_key: Option<String>,
    },

    /// Load entries into an SQLite store
    Import {
        /// Database file, created if missing
        #[arg(long)]
        db: PathBuf,

        /// Entries file (JSON array or CSV)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Dry-run anchoring of a store's pending entries with the in-memory
    /// chain writer. Nothing is written to the anchor log.
    Anchor {
        /// Database file
        #[arg(long)]
        db: PathBuf,

        /// Signing key, overriding `key_path` from the configuration
        #[arg(short, long)]
        key: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Keygen { out, force } => keygen(&out, force),
        Commands::Root { input } => root(config_path, &input),
        Commands::Commit { input, output, key } => commit(config_path, &input, output, key),
        Commands::Verify { input, public_key } => verify(&input, public_key.as_deref()),
        Commands::Import { db, input } => import(&db, &input).await,
        Commands::Anchor { db, key } => anchor(config_path, &db, key).await,
    }
}

fn load_config(path: Option<&Path>, key: Option<PathBuf>) -> Result<AnchorConfig> {
    let mut config = AnchorConfig::load(path).context("Failed to load configuration")?;
    if key.is_some() {
        config.key_path = key;
    }
    Ok(config)
}

fn report_rejections(rejections: &[Rejection]) {
    for r in rejections {
        eprintln!("rejected entry #{} ({:?}): {}", r.position, r.entry_id, r.reason);
    }
}

fn keygen(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", out.display());
    }

    let keypair = Keypair::generate();
    write_hex_seed(out, &keypair)
        .with_context(|| format!("Failed to write key file: {}", out.display()))?;

    eprintln!("Key written to: {}", out.display());
    println!("{}", keypair.public_key().to_hex());
    Ok(())
}

fn root(config_path: Option<&Path>, input: &Path) -> Result<()> {
    let config = load_config(config_path, None)?;
    let entries = load_entries(input)?;

    let prepared = prepare_entries(&entries, config.limits.as_ref());
    report_rejections(&prepared.rejections);
    if config.reject_policy == RejectPolicy::FailRun && !prepared.rejections.is_empty() {
        bail!("{} entries rejected", prepared.rejections.len());
    }

    for (index, batch) in chunk(&prepared.entries, config.max_batch_size)?
        .iter()
        .enumerate()
    {
        let root = merkle_root(batch, config.digest)
            .ok_or_else(|| anyhow!("batch {} has no entries", index))?;
        println!("{}\t{}\t{}", index, batch.len(), root);
    }
    Ok(())
}

fn commit(
    config_path: Option<&Path>,
    input: &Path,
    output: Option<PathBuf>,
    key: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path, key)?;
    let anchor = Anchor::from_config(config).context("Failed to set up signer")?;
    let entries = load_entries(input)?;

    let commit = match anchor.commit(&entries) {
        Ok(commit) => commit,
        Err(AnchorError::Rejected(rejections)) => {
            report_rejections(&rejections);
            bail!("{} entries rejected; nothing was signed", rejections.len());
        }
        Err(e) => return Err(e.into()),
    };
    report_rejections(&commit.rejections);

    let json = serde_json::to_string_pretty(&commit.batches)?;
    match output {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            eprintln!("Signed batches written to: {}", path.display());
        }
        None => println!("{}", json),
    }

    info!(
        batches = commit.batches.len(),
        rejected = commit.rejections.len(),
        public_key = %anchor.public_key(),
        "commit complete"
    );
    Ok(())
}

fn verify(input: &Path, public_key: Option<&str>) -> Result<()> {
    let contents = fs::read_to_string(input)
        .with_context(|| format!("Failed to read batches file: {}", input.display()))?;
    let batches: Vec<SignedBatch> =
        serde_json::from_str(&contents).context("Failed to parse signed batches JSON")?;

    let expected = public_key
        .map(PublicKey::from_hex)
        .transpose()
        .context("Invalid public key hex")?;

    let mut failed = 0;
    for batch in &batches {
        let result = match expected {
            Some(key) if key != batch.public_key => {
                Err(anyhow!("signed by {}, expected {}", batch.public_key, key))
            }
            _ => verify_signed_batch(batch).map_err(anyhow::Error::from),
        };
        match result {
            Ok(()) => println!("batch {}: ok {}", batch.index, batch.root),
            Err(e) => {
                failed += 1;
                println!("batch {}: FAILED {}", batch.index, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} batches failed verification", failed, batches.len());
    }
    Ok(())
}

async fn import(db: &Path, input: &Path) -> Result<()> {
    let store = SqliteStore::open(db)
        .with_context(|| format!("Failed to open database: {}", db.display()))?;
    let entries = load_entries(input)?;

    let summary = store.insert_entries(&entries).await?;
    println!(
        "imported {} entries ({} already present), {} in store",
        summary.inserted,
        summary.already_present,
        store.count().await?
    );
    Ok(())
}

async fn anchor(config_path: Option<&Path>, db: &Path, key: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path, key)?;
    let writer = match config.limits {
        Some(limits) => MemoryChainWriter::with_limits(limits),
        None => MemoryChainWriter::new(),
    };
    let anchor = Anchor::from_config(config).context("Failed to set up signer")?;
    let store = SqliteStore::open(db)
        .with_context(|| format!("Failed to open database: {}", db.display()))?;

    let report = match anchor.dry_run_store(&store, &writer).await {
        Ok(report) => report,
        Err(AnchorError::Rejected(rejections)) => {
            report_rejections(&rejections);
            bail!("{} entries rejected; nothing was anchored", rejections.len());
        }
        Err(e) => return Err(e.into()),
    };
    report_rejections(&report.rejections);

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(token) => println!("batch {}: {} {}", outcome.index, outcome.root, token),
            Err(e) => println!("batch {}: FAILED {}", outcome.index, e),
        }
    }
    println!(
        "{} pending, {} of {} batches accepted (dry run, nothing recorded)",
        report.entries_pending,
        report.outcomes.iter().filter(|o| o.is_ok()).count(),
        report.outcomes.len()
    );

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{} batches failed to submit", failed);
    }
    Ok(())
}
