//! Govault CLI
//!
//! ## Commands
//!
//! - `healthcheck`: probe configuration, governance registry, storage and ledger
//! - `digest` / `verify`: canonical hashing of JSON documents
//! - `receipt`, `manifest`: store and fetch governance records

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, Level};

use govault_canonical::{digest, verify_embedded};
use govault_core::{
    run_healthcheck, run_quick_healthcheck, validate_config, GovaultConfig, HealthcheckOptions,
};
use govault_store::{Receipt, RecordStore, ReleaseManifest, StorageManager, WriteReport};

#[derive(Parser)]
#[command(name = "govault")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Integrity-verified governance record vault", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, global = true, env = "GOVAULT_CONFIG", default_value = "govault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check configuration, governance registry, storage and ledger
    Healthcheck {
        /// Local checks only (no storage or ledger probes)
        #[arg(long)]
        quick: bool,

        /// Skip the ledger probe
        #[arg(long)]
        skip_chain: bool,

        /// Skip storage backend probes
        #[arg(long)]
        skip_storage: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the canonical digest of a JSON document
    Digest {
        /// JSON file
        file: PathBuf,

        /// Top-level field to leave out of the hash (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Re-hash a JSON document and compare with the digest it embeds
    Verify {
        /// JSON file
        file: PathBuf,

        /// Field holding the embedded digest
        #[arg(short, long)]
        field: String,
    },

    /// Governance receipts
    Receipt {
        #[command(subcommand)]
        action: ReceiptAction,
    },

    /// Release manifests
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Subcommand)]
enum ReceiptAction {
    /// Seal and store a receipt from a JSON file
    Put { file: PathBuf },
    /// Print a stored receipt
    Get { session: String, id: String },
    /// List receipt ids of a session
    List { session: String },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Seal and store a release manifest from a JSON file
    Put { file: PathBuf },
    /// Print a stored manifest
    Get { version: String },
    /// List stored manifest versions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    govault_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Healthcheck {
            quick,
            skip_chain,
            skip_storage,
            format,
        } => {
            let config = load_config(&cli.config)?;
            let options = HealthcheckOptions {
                skip_chain,
                skip_storage,
                probe_timeout: None,
            };
            cmd_healthcheck(&config, quick, &options, format).await
        }
        Commands::Digest { file, exclude } => cmd_digest(&file, &exclude),
        Commands::Verify { file, field } => cmd_verify(&file, &field),
        Commands::Receipt { action } => {
            let store = open_store(&cli.config)?;
            match action {
                ReceiptAction::Put { file } => cmd_receipt_put(&store, &file).await,
                ReceiptAction::Get { session, id } => cmd_receipt_get(&store, &session, &id).await,
                ReceiptAction::List { session } => cmd_receipt_list(&store, &session).await,
            }
        }
        Commands::Manifest { action } => {
            let store = open_store(&cli.config)?;
            match action {
                ManifestAction::Put { file } => cmd_manifest_put(&store, &file).await,
                ManifestAction::Get { version } => cmd_manifest_get(&store, &version).await,
                ManifestAction::List => cmd_manifest_list(&store).await,
            }
        }
    }
}

fn load_config(path: &Path) -> Result<GovaultConfig> {
    GovaultConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))
}

fn open_store(config_path: &Path) -> Result<RecordStore> {
    let config = load_config(config_path)?;
    let validation = validate_config(&config);
    if !validation.is_valid() {
        bail!("Invalid configuration: {}", validation);
    }
    let manager = StorageManager::from_config(&config.storage)
        .context("Failed to initialise storage backends")?;
    Ok(RecordStore::new(Arc::new(manager)))
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&raw).with_context(|| format!("{:?} is not valid JSON", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_replication(report: &WriteReport) {
    for failure in &report.backup_failures {
        eprintln!(
            "warning: backup '{}' not updated: {}",
            failure.backend, failure.error
        );
    }
}

async fn cmd_healthcheck(
    config: &GovaultConfig,
    quick: bool,
    options: &HealthcheckOptions,
    format: OutputFormat,
) -> Result<()> {
    let report = if quick {
        run_quick_healthcheck(config).await
    } else {
        run_healthcheck(config, options).await
    };

    match format {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => print_json(&report)?,
    }

    if !report.healthy {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_digest(file: &Path, exclude: &[String]) -> Result<()> {
    let value = read_json(file)?;
    let exclude: Vec<&str> = exclude.iter().map(String::as_str).collect();
    let hash = digest(&value, &exclude).context("Failed to canonicalize document")?;
    println!("{}", hash);
    Ok(())
}

fn cmd_verify(file: &Path, field: &str) -> Result<()> {
    let value = read_json(file)?;
    let verification = verify_embedded(&value, field).context("Failed to canonicalize document")?;

    println!(
        "stored:   {}",
        verification.stored.as_deref().unwrap_or("<missing>")
    );
    println!("computed: {}", verification.computed);
    if !verification.matches {
        eprintln!("hash mismatch in field '{}'", field);
        std::process::exit(1);
    }
    println!("OK");
    Ok(())
}

async fn cmd_receipt_put(store: &RecordStore, file: &Path) -> Result<()> {
    let receipt: Receipt = serde_json::from_value(read_json(file)?)
        .with_context(|| format!("{:?} is not a receipt", file))?;
    let stored = store.store_receipt(receipt).await?;
    report_replication(&stored.report);

    info!(path = %stored.report.path, "receipt stored");
    println!("Stored {}", stored.report.path);
    if let Some(hash) = &stored.record.receipt_hash {
        println!("receipt_hash: {}", hash);
    }
    Ok(())
}

async fn cmd_receipt_get(store: &RecordStore, session: &str, id: &str) -> Result<()> {
    let receipt = store
        .load_stored_receipt(session, id)
        .await
        .with_context(|| format!("Failed to load receipt {}/{}", session, id))?;
    print_json(&receipt)
}

async fn cmd_receipt_list(store: &RecordStore, session: &str) -> Result<()> {
    let ids = store.list_receipts(session).await?;
    if ids.is_empty() {
        println!("No receipts for session '{}'", session);
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

async fn cmd_manifest_put(store: &RecordStore, file: &Path) -> Result<()> {
    let manifest: ReleaseManifest = serde_json::from_value(read_json(file)?)
        .with_context(|| format!("{:?} is not a release manifest", file))?;
    let stored = store.store_manifest(manifest).await?;
    report_replication(&stored.report);

    println!("Stored {}", stored.report.path);
    if let Some(hash) = &stored.record.manifest_hash {
        println!("manifest_hash: {}", hash);
    }
    Ok(())
}

async fn cmd_manifest_get(store: &RecordStore, version: &str) -> Result<()> {
    let manifest = store
        .load_manifest(version)
        .await
        .with_context(|| format!("Failed to load manifest {}", version))?;
    print_json(&manifest)
}

async fn cmd_manifest_list(store: &RecordStore) -> Result<()> {
    for version in store.list_manifest_versions().await? {
        println!("{}", version);
    }
    Ok(())
}
