//! pce-verify - Drug identity resolution CLI
//!
//! - `verify`: resolve one package (recognized text + optional barcode) and
//!   print the resulting document as JSON
//! - `evaluate`: score a directory of prediction documents against labelled
//!   ground truth
//!
//! Configuration is read from TOML (CLI `--config` → `PCE_CONFIG` → platform
//! config dir → defaults). `RUST_LOG` overrides the configured log level.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pce_common::config::{load_or_default, ConfigFileResolver};
use pce_verify::types::Barcode;
use pce_verify::validators::evaluation::evaluate_batch;
use pce_verify::{build_orchestrator, DocumentPipeline, VerifierConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const APP_NAME: &str = "pce-verify";

#[derive(Debug, Parser)]
#[command(name = "pce-verify", version, about = "Resolve pharmaceutical package scans to a verified drug identity")]
struct Cli {
    /// Configuration file (overrides PCE_CONFIG and the platform default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve one package and print the document JSON
    Verify {
        /// Text recognized on the package
        #[arg(long, default_value = "")]
        text: String,

        /// Decoded barcode value
        #[arg(long)]
        barcode: Option<String>,

        /// Barcode symbology reported by the decoder
        #[arg(long, requires = "barcode")]
        symbology: Option<String>,
    },

    /// Score prediction documents against ground truth
    Evaluate {
        /// Directory of `<stem>_prediction.json` files
        #[arg(long)]
        predictions: PathBuf,

        /// Ground-truth JSON keyed by image name
        #[arg(long)]
        ground_truth: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = ConfigFileResolver::new(APP_NAME).resolve(cli.config.as_deref());
    let toml_config = load_or_default(config_path.as_deref())
        .context("Failed to load configuration file")?;

    pce_common::logging::init_logging(&toml_config.logging.level)
        .context("Failed to initialize logging")?;

    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: compiled defaults"),
    }

    match cli.command {
        Command::Verify {
            text,
            barcode,
            symbology,
        } => {
            let config = VerifierConfig::from_toml(&toml_config).context("Invalid configuration")?;
            let orchestrator =
                build_orchestrator(&config).context("Failed to initialize collaborators")?;
            let pipeline = DocumentPipeline::new(Arc::new(orchestrator));

            let cancel = CancellationToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling run");
                    ctrl_c_token.cancel();
                }
            });

            let barcode = barcode.map(|value| Barcode::new(value, symbology));
            let document = pipeline
                .process_cancellable(&text, barcode, &cancel)
                .await
                .context("Verification did not complete")?;

            println!("{}", serde_json::to_string_pretty(&document)?);
        }

        Command::Evaluate {
            predictions,
            ground_truth,
        } => {
            let report = evaluate_batch(&predictions, &ground_truth).with_context(|| {
                format!(
                    "Failed to evaluate {} against {}",
                    predictions.display(),
                    ground_truth.display()
                )
            })?;
            info!(
                samples = report.total_samples,
                average_cer = report.average_cer,
                average_entity_match_rate = report.average_entity_match_rate,
                "Evaluation complete"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
