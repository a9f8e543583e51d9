//! module-assembly: dry-run modular contract assembly
//!
//! Runs a manifest against the in-memory adapters and prints either the
//! fingerprint table or the coverage report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use module_assembly::config::{AssemblyManifest, LoggingConfig};
use module_assembly::prelude::*;
use module_assembly::telemetry::init_logging;

/// module-assembly: modular contract assembly and coverage verification
#[derive(Parser, Debug)]
#[command(name = "module-assembly", version)]
#[command(about = "Assemble modular contracts and verify interface coverage")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the fingerprint of every required function
    Index {
        /// Path to the JSON manifest
        manifest: PathBuf,
    },

    /// Assemble the composite and print its coverage report as JSON
    Assemble {
        /// Path to the JSON manifest
        manifest: PathBuf,

        /// Skip attaching the composite to the manifest's controller
        #[arg(long)]
        no_attach: bool,
    },
}

#[derive(Serialize)]
struct AssembleOutput {
    run_id: String,
    composite: Address,
    initializer: DeployedModule,
    report: CoverageReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    controller: Option<ControllerOutput>,
}

#[derive(Serialize)]
struct ControllerOutput {
    address: Address,
    deferred: bool,
    executed_at: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&LoggingConfig::from_env()).context("failed to initialize logging")?;

    match args.command {
        Command::Index { manifest } => index(&load(&manifest)?),
        Command::Assemble {
            manifest,
            no_attach,
        } => assemble(&load(&manifest)?, !no_attach).await,
    }
}

fn load(path: &Path) -> Result<AssemblyManifest> {
    AssemblyManifest::load(path).with_context(|| format!("loading {}", path.display()))
}

fn index(manifest: &AssemblyManifest) -> Result<()> {
    let index = index_descriptors(&manifest.descriptors, manifest.config.duplicate_policy)
        .context("indexing descriptors")?;
    for (fp, function) in index.iter() {
        println!("{fp}  {}", function.qualified_name());
    }
    Ok(())
}

async fn assemble(manifest: &AssemblyManifest, attach: bool) -> Result<()> {
    let registry = Arc::new(manifest.registry());
    let ledger = Arc::new(InMemoryCompositeLedger::new(manifest.config.deployer));
    let builder = AssemblyBuilder::new(registry, ledger)
        .with_duplicate_policy(manifest.config.duplicate_policy);

    let (assembly, report) = builder
        .build_and_verify(&manifest.descriptors, &manifest.plan())
        .await
        .context("assembly failed")?;

    let controller = match manifest.controller_config() {
        Some(config) if attach => {
            let clock = Arc::new(SimulatedClock::starting_at(manifest.config.genesis_time));
            let executor = config.executor;
            let controller = Arc::new(InMemoryController::new(config, Arc::clone(&clock)));
            let timelock = TimelockSimulator::new(clock, Arc::clone(&controller), executor);

            let resolution = builder
                .attach_to_controller(&assembly, controller.as_ref(), &timelock)
                .await
                .context("attaching composite to controller")?;
            let executed_at = match resolution {
                Resolution::Executed { executed_at, .. } => Some(executed_at),
                Resolution::Immediate(_) => None,
            };
            Some(ControllerOutput {
                address: controller.address(),
                deferred: executed_at.is_some(),
                executed_at,
            })
        }
        _ => None,
    };

    info!(run_id = %assembly.run_id, composite = ?assembly.composite, "assembly complete");
    let output = AssembleOutput {
        run_id: assembly.run_id.to_string(),
        composite: assembly.composite,
        initializer: assembly.initializer,
        report,
        controller,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
