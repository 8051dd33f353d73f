//! # caster
//!
//! Command-line front end for caster generation.
//!
//! Loads a type graph snapshot and a mapping document, resolves the plan,
//! and writes Go caster files. Exit status is 0 when output was produced
//! (warnings allowed), 1 when any error was reported or nothing usable was
//! produced, and 2 when inputs could not be read or parsed.

mod config;
mod report;

use anyhow::Context;
use caster_emit::{CommandCanonicalizer, Emitter, GeneratedFile, MissingTransforms};
use caster_plan::{Diagnostics, RunStatus, load_inputs, plan};
use clap::{Args, Parser, Subcommand};
use config::{FileConfig, FlagConfig, Settings};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caster")]
#[command(about = "Generate Go caster functions from a mapping document")]
#[command(version)]
struct Cli {
    /// Path to a YAML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more and show informational diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Inputs {
    /// Type graph snapshot (JSON or YAML)
    #[arg(short, long)]
    types: PathBuf,

    /// Mapping document
    #[arg(short, long)]
    mapping: PathBuf,

    /// Write diagnostics as CSV
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the mapping and write caster files
    Generate {
        #[command(flatten)]
        inputs: Inputs,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Package clause of generated files
        #[arg(long)]
        package: Option<String>,

        /// Import path of the output package
        #[arg(long)]
        package_path: Option<String>,

        /// Put each missing-transform stub in the first file referencing it
        #[arg(long)]
        per_pair_stubs: bool,

        /// Compile pairs on this many threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Format output with gofmt
        #[arg(long)]
        gofmt: bool,
    },

    /// Print the resolved plan as YAML
    Plan {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Resolve the mapping and report diagnostics only
    Check {
        #[command(flatten)]
        inputs: Inputs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path).await?,
        None => FileConfig::default(),
    };

    match cli.command {
        Commands::Generate {
            inputs,
            out,
            package,
            package_path,
            per_pair_stubs,
            jobs,
            gofmt,
        } => {
            let flags = FlagConfig {
                package_name: package,
                package_path,
                missing_transforms: per_pair_stubs.then_some(MissingTransforms::PerPair),
                jobs,
                gofmt,
            };
            let settings = Settings::resolve(file_config, flags);
            generate(&inputs, &out, &settings, cli.verbose).await
        }
        Commands::Plan { inputs } => print_plan(&inputs, cli.verbose),
        Commands::Check { inputs } => check(&inputs, cli.verbose),
    }
}

async fn generate(
    inputs: &Inputs,
    out: &Path,
    settings: &Settings,
    verbose: bool,
) -> anyhow::Result<ExitCode> {
    let (graph, mapping) = load_inputs(&inputs.types, &inputs.mapping)?;
    let (resolved, mut diagnostics) = plan(&graph, &mapping);

    let mut emitter = Emitter::new(settings.emit.clone());
    if settings.gofmt {
        emitter = emitter.with_canonicalizer(CommandCanonicalizer::gofmt());
    }
    let (files, emit_diagnostics) = emitter.emit_parallel(&resolved, settings.jobs);
    diagnostics.extend(emit_diagnostics);

    write_files(out, &files).await?;
    info!("Wrote {} file(s) to {}", files.len(), out.display());

    finish(inputs, &diagnostics, !files.is_empty(), verbose)
}

fn print_plan(inputs: &Inputs, verbose: bool) -> anyhow::Result<ExitCode> {
    let (graph, mapping) = load_inputs(&inputs.types, &inputs.mapping)?;
    let (resolved, diagnostics) = plan(&graph, &mapping);
    // serde_yaml cannot tag nested enums; go through a JSON tree
    let tree = serde_json::to_value(&resolved).context("serializing plan")?;
    let yaml = serde_yaml::to_string(&tree).context("serializing plan")?;
    print!("{yaml}");
    finish(inputs, &diagnostics, !resolved.is_empty(), verbose)
}

fn check(inputs: &Inputs, verbose: bool) -> anyhow::Result<ExitCode> {
    let (graph, mapping) = load_inputs(&inputs.types, &inputs.mapping)?;
    let (resolved, diagnostics) = plan(&graph, &mapping);
    println!(
        "{} pair(s): {}",
        resolved.pairs.len(),
        report::summary(&diagnostics)
    );
    finish(inputs, &diagnostics, !resolved.is_empty(), verbose)
}

/// Report diagnostics and map the run to an exit status
fn finish(
    inputs: &Inputs,
    diagnostics: &Diagnostics,
    produced_output: bool,
    verbose: bool,
) -> anyhow::Result<ExitCode> {
    report::print(diagnostics, verbose);
    if let Some(path) = &inputs.report {
        report::write_csv(path, diagnostics)?;
    }

    let status = diagnostics.status(produced_output);
    debug!("Run finished: {:?}, {}", status, report::summary(diagnostics));
    Ok(match status {
        RunStatus::NoOutput => ExitCode::from(1),
        _ if diagnostics.has_errors() => ExitCode::from(1),
        RunStatus::Clean | RunStatus::WithWarnings => ExitCode::SUCCESS,
    })
}

async fn write_files(out: &Path, files: &[GeneratedFile]) -> anyhow::Result<()> {
    for file in files {
        let path = out.join(&file.path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, &file.contents)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!("Wrote {}", path.display());
    }
    Ok(())
}
