//! svcforge CLI
//!
//! Main entry point for the `svcforge` command.

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::{Path, PathBuf};
use svcforge::config::{Format, GeneratorConfig, Mode};
use svcforge::{Diagnostics, Driver, SourceFile};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "svcforge")]
#[command(author = "Demetrios Chiuratto Agourakis, Dionisio Chiuratto Agourakis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile service specifications into persistence, handler and validation code", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: svcforge.toml next to the specification)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Diagnostic output format
    #[arg(long, global = true, value_enum)]
    format: Option<FormatArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the artifact tree for a specification
    Generate {
        /// Specification file
        #[arg(value_name = "SPEC")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Emission mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Render threads (0 = one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Parse, normalize and check a specification without generating
    Check {
        /// Specification file
        #[arg(value_name = "SPEC")]
        input: PathBuf,
    },

    /// Print the artifacts a specification would produce
    Plan {
        /// Specification file
        #[arg(value_name = "SPEC")]
        input: PathBuf,
    },

    /// Print an intermediate form
    Dump {
        /// Specification file
        #[arg(value_name = "SPEC")]
        input: PathBuf,

        #[arg(long, value_enum, default_value = "ir")]
        emit: EmitType,
    },

    /// Show information about the compiler
    Info,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitType {
    /// Raw declaration tree (JSON)
    Raw,
    /// Normalized IR
    Ir,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ModeArg {
    Full,
    Incremental,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum FormatArg {
    Human,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();

    match cli.command {
        Commands::Generate {
            input,
            output,
            mode,
            jobs,
        } => {
            let mut config = load_config(&input, cli.config.as_deref(), cli.format)?;
            if let Some(output) = output {
                config.output_dir = output;
            }
            if let Some(mode) = mode {
                config.mode = match mode {
                    ModeArg::Full => Mode::Full,
                    ModeArg::Incremental => Mode::Incremental,
                };
            }
            if let Some(jobs) = jobs {
                config.jobs = jobs;
            }
            generate(&input, config)
        }
        Commands::Check { input } => {
            let config = load_config(&input, cli.config.as_deref(), cli.format)?;
            check(&input, config)
        }
        Commands::Plan { input } => {
            let config = load_config(&input, cli.config.as_deref(), cli.format)?;
            plan(&input, config)
        }
        Commands::Dump { input, emit } => dump(&input, emit),
        Commands::Info => info(),
    }
}

fn load_config(
    spec: &Path,
    explicit: Option<&Path>,
    format: Option<FormatArg>,
) -> Result<GeneratorConfig> {
    let mut config = match GeneratorConfig::discover(spec, explicit) {
        Ok(config) => config,
        Err(e) => return Err(miette::Report::new(e)),
    };
    if let Some(format) = format {
        config.format = match format {
            FormatArg::Human => Format::Human,
            FormatArg::Json => Format::Json,
        };
    }
    Ok(config)
}

fn read_source(input: &Path) -> Result<SourceFile> {
    let content = std::fs::read_to_string(input)
        .map_err(|e| miette::miette!("Failed to read {}: {}", input.display(), e))?;
    Ok(SourceFile::new(input.to_string_lossy().to_string(), content))
}

/// Print a failed run's diagnostics and turn them into the exit error
fn report(diagnostics: Diagnostics, format: Format) -> miette::Report {
    match format {
        Format::Human => diagnostics.emit_all(),
        Format::Json => match diagnostics.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize diagnostics: {e}"),
        },
    }
    miette::miette!("{} errors found", diagnostics.error_count())
}

fn generate(input: &Path, config: GeneratorConfig) -> Result<()> {
    tracing::info!("Generating {:?} into {:?}", input, config.output_dir);
    let source = read_source(input)?;
    let format = config.format;
    let driver = Driver::new(config);

    match driver.generate(&source) {
        Ok(run) => {
            println!(
                "Generated {} artifacts for {} aggregates in {} ({} written, {} unchanged, {} removed)",
                run.artifacts,
                run.aggregates,
                driver.config().output_dir.display(),
                run.emit.written.len(),
                run.emit.unchanged.len(),
                run.emit.removed.len()
            );
            Ok(())
        }
        Err(diagnostics) => Err(report(diagnostics, format)),
    }
}

fn check(input: &Path, config: GeneratorConfig) -> Result<()> {
    tracing::info!("Checking {:?}", input);
    let source = read_source(input)?;
    let format = config.format;

    match Driver::new(config).analyze(&source) {
        Ok(ir) => {
            println!(
                "All checks passed: {} ({} services, {} aggregates)",
                input.display(),
                ir.services.len(),
                ir.aggregates().count()
            );
            Ok(())
        }
        Err(diagnostics) => Err(report(diagnostics, format)),
    }
}

fn plan(input: &Path, config: GeneratorConfig) -> Result<()> {
    let source = read_source(input)?;
    let format = config.format;

    let ir = match Driver::new(config).analyze(&source) {
        Ok(ir) => ir,
        Err(diagnostics) => return Err(report(diagnostics, format)),
    };
    let plan = svcforge::plan::plan(&ir);
    match format {
        Format::Human => {
            for artifact in plan.iter() {
                println!("{:<10} {}", artifact.kind.name(), artifact.path);
            }
        }
        Format::Json => {
            let json = serde_json::to_string_pretty(&plan)
                .map_err(|e| miette::miette!("Failed to serialize plan: {}", e))?;
            println!("{json}");
        }
    }
    Ok(())
}

fn dump(input: &Path, emit: EmitType) -> Result<()> {
    let source = read_source(input)?;
    let document = match svcforge::parse(&source) {
        Ok(document) => document,
        Err(diagnostics) => return Err(report(diagnostics, Format::Human)),
    };

    match emit {
        EmitType::Raw => {
            let json = serde_json::to_string_pretty(&document)
                .map_err(|e| miette::miette!("Failed to serialize raw tree: {}", e))?;
            println!("{json}");
        }
        EmitType::Ir => match svcforge::normalize::normalize(&document) {
            Ok(ir) => println!("{ir:#?}"),
            Err(errors) => return Err(report(errors.into(), Format::Human)),
        },
    }
    Ok(())
}

fn info() -> Result<()> {
    println!("svcforge specification compiler");
    println!("Version: {}", svcforge::VERSION);
    println!();
    println!("Artifacts per aggregate:");
    println!("  - model, validation");
    println!("  - queries, repository (persistence = postgres | sqlite)");
    println!("  - handler (presentation = http)");
    println!("  - mod.rs wiring");
    println!();
    println!("Emission modes: full (staged), incremental");
    Ok(())
}
