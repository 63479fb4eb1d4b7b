//! TMT CodeSystem CLI
//!
//! Converts a TMT release (`TMTRF<version>.zip`) into a FHIR CodeSystem:
//! - `build`: extract, assemble, dedupe, validate, write (default)
//! - `locate`: show which file every kind would read
//! - `validate`: re-check parent/child references of an existing document

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tmt_cli::config::{AppConfig, DEFAULT_CONFIG_FILE};
use tmt_cli::{logging, run_build, run_locate, run_validate};
use tmt_ingest::SpreadsheetReader;

#[derive(Parser)]
#[command(name = "tmt-codesystem")]
#[command(author, about = "Convert a TMT release into a FHIR CodeSystem")]
struct Cli {
    /// Configuration file (missing or invalid → defaults)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the CodeSystem for a release.
    Build(BuildArgs),

    /// Resolve the source files of every entity kind without building.
    Locate {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Validate parent/child references of an existing CodeSystem document.
    Validate {
        /// CodeSystem JSON produced by `build`
        document: PathBuf,
        /// Only report; do not remove dangling references
        #[arg(long)]
        no_cleanup: bool,
        /// Do not write a validation report
        #[arg(long)]
        no_report: bool,
    },
}

#[derive(Args, Default)]
struct SourceArgs {
    /// Release version `YYYYMMDD` (overrides config `version`)
    #[arg(long)]
    release: Option<String>,
    /// Directory holding `TMTRF<version>.zip`
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Use an already extracted release instead of unzipping the archive
    #[arg(long)]
    extracted_dir: Option<PathBuf>,
}

#[derive(Args, Default)]
struct BuildArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// CodeSystem template JSON
    #[arg(long)]
    template: Option<PathBuf>,
    /// Output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Output file name (`{version}` is interpolated)
    #[arg(long)]
    output_file: Option<String>,
    /// Keep dangling parent/child references
    #[arg(long)]
    no_cleanup: bool,
    /// Do not write a validation report
    #[arg(long)]
    no_report: bool,
}

fn apply_source_overrides(config: &mut AppConfig, source: &SourceArgs) {
    if let Some(release) = &source.release {
        config.version = release.clone();
    }
    if let Some(dir) = &source.input_dir {
        config.input.directory = dir.clone();
    }
}

fn apply_build_overrides(config: &mut AppConfig, args: &BuildArgs) {
    apply_source_overrides(config, &args.source);
    if let Some(template) = &args.template {
        config.input.template = template.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(name) = &args.output_file {
        config.output.file_name = name.clone();
    }
    if args.no_cleanup {
        config.validation.cleanup_invalid_references = false;
    }
    if args.no_report {
        config.validation.generate_report = false;
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    // `run` has returned, so the extraction directory is already gone.
    if let Err(err) = run(cli) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load_or_default(&cli.config);

    match cli.command.unwrap_or(Commands::Build(BuildArgs::default())) {
        Commands::Build(args) => {
            apply_build_overrides(&mut config, &args);
            cmd_build(&config, args.source.extracted_dir.as_ref())
        }
        Commands::Locate { source } => {
            apply_source_overrides(&mut config, &source);
            cmd_locate(&config, source.extracted_dir.as_ref())
        }
        Commands::Validate {
            document,
            no_cleanup,
            no_report,
        } => {
            if no_cleanup {
                config.validation.cleanup_invalid_references = false;
            }
            if no_report {
                config.validation.generate_report = false;
            }
            cmd_validate(&config, &document)
        }
    }
}

fn cmd_build(config: &AppConfig, extracted_dir: Option<&PathBuf>) -> Result<()> {
    println!(
        "{} TMT release {}",
        "Building".green().bold(),
        config.version
    );

    let outcome = run_build(config, &SpreadsheetReader, extracted_dir.map(PathBuf::as_path))?;

    for s in &outcome.summaries {
        println!(
            "  {} {:<4} {} concepts ({} parents, {} children)",
            "→".cyan(),
            s.kind.as_str(),
            s.concepts_emitted,
            s.parents_added,
            s.children_added
        );
    }
    if outcome.duplicates_removed > 0 {
        println!(
            "  {} {} duplicate concepts removed",
            "→".yellow(),
            outcome.duplicates_removed
        );
    }
    print_validation(&outcome.validation);
    if let Some(report) = &outcome.report_path {
        println!("  {} report {}", "→".cyan(), report.display());
    }
    println!(
        "  {} {} ({} concepts)",
        "→".cyan(),
        outcome.output_path.display(),
        outcome.concept_count
    );
    Ok(())
}

fn cmd_locate(config: &AppConfig, extracted_dir: Option<&PathBuf>) -> Result<()> {
    println!(
        "{} source files for TMT release {}",
        "Locating".green().bold(),
        config.version
    );

    let entries = run_locate(config, extracted_dir.map(PathBuf::as_path))?;
    let mut failed = 0usize;
    for entry in &entries {
        match &entry.files {
            Ok(files) => {
                println!("  {} {}", "✓".green(), entry.kind);
                for (role, name) in files {
                    println!("      {role:<24} {name}");
                }
            }
            Err(message) => {
                failed += 1;
                println!("  {} {}", "✗".red(), message);
            }
        }
    }
    if failed > 0 {
        return Err(anyhow!("{failed} entity kind(s) have missing source files"));
    }
    Ok(())
}

fn cmd_validate(config: &AppConfig, document: &PathBuf) -> Result<()> {
    println!("{} {}", "Validating".green().bold(), document.display());
    let (outcome, report) = run_validate(config, document)?;
    print_validation(&outcome);
    if let Some(report) = report {
        println!("  {} report {}", "→".cyan(), report.display());
    }
    Ok(())
}

fn print_validation(outcome: &tmt_codesystem::ValidationOutcome) {
    let stats = &outcome.stats;
    if outcome.valid {
        println!(
            "  {} all references resolve ({} concepts)",
            "✓".green(),
            stats.total_concepts
        );
    } else {
        println!(
            "  {} {} invalid parent, {} invalid child references ({} removed)",
            "!".yellow().bold(),
            stats.invalid_parent_count,
            stats.invalid_child_count,
            stats.removed_count
        );
    }
}
