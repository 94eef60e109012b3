use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bibrecon::{MissingSourcePolicy, Pipeline, PipelineConfig, isbn};

#[derive(Parser)]
#[command(
    name = "bibrecon",
    about = "Link book catalog rows to metadata-API rows and build a canonical book table",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconciliation pipeline.
    Run {
        /// TOML configuration file. Flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Catalog extract (JSON).
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Metadata extract (CSV).
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Directory for the detail and canonical tables.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Directory for the quality report and schema reference.
        #[arg(long)]
        docs: Option<PathBuf>,
        /// Continue with an empty table when a source is missing or malformed.
        #[arg(long)]
        treat_missing_as_empty: bool,
        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Normalize and validate ISBNs.
    CheckIsbn {
        #[arg(required = true)]
        isbns: Vec<String>,
    },
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            catalog,
            metadata,
            out,
            docs,
            treat_missing_as_empty,
            json,
        } => {
            let mut pipeline_config = match config {
                Some(path) => match PipelineConfig::load(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("error: {e}");
                        return ExitCode::FAILURE;
                    }
                },
                None => PipelineConfig::default(),
            };

            if let Some(path) = catalog {
                pipeline_config = pipeline_config.with_catalog_path(path);
            }
            if let Some(path) = metadata {
                pipeline_config = pipeline_config.with_metadata_path(path);
            }
            if let Some(path) = out {
                pipeline_config = pipeline_config.with_output_dir(path);
            }
            if let Some(path) = docs {
                pipeline_config = pipeline_config.with_docs_dir(path);
            }
            if treat_missing_as_empty {
                pipeline_config =
                    pipeline_config.with_missing_source_policy(MissingSourcePolicy::TreatAsEmpty);
            }

            match Pipeline::new(pipeline_config).run() {
                Ok(report) => {
                    if json {
                        match serde_json::to_string_pretty(&report) {
                            Ok(text) => println!("{text}"),
                            Err(e) => {
                                eprintln!("error: {e}");
                                return ExitCode::FAILURE;
                            }
                        }
                    } else {
                        println!(
                            "run {}: {} catalog rows, {} metadata rows, {} detail rows, {} books",
                            report.run_id,
                            report.catalog_rows,
                            report.metadata_rows,
                            report.detail_rows,
                            report.canonical_rows
                        );
                        for path in &report.outputs {
                            println!("  wrote {}", path.display());
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }

        Commands::CheckIsbn { isbns } => {
            let mut all_valid = true;
            for raw in &isbns {
                let normalized = isbn::normalize(raw);
                let valid = match normalized.as_deref().map(str::len) {
                    Some(13) => isbn::is_valid_isbn13(raw),
                    Some(10) => isbn::is_valid_isbn10(raw),
                    _ => false,
                };
                all_valid &= valid;
                println!(
                    "{raw}\t{}\t{}",
                    normalized.as_deref().unwrap_or("-"),
                    if valid { "valid" } else { "invalid" }
                );
            }
            if all_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
