//! Schema Evolution CLI
//!
//! Checks compatibility between schema files and inspects container files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schema_evolution::compatibility::schema_diff;
use schema_evolution::{CompatibilityChecker, CompatibilityLevel, ContainerReader, Schema};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "schema-evolution")]
#[command(about = "Check schema compatibility and inspect record containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a candidate schema may replace an existing one
    Check {
        /// Schema currently in use
        #[arg(short, long)]
        existing: PathBuf,
        /// Proposed new schema
        #[arg(short, long)]
        candidate: PathBuf,
        /// Compatibility level to enforce
        #[arg(short, long, default_value = "BACKWARD")]
        level: CompatibilityLevel,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build every *.avsc file under a directory
    Validate {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Print a schema's fingerprint
    Fingerprint { file: PathBuf },

    /// Line diff of two schemas' canonical JSON
    Diff { old: PathBuf, new: PathBuf },

    /// Print the records of a container file as JSON lines
    Dump {
        container: PathBuf,
        /// Read records with this schema instead of the writer schema
        #[arg(short, long)]
        reader: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load(path: &Path) -> Result<Schema> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Schema::parse_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Returns whether the command succeeded
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Check {
            existing,
            candidate,
            level,
            json,
        } => {
            let existing = load(&existing)?;
            let candidate = load(&candidate)?;
            let result = CompatibilityChecker::new(level).check_pair(&existing, &candidate);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                if result.is_compatible {
                    println!("✅ Compatible ({}): {}", level, result.summary);
                } else {
                    println!("❌ Incompatible ({}): {}", level, result.summary);
                }
                for change in &result.changes {
                    let marker = if change.is_breaking { "✗" } else { "·" };
                    println!("   {} {}", marker, change.description);
                }
            }
            Ok(result.is_compatible)
        }

        Commands::Validate { dir } => {
            let mut checked = 0;
            let mut failed = 0;
            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() || path.extension().map_or(true, |ext| ext != "avsc") {
                    continue;
                }
                checked += 1;
                match load(path) {
                    Ok(schema) => println!("  ✅ {} ({})", path.display(), schema.name()),
                    Err(e) => {
                        failed += 1;
                        println!("  ❌ {}: {:#}", path.display(), e);
                    }
                }
            }
            println!("{} schemas checked, {} invalid", checked, failed);
            Ok(failed == 0)
        }

        Commands::Fingerprint { file } => {
            println!("{}", load(&file)?.fingerprint());
            Ok(true)
        }

        Commands::Diff { old, new } => {
            print!("{}", schema_diff(&load(&old)?, &load(&new)?));
            Ok(true)
        }

        Commands::Dump { container, reader } => {
            let file = fs::File::open(&container).with_context(|| format!("opening {}", container.display()))?;
            let mut records = ContainerReader::new(std::io::BufReader::new(file))?;
            if let Some(path) = reader {
                records = records.with_reader_schema(load(&path)?);
            }
            for record in records {
                println!("{}", record?.to_json());
            }
            Ok(true)
        }
    }
}
