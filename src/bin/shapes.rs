//! Schema algebra CLI
//!
//! Compares, merges, reduces and re-encodes versioned schema files.
//!
//! Usage:
//!   shapes diff old.json new.json
//!   shapes check old.json new.json --strict
//!   shapes convert schema.json --to v3
//!   shapes history ./schemas
//!   shapes --help

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use shape_schemas::config::{OutputFormat, ShapesConfig};
use shape_schemas::{
    breaking_changes, change_version, diff, is_read_compatible, merge, reduce, serialize,
    unserialize, Checksum, CompatibilityChecker, Schema, Versioned, WireVersion,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "shapes")]
#[command(about = "Compare, merge and convert versioned schemas")]
struct Cli {
    /// Configuration file layered over shapes.toml and SHAPES__* variables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format, overriding the configured one
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List structural changes from OLD to NEW
    Diff {
        old: PathBuf,
        new: PathBuf,
        /// Print the changes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that values written under OLD can be read under NEW
    Check {
        old: PathBuf,
        new: PathBuf,
        /// Strict mode - any change is breaking
        #[arg(long)]
        strict: bool,
    },

    /// Print the least upper bound of two schemas
    Merge {
        left: PathBuf,
        right: PathBuf,
        /// Wire version to write (default from config)
        #[arg(long)]
        to: Option<WireVersion>,
    },

    /// Print a schema with identical records and variants shared
    Reduce {
        schema: PathBuf,
        #[arg(long)]
        to: Option<WireVersion>,
    },

    /// Re-encode a schema file in another wire version
    Convert {
        schema: PathBuf,
        #[arg(long)]
        to: Option<WireVersion>,
    },

    /// Print the structural fingerprint of a schema
    Fingerprint {
        schema: PathBuf,
        /// Fail unless the fingerprint equals this checksum
        #[arg(long)]
        expect: Option<String>,
    },

    /// Check every consecutive pair of schema files in a directory
    History {
        dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Read a versioned schema file
fn read_versioned(path: &Path) -> anyhow::Result<Versioned> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Versioned::from_json(&content)
        .map_err(|e| anyhow!("Failed to parse schema in {}: {}", path.display(), e))
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let versioned = read_versioned(path)?;
    debug!(path = %path.display(), version = %versioned.version(), "loaded schema");
    Ok(unserialize(&versioned))
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = ShapesConfig::load_from(cli.config.as_deref())?;
    if let Some(format) = cli.format {
        config.encoding.output_format = format;
    }
    let output_format = config.encoding.output_format;
    let emit = |schema: &Schema, to: Option<WireVersion>| -> anyhow::Result<i32> {
        let encoded = serialize(schema, to.unwrap_or(config.encoding.target_version))?;
        println!("{}", output_format.render(&encoded)?);
        Ok(0)
    };

    match cli.command {
        Commands::Diff { old, new, json } => {
            let changes = diff(&load_schema(&old)?, &load_schema(&new)?)?;
            if json {
                println!("{}", output_format.render(&changes)?);
            } else if changes.is_empty() {
                println!("✅ No changes");
            } else {
                for change in &changes {
                    let marker = if change.atom.is_safe_addition() { "+" } else { "!" };
                    println!("  {} {}", marker, change);
                }
            }
            let breaking = breaking_changes(&changes).len();
            Ok(if breaking > 0 && config.compatibility.fail_on_breaking { 2 } else { 0 })
        }

        Commands::Check { old, new, strict } => {
            let mut checker = CompatibilityChecker::new();
            if strict || config.compatibility.strict {
                checker = checker.strict();
            }
            let result = checker.check(&load_schema(&old)?, &load_schema(&new)?)?;
            println!("🔍 {} -> {}: {}", old.display(), new.display(), result.summary);
            for change in &result.changes {
                let marker = if change.is_breaking { "❌" } else { "✅" };
                println!("  {} {}: {}", marker, change.path, change.description);
            }
            if result.is_breaking && config.compatibility.fail_on_breaking {
                eprintln!("\n❌ BREAKING CHANGES DETECTED");
                return Ok(2);
            }
            Ok(0)
        }

        Commands::Merge { left, right, to } => {
            let merged = merge(&load_schema(&left)?, &load_schema(&right)?)?;
            emit(&merged, to)
        }

        Commands::Reduce { schema, to } => emit(&reduce(&load_schema(&schema)?), to),

        Commands::Convert { schema, to } => {
            let versioned = read_versioned(&schema)?;
            let converted = change_version(&versioned, to.unwrap_or(config.encoding.target_version))?;
            println!("{}", output_format.render(&converted)?);
            Ok(0)
        }

        Commands::Fingerprint { schema, expect } => {
            let checksum = Checksum::of_schema(&load_schema(&schema)?)?;
            println!("{}", checksum);
            match expect {
                Some(expected) if Checksum::from(expected.as_str()) != checksum => {
                    eprintln!("❌ Fingerprint mismatch: expected {}", expected.trim());
                    Ok(1)
                }
                _ => Ok(0),
            }
        }

        Commands::History { dir } => history(&dir, &config),
    }
}

/// Sort key of a history file: directory, then the number its name starts
/// with (so `2.json` precedes `10.json`), then the full path
fn sequence_key(path: &Path) -> (Option<&Path>, Option<u64>, &Path) {
    let number = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| {
            let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        });
    (path.parent(), number, path)
}

/// Walk `dir` in sequence order and check each schema against its successor
fn history(dir: &Path, config: &ShapesConfig) -> anyhow::Result<i32> {
    let extension = config.history.extension.as_str();
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.into_path();
        if path.is_file() && path.extension().map(|ext| ext == extension).unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| sequence_key(a).cmp(&sequence_key(b)));

    if files.len() < 2 {
        println!("⚠️  Fewer than two schema files in {}", dir.display());
        return Ok(0);
    }

    let mut broken = 0;
    let mut previous = load_schema(&files[0])?;
    for pair in files.windows(2) {
        let current = load_schema(&pair[1])?;
        let compatible = is_read_compatible(&previous, &current)?;
        let marker = if compatible { "✅" } else { "❌" };
        println!("  {} {} -> {}", marker, pair[0].display(), pair[1].display());
        if !compatible {
            broken += 1;
            for change in breaking_changes(&diff(&previous, &current)?) {
                println!("      {}", change);
            }
        }
        previous = current;
    }

    if broken > 0 && config.compatibility.fail_on_breaking {
        eprintln!("\n❌ {} incompatible steps", broken);
        return Ok(2);
    }
    Ok(0)
}
