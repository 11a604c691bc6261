// SPDX-License-Identifier: PMPL-1.0-or-later
//!
//! georepl-inspect: look inside a replication log directory.
//!
//! Subcommands:
//! - `status`  latest published checkpoint and segment totals
//! - `list`    every segment file with its size
//! - `dump`    the records of one segment as JSON
//! - `verify`  pointer, checkpoint and segment consistency
//! - `replay`  apply the log to an in-memory view and report what it holds

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use georepl_log::{ReplicationReader, REPLICATION_FORMAT};
use georepl_sink::{InMemorySink, MetricsSink, SinkOperation};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

/// Inspect a georepl replication log directory.
#[derive(Parser, Debug)]
#[command(name = "georepl-inspect", version = VERSION, about = "Inspect a replication log")]
struct Cli {
    /// Replication log directory.
    #[arg(long, short, default_value = "replication")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the published checkpoint.
    Status,
    /// List segment files in sequence order.
    List,
    /// Print the records of one segment.
    Dump {
        /// Sequence number of the segment.
        sequence: u64,
        /// Pretty-print the JSON.
        #[arg(long)]
        pretty: bool,
    },
    /// Check the directory for consistency; fails if problems are found.
    Verify,
    /// Replay the log into memory and summarise the result.
    Replay {
        /// First sequence to apply.
        #[arg(long, default_value_t = 0)]
        from: u64,
    },
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn status(reader: &ReplicationReader) -> Result<()> {
    let segments = reader.segments()?;
    let bytes: u64 = segments.iter().map(|s| s.file_size).sum();

    println!("directory:  {}", reader.directory().display());
    match reader.latest().context("reading state.json")? {
        Some(checkpoint) => {
            println!("latest:     {}", checkpoint.sequence_number);
            println!("format:     {}", checkpoint.replication_format);
            println!("published:  {}", checkpoint.timestamp.to_rfc3339());
        }
        None => println!("latest:     (nothing published)"),
    }
    println!("segments:   {} ({bytes} bytes)", segments.len());
    Ok(())
}

fn list(reader: &ReplicationReader) -> Result<()> {
    for segment in reader.segments()? {
        println!(
            "{:>20}  {:>10}  {}",
            segment.sequence,
            segment.file_size,
            segment.path.display()
        );
    }
    Ok(())
}

fn dump(reader: &ReplicationReader, sequence: u64, pretty: bool) -> Result<()> {
    let actions = reader
        .read_segment(sequence)
        .with_context(|| format!("reading segment {sequence}"))?;
    let json = if pretty {
        serde_json::to_string_pretty(&actions)?
    } else {
        serde_json::to_string(&actions)?
    };
    println!("{json}");
    Ok(())
}

fn verify(reader: &ReplicationReader) -> Result<()> {
    let report = reader.verify()?;

    match report.latest {
        Some(latest) => println!(
            "checked {} of {} segments, {} records",
            report.segments_checked,
            latest.saturating_add(1),
            report.records
        ),
        None => println!("nothing published"),
    }
    for orphan in &report.orphans {
        println!("orphan: {}", orphan.display());
    }
    for problem in &report.problems {
        println!("problem: {problem}");
    }

    if !report.is_ok() {
        bail!("{} problem(s) found", report.problems.len());
    }
    println!("ok");
    Ok(())
}

fn replay(reader: &ReplicationReader, from: u64) -> Result<()> {
    let mut sink = MetricsSink::new(InMemorySink::new());
    let report = reader
        .replay_from(from, &mut sink)
        .with_context(|| format!("replaying from sequence {from}"))?;

    let stats = sink.stats();
    println!(
        "applied {} segments, {} records",
        report.segments, report.records
    );
    for operation in SinkOperation::ALL {
        println!("  {:<18} {}", operation.as_str(), stats.count(operation));
    }
    println!("documents:  {}", sink.inner().len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::debug!(dir = %cli.dir.display(), format = REPLICATION_FORMAT, "Opening log");

    let reader = ReplicationReader::open(&cli.dir)
        .with_context(|| format!("opening {}", cli.dir.display()))?;

    match cli.command {
        Command::Status => status(&reader),
        Command::List => list(&reader),
        Command::Dump { sequence, pretty } => dump(&reader, sequence, pretty),
        Command::Verify => verify(&reader),
        Command::Replay { from } => replay(&reader, from),
    }
}
