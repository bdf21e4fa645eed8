//! textflow command-line entry point
//!
//! ```text
//! textflow scan <FILE> [--algorithm wide128] [--threads 4] [--verify]
//! textflow highlight <FILE> [--filetype rust] [--start 0] [--end 40]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use textflow::buffer::BufferId;
use textflow::client::{HighlightClient, HighlightEvent};
use textflow::config::EngineConfig;
use textflow::scan::{self, verify, Algorithm, LineBreakScanner};
use textflow::syntax::{HighlightResponse, LanguageId};
use textflow::PerformanceStats;

/// Line-break scanning and incremental syntax highlighting
#[derive(Parser, Debug)]
#[command(name = "textflow", version, about)]
struct CliArgs {
    /// Config file (defaults to ~/.config/textflow/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the byte offsets of every line break in a file
    Scan {
        file: PathBuf,

        /// Scanning strategy (baseline, assisted, lanes16, lanes32, wide128)
        #[arg(short, long, value_parser = parse_algorithm)]
        algorithm: Option<Algorithm>,

        /// Scan with this many threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Check that every strategy agrees instead of printing offsets
        #[arg(long)]
        verify: bool,
    },
    /// Highlight a window of lines through the worker and print JSON
    Highlight {
        file: PathBuf,

        /// Filetype tag; detected from the extension when omitted
        #[arg(short, long)]
        filetype: Option<String>,

        /// First row (0-indexed)
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Row after the last one
        #[arg(long, default_value_t = 50)]
        end: usize,
    },
}

fn parse_algorithm(name: &str) -> Result<Algorithm, String> {
    Algorithm::from_name(name).ok_or_else(|| {
        let known: Vec<_> = Algorithm::ALL.iter().map(|a| a.name()).collect();
        format!("unknown algorithm '{}' (expected one of {})", name, known.join(", "))
    })
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    scanner: &'a str,
    lines: usize,
    breaks: &'a [usize],
}

#[derive(Serialize)]
struct HighlightOutput {
    filetype: String,
    has_parser: bool,
    version: u64,
    lines: Vec<HighlightResponse>,
    warnings: Vec<String>,
    stats: PerformanceStats,
}

fn main() -> Result<()> {
    textflow::tracing::init();
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };

    match args.command {
        Command::Scan {
            file,
            algorithm,
            threads,
            verify,
        } => {
            let mut scanner_config = config.scanner.clone();
            if let Some(algorithm) = algorithm {
                scanner_config.algorithm = algorithm;
            }
            if let Some(threads) = threads {
                scanner_config.threads = threads;
            }
            run_scan(&file, &scanner_config, verify)
        }
        Command::Highlight {
            file,
            filetype,
            start,
            end,
        } => run_highlight(&config, &file, filetype, start..end),
    }
}

fn run_scan(file: &Path, config: &textflow::config::ScannerConfig, verify: bool) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    if verify {
        verify::cross_check(&bytes)?;
        println!(
            "ok: {} scanners agree on {} bytes",
            verify::all_scanners(bytes.len()).len(),
            bytes.len()
        );
        return Ok(());
    }

    let scanner = scan::scanner_for(config);
    let breaks = scanner.scan(&bytes);
    let output = ScanOutput {
        scanner: scanner.name(),
        lines: breaks.line_count(),
        breaks: breaks.as_slice(),
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn run_highlight(
    config: &EngineConfig,
    file: &Path,
    filetype: Option<String>,
    lines: std::ops::Range<usize>,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filetype =
        filetype.unwrap_or_else(|| LanguageId::from_path(file).filetype().to_string());

    let mut client = HighlightClient::spawn(&config.highlight)?;
    client.wait_ready()?;

    let id = BufferId(1);
    client.register_buffer(id, &filetype, &content)?;
    client.request_highlights(id, lines)?;

    let mut output = HighlightOutput {
        filetype,
        has_parser: false,
        version: 0,
        lines: Vec::new(),
        warnings: Vec::new(),
        stats: PerformanceStats::default(),
    };

    let timeout = Duration::from_secs(30);
    loop {
        let Some(event) = client.next_event(timeout)? else {
            bail!("timed out waiting for highlights");
        };
        match event {
            HighlightEvent::BufferInitialized { has_parser, .. } => output.has_parser = has_parser,
            HighlightEvent::Warning { message, .. } => output.warnings.push(message),
            HighlightEvent::Error { message, .. } => bail!("highlight worker error: {}", message),
            HighlightEvent::HighlightsResponse {
                version, responses, ..
            } => {
                output.version = version;
                output.lines = responses;
                break;
            }
            HighlightEvent::BufferDisposed { .. } => {}
        }
    }

    output.stats = client.performance_stats();
    client.dispose_buffer(id)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
