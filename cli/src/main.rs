//! Mongolog CLI
//!
//! Command-line interface for parsing MongoDB server logs.
//!
//! # Usage
//!
//! ```bash
//! mongolog --help
//! mongolog ingest mongod.log --fail --timings
//! mongolog shape '{ age: { $gt: 21 } }'
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logparser::{compute_shape_with_depth, parse_query_with, LineParser, ParserConfig};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mongolog CLI - MongoDB log parser and query shape tool
#[derive(Parser)]
#[command(name = "mongolog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Maximum nesting depth of embedded documents, overriding MONGOLOG_MAX_DEPTH
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Emit diagnostic logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every line of a log file and report throughput
    Ingest {
        /// Log file to read
        file: PathBuf,

        /// Print lines that fail to parse
        #[arg(long)]
        fail: bool,

        /// Print parsed events as JSON
        #[arg(long)]
        success: bool,

        /// Print intermediate timings
        #[arg(long)]
        timings: bool,

        /// Successful lines between two timing reports
        #[arg(
            long,
            env = "MONGOLOG_REPORT_INTERVAL",
            default_value_t = 50_000,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        report_interval: u64,
    },

    /// Print the canonical shape of a query document
    Shape {
        /// Query document, e.g. `{ a: { $gt: 1 } }`
        query: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = parser_config(cli.max_depth)?;

    match cli.command {
        Commands::Ingest {
            file,
            fail,
            success,
            timings,
            report_interval,
        } => {
            info!(path = %file.display(), "Ingesting log file");
            let reader = BufReader::new(
                File::open(&file)
                    .with_context(|| format!("Failed to open {}", file.display()))?,
            );
            let options = IngestOptions {
                fail,
                success,
                timings,
                report_interval,
            };
            let stdout = io::stdout();
            let stats = ingest(
                reader,
                &mut stdout.lock(),
                &LineParser::new(config),
                &options,
            )?;
            println!("{stats}");
        }
        Commands::Shape { query } => match shape(&query, &config) {
            Ok(shape) => println!("Query shape: {shape}"),
            Err(e) => {
                println!("{e}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// `--max-depth` wins over the environment.
fn parser_config(max_depth: Option<usize>) -> Result<ParserConfig> {
    let config = match max_depth {
        Some(max_depth) => ParserConfig::default().with_max_depth(max_depth),
        None => ParserConfig::from_env()?,
    };
    config.validate_config()?;
    info!(max_depth = config.max_depth, "Parser configured");
    Ok(config)
}

// ============================================================================
// Ingest
// ============================================================================

struct IngestOptions {
    fail: bool,
    success: bool,
    timings: bool,
    report_interval: u64,
}

/// Counts and time spent inside the parser.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct IngestStats {
    parsed: u64,
    failed: u64,
    elapsed: Duration,
}

impl IngestStats {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn lines_per_sec(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.parsed as f64 / secs) as u64
        } else {
            0
        }
    }
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ms for {} successfully parsed log lines ({} lines/sec).  {} failures",
            self.elapsed.as_millis(),
            self.parsed,
            self.lines_per_sec(),
            self.failed
        )
    }
}

/// Parses every line from `reader`, writing the requested output to `out`.
///
/// Only time spent parsing is counted; reading and printing are not.
/// Invalid UTF-8 is replaced rather than aborting the run.
fn ingest<R: BufRead, W: Write>(
    reader: R,
    out: &mut W,
    parser: &LineParser,
    options: &IngestOptions,
) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for raw in reader.split(b'\n') {
        let raw = raw.context("Failed to read log input")?;
        let text = String::from_utf8_lossy(&raw);
        let line = text.strip_suffix('\r').unwrap_or(&text);

        let started = Instant::now();
        let result = parser.parse(line);
        stats.elapsed += started.elapsed();

        match result {
            Ok(event) => {
                stats.parsed += 1;
                if options.success {
                    writeln!(out, "SUCCESS: {}", serde_json::to_string(&event)?)?;
                }
                if options.timings && stats.parsed % options.report_interval == 0 {
                    writeln!(out, "{stats}")?;
                }
            }
            Err(failure) => {
                stats.failed += 1;
                if options.fail {
                    writeln!(out, "FAIL: {line} {failure}")?;
                }
            }
        }
    }

    Ok(stats)
}

// ============================================================================
// Shape
// ============================================================================

fn shape(query: &str, config: &ParserConfig) -> Result<String, logparser::DocumentError> {
    let value = parse_query_with(query, config)?;
    Ok(compute_shape_with_depth(&value, config.max_depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use logparser::config::MAX_DEPTH_LIMIT;
    use std::io::Cursor;

    const LOG: &str = "\
Mon Feb 23 03:20:19.670 [TTLMonitor] query local.system.indexes query: { expireAfterSeconds: { $exists: true } } ntoreturn:0 ntoskip:0 nscanned:0 keyUpdates:0 locks(micros) r:86 nreturned:0 reslen:20 0ms
not a log line
Mon Feb 23 03:20:20.101 [conn1] insert test.users ninserted:1 keyUpdates:0 locks(micros) w:210 0ms\r
Mon Feb 23 03:20:21.552 [conn1] query test.users query: { a: { $exists: true } 1ms
";

    fn options() -> IngestOptions {
        IngestOptions {
            fail: false,
            success: false,
            timings: false,
            report_interval: 50_000,
        }
    }

    fn run(options: &IngestOptions) -> (IngestStats, String) {
        let mut out = Vec::new();
        let stats = ingest(
            Cursor::new(LOG),
            &mut out,
            &LineParser::default(),
            options,
        )
        .unwrap();
        (stats, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_cli_parse_ingest() {
        let cli = Cli::try_parse_from(["mongolog", "ingest", "mongod.log", "--fail"]).unwrap();
        assert_eq!(cli.max_depth, None);
        match cli.command {
            Commands::Ingest {
                file,
                fail,
                success,
                report_interval,
                ..
            } => {
                assert_eq!(file, PathBuf::from("mongod.log"));
                assert!(fail);
                assert!(!success);
                assert_eq!(report_interval, 50_000);
            }
            Commands::Shape { .. } => panic!("Expected ingest command"),
        }
    }

    #[test]
    fn test_cli_parse_shape_with_depth() {
        let cli = Cli::try_parse_from(["mongolog", "shape", "{ a: 1 }", "--max-depth", "5"])
            .unwrap();
        assert_eq!(cli.max_depth, Some(5));
        assert!(matches!(cli.command, Commands::Shape { ref query } if query == "{ a: 1 }"));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["mongolog"]).is_err());
        assert!(Cli::try_parse_from(["mongolog", "ingest"]).is_err());
        assert!(
            Cli::try_parse_from(["mongolog", "ingest", "x.log", "--report-interval", "0"])
                .is_err()
        );
    }

    #[test]
    fn test_parser_config_from_flag() {
        assert_eq!(parser_config(Some(7)).unwrap().max_depth, 7);
        assert!(parser_config(Some(0)).is_err());
        assert!(parser_config(Some(MAX_DEPTH_LIMIT + 1)).is_err());
    }

    #[test]
    fn test_ingest_counts_lines() {
        let (stats, out) = run(&options());
        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.failed, 2);
        assert!(out.is_empty());
    }

    #[test]
    fn test_ingest_prints_failures() {
        let (_, out) = run(&IngestOptions {
            fail: true,
            ..options()
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("FAIL: not a log line timestamp stage failed"));
        assert!(lines[1].contains("document stage failed"));
    }

    #[test]
    fn test_ingest_prints_successes_as_json() {
        let (_, out) = run(&IngestOptions {
            success: true,
            ..options()
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let json: serde_json::Value =
            serde_json::from_str(lines[0].strip_prefix("SUCCESS: ").unwrap()).unwrap();
        assert_eq!(json["context"], "TTLMonitor");
        assert_eq!(json["locks(micros) r"], 86);

        let json: serde_json::Value =
            serde_json::from_str(lines[1].strip_prefix("SUCCESS: ").unwrap()).unwrap();
        assert_eq!(json["operation"], "insert");
        assert_eq!(json["duration_ms"], 0);
    }

    #[test]
    fn test_ingest_reports_timings_per_interval() {
        let (_, out) = run(&IngestOptions {
            timings: true,
            report_interval: 1,
            ..options()
        });
        let reports: Vec<&str> = out.lines().collect();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].contains(" for 1 successfully parsed log lines "));
        assert!(reports[1].ends_with(".  1 failures"));
    }

    #[test]
    fn test_stats_summary_format() {
        let stats = IngestStats {
            parsed: 100,
            failed: 3,
            elapsed: Duration::from_millis(2000),
        };
        assert_eq!(
            stats.to_string(),
            "2000ms for 100 successfully parsed log lines (50 lines/sec).  3 failures"
        );
        assert_eq!(IngestStats::default().lines_per_sec(), 0);
    }

    #[test]
    fn test_shape_command() {
        let config = ParserConfig::default();
        assert_eq!(
            shape("{ expireAfterSeconds: { $exists: true } }", &config).unwrap(),
            r#"{ "expireAfterSeconds": { "$exists": 1 } }"#
        );
        assert!(shape("{ a: ", &config).is_err());
        assert!(shape("", &config).is_err());
    }
}
