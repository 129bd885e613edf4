use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use ipmatch::{parse_address_with_family, parse_cidr_with_family, Matcher};
use serde::Serialize;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod batch;
mod ranges;

use batch::{BatchProcessor, CheckResult};

/// Environment variable overriding the log filter
const LOG_ENV: &str = "IPMATCH_LOG";

/// Test IPv4 and IPv6 addresses against lists of CIDR ranges
#[derive(Parser)]
#[command(name = "ipmatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "human", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check addresses given on the command line
    Check(CheckArgs),
    /// Check addresses read from a file or stdin, one per line
    Batch(BatchArgs),
    /// Show how an address or CIDR is normalized
    Parse(ParseArgs),
}

#[derive(Parser)]
struct CheckArgs {
    /// Range file(s), one CIDR per line
    #[arg(short, long = "ranges", value_name = "FILE", required = true)]
    ranges: Vec<PathBuf>,

    /// Addresses to check
    #[arg(value_name = "ADDRESS", required = true)]
    addresses: Vec<String>,
}

#[derive(Parser)]
struct BatchArgs {
    /// Range file(s), one CIDR per line
    #[arg(short, long = "ranges", value_name = "FILE", required = true)]
    ranges: Vec<PathBuf>,

    /// Input file (use '-' for stdin)
    #[arg(short, long, value_name = "FILE")]
    file: Option<String>,

    /// Number of worker threads (default: CPU cores * 2)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Parser)]
struct ParseArgs {
    /// Address or CIDR to normalize
    #[arg(value_name = "TEXT")]
    text: String,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output (pretty-printed)
    Json,
    /// JSON output (compact)
    JsonCompact,
    /// CSV output
    Csv,
}

#[derive(Serialize)]
struct ParseResult {
    input: String,
    family: String,
    address: String,
    value: String,
    prefix_len: Option<u8>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Check(args) => handle_check(args, cli.output)?,
        Commands::Batch(args) => handle_batch(args, cli.output)?,
        Commands::Parse(args) => handle_parse(args, cli.output)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_matcher(paths: &[PathBuf]) -> Result<Matcher> {
    let mut matcher = Matcher::new();
    for path in paths {
        let count = ranges::load_file(&mut matcher, path)?;
        info!(path = %path.display(), count, "loaded ranges");
    }
    info!(ranges = matcher.len(), "matcher ready");
    Ok(matcher)
}

fn handle_check(args: CheckArgs, format: OutputFormat) -> Result<()> {
    let matcher = load_matcher(&args.ranges)?;

    let results: Vec<CheckResult> = args
        .addresses
        .iter()
        .map(|address| CheckResult::check(&matcher, address))
        .collect();

    print_results(&results, format)
}

fn handle_batch(args: BatchArgs, format: OutputFormat) -> Result<()> {
    let matcher = load_matcher(&args.ranges)?;
    let processor = BatchProcessor::new(matcher, args.workers)?;
    info!(workers = processor.thread_count(), "batch processing");

    let addresses = match args.file.as_deref() {
        None | Some("-") => read_addresses(io::stdin().lock())?,
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open input file {}", path))?;
            read_addresses(BufReader::new(file))?
        }
    };

    let results = processor.process(addresses);
    print_results(&results, format)
}

fn read_addresses(reader: impl BufRead) -> Result<Vec<String>> {
    let mut addresses = Vec::new();
    for line in reader.lines() {
        let line = line.context("failed to read input")?;
        let line = line.trim();
        if !line.is_empty() {
            addresses.push(line.to_string());
        }
    }
    Ok(addresses)
}

fn handle_parse(args: ParseArgs, format: OutputFormat) -> Result<()> {
    let result = if args.text.contains('/') {
        let (cidr, family) = parse_cidr_with_family(&args.text)?;
        ParseResult {
            input: args.text.clone(),
            family: family.to_string(),
            address: cidr.address.to_string(),
            value: format!("{:#034x}", cidr.address.0),
            prefix_len: Some(cidr.prefix_len),
        }
    } else {
        let (address, family) = parse_address_with_family(&args.text)?;
        ParseResult {
            input: args.text.clone(),
            family: family.to_string(),
            address: address.to_string(),
            value: format!("{:#034x}", address.0),
            prefix_len: None,
        }
    };

    match format {
        OutputFormat::Human => print_parse_human(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&result)?),
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            wtr.serialize(&result)?;
            wtr.flush()?;
        }
    }
    Ok(())
}

fn print_parse_human(result: &ParseResult) {
    println!();
    println!("{}", "Normalized Address".bold().cyan());
    println!("{}", "─".repeat(60).dimmed());
    println!("{:>12}: {}", "Input".bold(), result.input);
    println!("{:>12}: {}", "Family".bold(), result.family);
    println!("{:>12}: {}", "Address".bold(), result.address.green());
    println!("{:>12}: {}", "Value".bold(), result.value);
    if let Some(prefix_len) = result.prefix_len {
        println!("{:>12}: /{}", "Prefix".bold(), prefix_len);
    }
    println!();
}

fn print_results(results: &[CheckResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => print_human(results),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(results)?),
        OutputFormat::Csv => print_csv(results)?,
    }
    Ok(())
}

fn print_human(results: &[CheckResult]) {
    for result in results {
        match (&result.matched, &result.error) {
            (Some(true), _) => println!("{} {}", "✓".green(), result.input),
            (Some(false), _) => println!("{} {}", "✗".red(), result.input),
            (None, Some(error)) => println!("{} {}", "!".yellow(), error),
            (None, None) => {}
        }
    }
}

fn print_csv(results: &[CheckResult]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());
    wtr.write_record(["input", "matched", "error"])?;
    for result in results {
        let matched = result.matched.map_or(String::new(), |m| m.to_string());
        wtr.write_record([
            result.input.as_str(),
            matched.as_str(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
