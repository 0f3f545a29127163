//! NDA Log Reader CLI Application
//!
//! Command-line front end for the nda-decoder library: decodes a Neware
//! nda/ndc/ndax file and writes the assembled record table as CSV or JSON.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod output;

/// NDA Log Reader - Decode Neware battery cycler log files
#[derive(Parser, Debug)]
#[command(name = "nda-cli")]
#[command(about = "Decode Neware battery cycler log files (nda, ndc, ndax)", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the nda/ndc/ndax file to decode
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file for the decoded table (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("NDA Log Reader CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", nda_decoder::VERSION);

    let table = nda_decoder::read_file(&args.input)
        .with_context(|| format!("failed to decode {:?}", args.input))?;
    log::info!("decoded {} records", table.len());

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {:?}", path))?;
            write_table(&mut BufWriter::new(file), &table, args.format)?;
            log::info!("wrote {:?}", path);
        }
        None => {
            let stdout = io::stdout();
            write_table(&mut stdout.lock(), &table, args.format)?;
        }
    }

    Ok(())
}

fn write_table(w: &mut impl Write, table: &nda_decoder::RecordTable, format: Format) -> Result<()> {
    match format {
        Format::Csv => output::write_csv(w, table)?,
        Format::Json => output::write_json(w, table)?,
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
