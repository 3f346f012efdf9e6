mod commands;
mod output;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tafel_core::tuning::TuningOptions;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tafel",
    version,
    about = "Run and compare table extraction engines on PDF documents"
)]
struct Cli {
    /// Config file (default: ./.tafel.toml over the platform config)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Give up on an engine after this many seconds (0 disables)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// More log output: -v for progress, -vv for engine details
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered engines
    Engines {
        /// Also construct each engine to check its external tools
        #[arg(long)]
        check: bool,
    },
    /// Extract tables from one PDF with one or more engines
    Extract {
        /// Path to the PDF
        input_file: PathBuf,

        /// Engine id(s) to run (default: all, or [run] engines from config)
        #[arg(short, long = "engine", value_name = "ID")]
        engines: Vec<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the results to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// Write the results to an Excel workbook, one sheet per engine
        #[arg(long, value_name = "FILE")]
        excel: Option<PathBuf>,

        /// Tune pdftotext layout settings against the pdftotext-bbox result
        #[arg(long)]
        tune: bool,

        /// Maximum bisection steps while tuning
        #[arg(long, default_value_t = 4, value_name = "N")]
        tuning_depth: u32,

        /// Extra min_words value(s) to try while tuning
        #[arg(long = "min-words", value_name = "N")]
        min_words: Vec<usize>,
    },
    /// Extract tables from every PDF in a directory
    ExtractDir {
        /// Directory containing PDFs
        input_dir: PathBuf,

        /// Directory for the per-document JSON (and Excel) files
        output_dir: PathBuf,

        /// Engine id(s) to run (default: all, or [run] engines from config)
        #[arg(short, long = "engine", value_name = "ID")]
        engines: Vec<String>,

        /// Also write one Excel workbook per document
        #[arg(long)]
        excel: bool,
    },
    /// Compare table counts of two or more engines on one PDF
    Compare {
        /// Path to the PDF
        input_file: PathBuf,

        /// Engine id(s) to compare (default: [compare] engines from config)
        #[arg(short, long = "engine", value_name = "ID")]
        engines: Vec<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Import the first usable table, trying engines in order
    Import {
        /// A PDF, or a directory of PDFs
        input: PathBuf,

        /// Engine order (default: [fallback] order from config)
        #[arg(long = "order", value_name = "ID")]
        order: Vec<String>,

        /// Minimum number of rows in the first table
        #[arg(long, value_name = "N")]
        min_rows: Option<usize>,

        /// Excel workbook to write (required for a directory)
        #[arg(long, value_name = "FILE")]
        excel: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = commands::Context::load(cli.config.as_deref(), cli.timeout).and_then(|ctx| {
        match cli.command {
            Commands::Engines { check } => commands::engines::run(&ctx, check),
            Commands::Extract {
                input_file,
                engines,
                output,
                out,
                excel,
                tune,
                tuning_depth,
                min_words,
            } => commands::extract::run(
                &ctx,
                &input_file,
                &engines,
                &output,
                out,
                excel,
                tune.then(|| TuningOptions {
                    max_depth: tuning_depth,
                    min_words,
                    ..TuningOptions::default()
                }),
            ),
            Commands::ExtractDir {
                input_dir,
                output_dir,
                engines,
                excel,
            } => commands::extract_dir::run(&ctx, &input_dir, &output_dir, &engines, excel),
            Commands::Compare {
                input_file,
                engines,
                output,
            } => commands::compare::run(&ctx, &input_file, &engines, &output),
            Commands::Import {
                input,
                order,
                min_rows,
                excel,
            } => commands::import::run(&ctx, &input, order, min_rows, excel),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
