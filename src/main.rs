//! pronlex: builds a term=pronunciation lexicon from reference documents
//! and an online dictionary.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pronlex::{
    config::{Config, LogFormat, LoggingConfig, DEFAULT_CONFIG_FILE},
    pipeline::RunOptions,
};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::*;

#[derive(Parser)]
#[command(name = "pronlex")]
#[command(about = "Build a pronunciation lexicon from reference documents")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output directory or .toml path
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List configured sources and the state of their sinks
    Sources,

    /// Convert a source document into its text cache
    Convert {
        /// Source name
        source: String,

        /// Rebuild the cache even if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Extract candidate terms without resolving them
    Extract {
        /// Source name
        source: String,

        /// Print every term
        #[arg(short, long)]
        print: bool,
    },

    /// Resolve a source's terms into its sink
    Run {
        /// Source name
        source: String,

        /// Number of leading terms to pass over
        #[arg(long, default_value = "0", conflicts_with = "resume")]
        skip: usize,

        /// Stop after this many written terms
        #[arg(long)]
        max: Option<usize>,

        /// Continue from the source's checkpoint
        #[arg(long)]
        resume: bool,

        /// Skip terms already in the sink and append to it
        #[arg(long, conflicts_with = "resume")]
        incremental: bool,

        /// No progress bar or summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run every source in order, then merge
    RunAll {
        /// No progress bars or summaries
        #[arg(short, long)]
        quiet: bool,
    },

    /// Merge all sinks into one lexicon
    Merge {
        /// Output path (defaults to the configured merged output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a source's run checkpoint
    Status {
        /// Source name
        source: String,
    },
}

fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let level = logging.level.raised_by(verbose);
    let filter = if verbose > 0 {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            init_config(path).await
        }
        command => {
            let config = Config::load_or_default(&cli.config)?;
            init_logging(&config.logging, cli.verbose)?;
            dispatch(config, command).await
        }
    }
}

async fn dispatch(config: Config, command: Commands) -> Result<()> {
    match command {
        Commands::Init { path } => init_config(path).await,
        Commands::Sources => list_sources(config).await,
        Commands::Convert { source, force } => convert_source(config, source, force).await,
        Commands::Extract { source, print } => extract_source(config, source, print).await,
        Commands::Run {
            source,
            skip,
            max,
            resume,
            incremental,
            quiet,
        } => {
            let options = RunOptions {
                skip,
                max_count: max,
                resume,
                incremental,
            };
            run_source(config, source, options, quiet).await
        }
        Commands::RunAll { quiet } => run_all(config, quiet).await,
        Commands::Merge { output } => merge_sinks(config, output).await,
        Commands::Status { source } => show_status(config, source).await,
    }
}
