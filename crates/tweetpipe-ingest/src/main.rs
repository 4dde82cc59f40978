//! tweetpipe - resumable tweet archive loader and title enricher

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tweetpipe_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tweetpipe_ingest::error::EXIT_SETUP;
use tweetpipe_ingest::{config, load, titles};

#[derive(Parser, Debug)]
#[command(name = "tweetpipe")]
#[command(author, version, about = "Resumable tweet archive loader and title enricher")]
struct Cli {
    /// Pipeline stage to run
    #[command(subcommand)]
    stage: StageCommand,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum StageCommand {
    /// Load a stream archive into PostgreSQL
    Load {
        /// Destination table; reads stream_<table>.json from the data directory
        table: String,

        /// Directory holding stream files
        #[arg(long, env = "TWEETPIPE_DATA_DIR", default_value = config::DEFAULT_DATA_DIR)]
        data_dir: PathBuf,

        /// Candidates per commit
        #[arg(long, default_value_t = config::DEFAULT_LOAD_BATCH_SIZE)]
        batch_size: u64,
    },

    /// Fetch page titles for loaded tweets into titles_<table>
    Titles {
        /// Source table produced by the load stage
        table: String,

        /// Rows per page and per commit
        #[arg(long, default_value_t = config::DEFAULT_TITLE_CHUNK_SIZE)]
        chunk: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Pick up .env before any configuration is read
    dotenvy::dotenv().ok();

    let table = match &cli.stage {
        StageCommand::Load { table, .. } | StageCommand::Titles { table, .. } => table.clone(),
    };

    // Reject bad table names before opening any connection
    if let Err(e) = config::validate_table_name(&table) {
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }

    // Every run gets its own log file, named like the run
    let prefix = match &cli.stage {
        StageCommand::Load { .. } => format!("load_{table}"),
        StageCommand::Titles { .. } => format!("titles_{table}"),
    };

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let mut log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::File)
        .log_file_prefix(prefix)
        .build();

    // Environment overrides the run defaults
    if let Err(e) = log_config.apply_env() {
        eprintln!("Error: {e}");
        process::exit(EXIT_SETUP);
    }

    // The pipeline still works without a log sink
    let _ = init_logging(&log_config);

    info!(stage = ?cli.stage, "tweetpipe started");

    if let Err(e) = run(cli).await {
        error!(error = %e, "Run failed");
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> tweetpipe_ingest::Result<()> {
    let db = config::DbConfig::from_env()?;
    let pool = db.create_pool().await?;

    match cli.stage {
        StageCommand::Load {
            table,
            data_dir,
            batch_size,
        } => {
            load::run(&pool, &table, &data_dir, batch_size).await?;
        }
        StageCommand::Titles { table, chunk } => {
            let fetch = config::FetchConfig::from_env();
            titles::run(&pool, &table, chunk, &fetch).await?;
        }
    }

    info!("tweetpipe finished");
    Ok(())
}
