use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use landmark_matcher::{AudioMatcher, Config};

/// Landmark-based audio identification
#[derive(Parser)]
#[command(name = "landmark-matcher")]
#[command(version)]
#[command(about = "Build a fingerprint library from reference recordings and identify query clips", long_about = None)]
struct Cli {
    /// JSON file overriding the default tunables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the library at --index, or build it from --database and store it there
    Build {
        /// Directory of reference recordings (.wav)
        #[arg(short, long)]
        database: PathBuf,

        /// SQLite file holding the library
        #[arg(short, long)]
        index: PathBuf,
    },

    /// Identify every query recording and write ranked matches
    Identify {
        /// Directory of query recordings (.wav)
        #[arg(short, long)]
        queries: PathBuf,

        /// SQLite file holding the library
        #[arg(short, long)]
        index: PathBuf,

        /// Output file, one tab-separated line per query
        #[arg(short, long)]
        output: PathBuf,

        /// Number of ranked matches per query
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },

    /// Serve identification requests over HTTP
    Serve {
        /// SQLite file holding the library
        #[arg(short, long)]
        index: PathBuf,

        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,

        /// Number of ranked matches per request
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Build { database, index } => {
            let matcher = AudioMatcher::open_or_build(&database, &index, config)
                .await
                .with_context(|| format!("failed to build library from {}", database.display()))?;
            info!(
                recordings = matcher.catalog().len(),
                keys = matcher.index().len(),
                "library ready"
            );
        }
        Commands::Identify {
            queries,
            index,
            output,
            top_n,
        } => {
            if let Some(top_n) = top_n {
                config.matching.top_n = top_n;
            }
            let matcher = AudioMatcher::load(&index, config)
                .await
                .with_context(|| format!("failed to load library {}", index.display()))?;
            matcher
                .identify_folder(&queries, &output)
                .await
                .with_context(|| format!("failed to identify queries in {}", queries.display()))?;
        }
        Commands::Serve { index, addr, top_n } => {
            if let Some(top_n) = top_n {
                config.matching.top_n = top_n;
            }
            let matcher = AudioMatcher::load(&index, config)
                .await
                .with_context(|| format!("failed to load library {}", index.display()))?;
            landmark_matcher::server::serve(matcher, addr).await?;
        }
    }

    Ok(())
}
