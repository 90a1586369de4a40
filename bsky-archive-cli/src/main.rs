mod commands;
mod prompt;

use anyhow::Result;
use bsky_archive_lib::{config, Config, XrpcClient};
use clap::{Parser, Subcommand};
use commands::feed::FeedArgs;
use commands::search::SearchArgs;
use commands::trending::{TrendingArgs, TrendsArgs};
use commands::user::UserArgs;
use commands::users::UsersArgs;
use commands::Context;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bsky-archive")]
#[command(about = "Archive Bluesky feeds, timelines and searches with their comment threads as JSON")]
struct Cli {
    /// Use the public API without logging in
    #[arg(long, global = true)]
    public: bool,

    /// Parallel comment-thread requests
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    workers: Option<u64>,

    /// Maximum comments kept per post
    #[arg(long, global = true)]
    max_comments: Option<usize>,

    /// Directory the per-mode output folders are created in [env: BSKY_OUTPUT_ROOT]
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Posts from a custom feed
    Feed(FeedArgs),
    /// One user's timeline
    User(UserArgs),
    /// Several users' timelines, one file per user
    Users(UsersArgs),
    /// Full-text post search
    Search(SearchArgs),
    /// The What's Hot feed with comments
    Trending(TrendingArgs),
    /// A raw What's Hot snapshot without comments
    Trends(TrendsArgs),
}

/// `RUST_LOG` when set, otherwise our crates at `info` (`debug` with `-v`).
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    match rust_log.filter(|v| !v.trim().is_empty()) {
        Some(directives) => directives,
        None => {
            let level = if verbose { "debug" } else { "info" };
            format!("warn,bsky_archive={level},bsky_archive_lib={level}")
        }
    }
}

fn init_tracing(verbose: bool) {
    let directives = log_directives(verbose, std::env::var("RUST_LOG").ok());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(config: &Config, public: bool) -> Result<XrpcClient> {
    if public {
        info!("Using the public API at {}", config.public_host);
        return Ok(XrpcClient::public(&config.public_host));
    }
    let credentials = config.credentials()?;
    XrpcClient::login(&config.host, &credentials).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // .env may carry RUST_LOG, so it is loaded before the subscriber.
    let dotenv = config::load_dotenv();
    init_tracing(cli.verbose);
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let mut config = Config::from_env();
    if let Some(root) = cli.output_root {
        config.output_root = root;
    }

    let client = connect(&config, cli.public).await?;
    let ctx = Context {
        client,
        config,
        public: cli.public,
        workers: cli.workers.map(usize::try_from).transpose()?,
        max_comments: cli.max_comments,
    };

    match cli.command {
        Mode::Feed(args) => commands::feed::run(&ctx, args).await,
        Mode::User(args) => commands::user::run(&ctx, args).await,
        Mode::Users(args) => commands::users::run(&ctx, args).await,
        Mode::Search(args) => commands::search::run(&ctx, args).await,
        Mode::Trending(args) => commands::trending::run_trending(&ctx, args).await,
        Mode::Trends(args) => commands::trending::run_trends(&ctx, args).await,
    }
}
