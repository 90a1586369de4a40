use super::{apply_time_window, enrich, log_total, save, time_window, Context, WindowArgs};
use crate::prompt;
use anyhow::Result;
use bsky_archive_lib::sources::{self, WHATS_HOT_FEED_URI};
use bsky_archive_lib::thread::EnrichOptions;
use bsky_archive_lib::{post, Archive};
use clap::Args;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::info;

const DEFAULT_COUNT: usize = 500;
const TRENDS_PAGE_DELAY: Duration = Duration::from_secs(1);
const PREVIEW_POSTS: usize = 3;
const PREVIEW_CHARS: usize = 100;

#[derive(Args, Debug)]
pub struct TrendingArgs {
    /// Number of posts to fetch
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Args, Debug)]
pub struct TrendsArgs {
    /// Number of posts to fetch
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
}

/// What's Hot with comment threads.
pub async fn run_trending(ctx: &Context, args: TrendingArgs) -> Result<()> {
    let window = time_window(&args.window)?;
    let count = match args.count {
        Some(n) => n,
        None => prompt::count_or(
            &format!("How many trending posts to fetch? (default {}): ", DEFAULT_COUNT),
            DEFAULT_COUNT,
        )?,
    };

    let started = Instant::now();
    let posts = sources::whats_hot(&ctx.client, count).await;
    info!(
        "Fetched {} trending posts in {:.2} seconds",
        posts.len(),
        started.elapsed().as_secs_f64()
    );
    if posts.is_empty() {
        info!("Could not fetch any trending posts.");
        return Ok(());
    }

    let posts = apply_time_window(posts, window.as_ref());
    let posts = enrich(ctx, posts, ctx.enrich_options(EnrichOptions::default())).await?;
    log_total(started);

    let archive = Archive::new(
        ctx.config.output_root.join("trending_model"),
        "trending_whats-hot",
    );
    save(&archive, &posts);
    Ok(())
}

/// A raw What's Hot snapshot: no comments, slower paging, four-space indent.
pub async fn run_trends(ctx: &Context, args: TrendsArgs) -> Result<()> {
    let count = match args.count {
        Some(n) => usize::try_from(n)?,
        None => prompt::positive_count("How many trending posts to fetch? ")?,
    };

    let started = Instant::now();
    let posts =
        sources::get_feed_raw(&ctx.client, WHATS_HOT_FEED_URI, count, TRENDS_PAGE_DELAY).await;
    info!(
        "Fetched {} posts in {:.2} seconds",
        posts.len(),
        started.elapsed().as_secs_f64()
    );
    if posts.is_empty() {
        info!("No trending posts were returned.");
        return Ok(());
    }

    let archive = Archive::new(ctx.config.output_root.join("trends"), "Trends_bluesky").indent(4);
    save(&archive, &posts);

    println!("\nTop {} trending posts:", PREVIEW_POSTS.min(posts.len()));
    for (i, item) in posts.iter().take(PREVIEW_POSTS).enumerate() {
        println!("  {}. {}", i + 1, preview(item));
    }
    Ok(())
}

/// `@handle: "first 100 chars..."` on a single line.
fn preview(item: &Value) -> String {
    let handle = post::author_handle(item).unwrap_or("unknown");
    let text = post::text(item).unwrap_or_default().replace('\n', " ");
    let mut short: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        short.push_str("...");
    }
    format!("@{}: \"{}\"", handle, short)
}
