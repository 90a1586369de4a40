use super::{enrich, log_total, post_limit, save, time_window, Context, WindowArgs};
use crate::prompt;
use anyhow::Result;
use bsky_archive_lib::output::handle_slug;
use bsky_archive_lib::thread::EnrichOptions;
use bsky_archive_lib::{sources, Archive};
use clap::Args;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::info;

/// Lighter defaults: several timelines are enriched back to back.
const MULTI_USER: EnrichOptions = EnrichOptions {
    workers: 5,
    max_comments: 75,
};

#[derive(Args, Debug)]
pub struct UsersArgs {
    /// Handles to archive, separated by spaces or commas
    pub handles: Vec<String>,

    /// Maximum number of posts per user
    #[arg(short = 'n', long)]
    pub max_per_user: Option<usize>,

    /// Fetch every post in the window without asking for a limit
    #[arg(long, conflicts_with = "max_per_user")]
    pub all: bool,

    #[command(flatten)]
    pub window: WindowArgs,
}

pub async fn run(ctx: &Context, args: UsersArgs) -> Result<()> {
    let mut handles = parse_handles(&args.handles.join(","));
    if handles.is_empty() {
        let input = prompt::ask("Enter the handles to archive, separated by commas: ")?;
        handles = parse_handles(&input);
    }
    if handles.is_empty() {
        info!("No target handles provided. Exiting.");
        return Ok(());
    }

    let window = time_window(&args.window)?.unwrap_or_default();
    let max = post_limit(
        args.max_per_user,
        args.all,
        "Maximum number of posts per user (leave blank for all): ",
    )?;
    let options = ctx.enrich_options(MULTI_USER);

    let started = Instant::now();
    info!(
        "Fetching timelines for {} users using {} parallel workers...",
        handles.len(),
        options.workers
    );
    let client = &ctx.client;
    let timelines: Vec<(String, Vec<serde_json::Value>)> = stream::iter(handles)
        .map(|handle| async move {
            let posts = sources::get_author_feed(client, &handle, window, max).await;
            (handle, posts)
        })
        .buffered(options.workers.max(1))
        .collect()
        .await;
    info!(
        "Fetched all timelines in {:.2} seconds",
        started.elapsed().as_secs_f64()
    );

    for (handle, posts) in timelines {
        if posts.is_empty() {
            info!("No posts found for @{}, skipping.", handle);
            continue;
        }
        info!("Processing {} posts for @{}", posts.len(), handle);
        let posts = enrich(ctx, posts, options).await?;

        let archive = Archive::new(
            ctx.config.output_root.join("multiple_user"),
            &format!("posts_{}", handle_slug(&handle)),
        );
        save(&archive, &posts);
    }

    log_total(started);
    Ok(())
}

/// Split on commas and whitespace, dropping blanks, leading `@` and repeats.
fn parse_handles(input: &str) -> Vec<String> {
    let mut handles: Vec<String> = Vec::new();
    for raw in input.split(|c: char| c == ',' || c.is_whitespace()) {
        let handle = raw.trim().trim_start_matches('@');
        if !handle.is_empty() && !handles.iter().any(|h| h == handle) {
            handles.push(handle.to_string());
        }
    }
    handles
}
