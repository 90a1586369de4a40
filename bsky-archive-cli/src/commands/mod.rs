pub mod feed;
pub mod search;
pub mod trending;
pub mod user;
pub mod users;

use crate::prompt;
use anyhow::{Context as _, Result};
use bsky_archive_lib::filter::{self, TIMESTAMP_FORMAT};
use bsky_archive_lib::sources;
use bsky_archive_lib::thread::{self, EnrichOptions};
use bsky_archive_lib::{links, Actor, Archive, Config, TimeWindow, XrpcClient};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Everything a mode needs once the session is established.
pub struct Context {
    pub client: XrpcClient,
    pub config: Config,
    pub public: bool,
    pub workers: Option<usize>,
    pub max_comments: Option<usize>,
}

impl Context {
    /// `<output root>/<authed>`, or `<output root>/<public>` without a session.
    pub fn output_dir(&self, authed: &str, public: &str) -> PathBuf {
        let name = if self.public { public } else { authed };
        self.config.output_root.join(name)
    }

    /// Command-line overrides applied on top of a mode's defaults.
    pub fn enrich_options(&self, defaults: EnrichOptions) -> EnrichOptions {
        EnrichOptions {
            workers: self.workers.unwrap_or(defaults.workers),
            max_comments: self.max_comments.unwrap_or(defaults.max_comments),
        }
    }
}

/// Time window flags shared by the feed, timeline and trending modes.
#[derive(Args, Debug, Default)]
pub struct WindowArgs {
    /// Start of the window, "YYYY-MM-DD HH:MM:SS" (UTC)
    #[arg(long)]
    pub since: Option<String>,

    /// End of the window, "YYYY-MM-DD HH:MM:SS" (UTC)
    #[arg(long)]
    pub until: Option<String>,

    /// Skip the time window question and keep every post
    #[arg(long, conflicts_with_all = ["since", "until"])]
    pub no_time_filter: bool,
}

/// Resolve the time window from flags, asking interactively when none were given.
/// `None` means no filtering.
pub fn time_window(args: &WindowArgs) -> Result<Option<TimeWindow>> {
    if args.since.is_some() || args.until.is_some() {
        let window = TimeWindow::parse(
            args.since.as_deref().unwrap_or_default(),
            args.until.as_deref().unwrap_or_default(),
        )
        .with_context(|| format!("Invalid date format, use '{}'", TIMESTAMP_FORMAT))?;
        return Ok(Some(window));
    }
    if args.no_time_filter {
        return Ok(None);
    }

    if !prompt::confirm("\nApply a time window filter? (y/n): ")? {
        return Ok(None);
    }
    println!("Enter dates in 'YYYY-MM-DD HH:MM:SS' format (UTC). Leave blank for no limit.");
    let start = prompt::ask("Start time: ")?;
    let end = prompt::ask("End time: ")?;
    let window = TimeWindow::parse(&start, &end)
        .with_context(|| format!("Invalid date format, use '{}'", TIMESTAMP_FORMAT))?;
    Ok(Some(window))
}

/// Drop posts outside `window`, logging how many were kept.
pub fn apply_time_window(posts: Vec<Value>, window: Option<&TimeWindow>) -> Vec<Value> {
    let Some(window) = window.filter(|w| !w.is_open()) else {
        return posts;
    };
    let before = posts.len();
    let posts = filter::by_time(posts, window);
    info!("Time filter: kept {} of {} posts", posts.len(), before);
    posts
}

/// Attach `post_url`s and comment threads, with a progress bar on stderr.
pub async fn enrich(ctx: &Context, mut posts: Vec<Value>, options: EnrichOptions) -> Result<Vec<Value>> {
    links::inject_post_urls(&mut posts);
    if posts.is_empty() {
        return Ok(posts);
    }

    info!(
        "Fetching comments for {} posts using {} parallel workers...",
        posts.len(),
        options.workers
    );
    let started = Instant::now();

    let pb = ProgressBar::new(posts.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} posts ({eta})")?
            .progress_chars("#>-"),
    );
    let posts = thread::enrich_posts(&ctx.client, posts, options, || pb.inc(1)).await;
    pb.finish_and_clear();

    info!(
        "Comment fetching finished in {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(posts)
}

/// Save an archive. Write failures are reported but do not abort the run.
pub fn save(archive: &Archive, posts: &[Value]) {
    match archive.save(posts) {
        Ok(Some(path)) => info!("Successfully saved data to {}", path.display()),
        Ok(None) => info!("No posts to save."),
        Err(e) => error!("Failed to save {}: {:#}", archive.path().display(), e),
    }
}

/// Search users by keyword and let the user pick one. Returns the handle.
pub async fn select_actor(client: &XrpcClient, query: Option<String>) -> Result<Option<String>> {
    let query = match query {
        Some(q) => q,
        None => prompt::ask("Enter a name or keyword to search for users: ")?,
    };
    if query.is_empty() {
        println!("Search canceled.");
        return Ok(None);
    }

    let actors = sources::search_actors(client, &query).await;
    if actors.is_empty() {
        println!("No users found matching '{}'.", query);
        return Ok(None);
    }

    let picked = prompt::choose("--- Please Select a User ---", &actors, |_, a| actor_label(a))?;
    Ok(picked.map(|a| a.handle.clone()))
}

fn actor_label(actor: &Actor) -> String {
    match actor.display_name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => format!("@{} ({})", actor.handle, name),
        None => format!("@{}", actor.handle),
    }
}

/// Ask for a post limit unless `--all` or an explicit limit was given.
/// A limit of 0 means no limit.
pub fn post_limit(max: Option<usize>, all: bool, question: &str) -> Result<Option<usize>> {
    if all {
        return Ok(None);
    }
    let max = match max {
        Some(n) => Some(n),
        None => prompt::optional_count(question)?,
    };
    Ok(max.filter(|&n| n > 0))
}

pub fn log_total(started: Instant) {
    info!(
        "Total execution time: {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
}
