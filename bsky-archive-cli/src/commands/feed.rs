use super::{apply_time_window, enrich, log_total, save, time_window, Context, WindowArgs};
use crate::prompt;
use anyhow::{anyhow, Result};
use bsky_archive_lib::links::{extract_at_uri, feed_generator_uri, parse_feed_url};
use bsky_archive_lib::output::safe_feed_name;
use bsky_archive_lib::thread::EnrichOptions;
use bsky_archive_lib::{sources, Archive, FeedGenerator, XrpcClient};
use clap::Args;
use std::time::Instant;
use tracing::{info, warn};

const DEFAULT_COUNT: usize = 500;

#[derive(Args, Debug)]
pub struct FeedArgs {
    /// Feed URL (https://bsky.app/profile/<creator>/feed/<name>) or at:// URI
    #[arg(long)]
    pub uri: Option<String>,

    /// Pick from the currently popular feeds
    #[arg(long, conflicts_with_all = ["uri", "creator"])]
    pub popular: bool,

    /// Pick from the feeds created by this handle
    #[arg(long, conflicts_with = "uri")]
    pub creator: Option<String>,

    /// Number of posts to fetch
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    #[command(flatten)]
    pub window: WindowArgs,
}

/// A chosen feed: its generator URI and a human name for the file.
struct SelectedFeed {
    uri: String,
    name: String,
}

pub async fn run(ctx: &Context, args: FeedArgs) -> Result<()> {
    let Some(feed) = select_feed(&ctx.client, &args).await? else {
        info!("No feed selected. Exiting.");
        return Ok(());
    };

    let count = match args.count {
        Some(n) => n,
        None => prompt::count_or(
            &format!(
                "How many posts to fetch from '{}'? (default {}): ",
                feed.name, DEFAULT_COUNT
            ),
            DEFAULT_COUNT,
        )?,
    };
    let window = time_window(&args.window)?;

    let started = Instant::now();
    let posts = sources::get_feed(&ctx.client, &feed.uri, count).await;
    info!(
        "Fetched {} initial posts in {:.2} seconds",
        posts.len(),
        started.elapsed().as_secs_f64()
    );
    if posts.is_empty() {
        info!("Could not fetch any posts from this feed.");
        return Ok(());
    }

    let posts = apply_time_window(posts, window.as_ref());
    let posts = enrich(ctx, posts, ctx.enrich_options(EnrichOptions::default())).await?;
    log_total(started);

    let archive = Archive::new(
        ctx.output_dir("feed_model", "feed_model_unauth"),
        &format!("feed_{}", safe_feed_name(&feed.name)),
    );
    save(&archive, &posts);
    Ok(())
}

async fn select_feed(client: &XrpcClient, args: &FeedArgs) -> Result<Option<SelectedFeed>> {
    if let Some(input) = &args.uri {
        return feed_from_input(client, input).await.map(Some);
    }
    if args.popular {
        return pick_feed(&sources::popular_feeds(client).await);
    }
    if let Some(creator) = &args.creator {
        return pick_feed(&sources::feeds_by_actor(client, creator).await);
    }

    loop {
        println!("\nHow would you like to find a feed?");
        println!("[1] Browse popular feeds");
        println!("[2] List feeds by a specific creator");
        println!("[3] Enter a feed URL or at:// URI directly");

        match prompt::ask("Enter your choice (1, 2, or 3): ")?.as_str() {
            "1" => {
                if let Some(feed) = pick_feed(&sources::popular_feeds(client).await)? {
                    return Ok(Some(feed));
                }
            }
            "2" => {
                let creator = prompt::ask("Enter the feed creator's handle: ")?;
                if creator.is_empty() {
                    continue;
                }
                if let Some(feed) = pick_feed(&sources::feeds_by_actor(client, &creator).await)? {
                    return Ok(Some(feed));
                }
            }
            "3" => {
                let input = prompt::ask("Enter the full feed URL or at:// URI: ")?;
                match feed_from_input(client, &input).await {
                    Ok(feed) => return Ok(Some(feed)),
                    Err(e) => warn!("{:#}", e),
                }
            }
            _ => println!("Invalid choice. Please enter 1, 2, or 3."),
        }
    }
}

fn pick_feed(feeds: &[FeedGenerator]) -> Result<Option<SelectedFeed>> {
    if feeds.is_empty() {
        println!("No feeds found.");
        return Ok(None);
    }
    let picked = prompt::choose("--- Please Select a Feed ---", feeds, feed_label)?;
    Ok(picked.map(|f| SelectedFeed {
        uri: f.uri.clone(),
        name: f.display_name.clone().unwrap_or_default(),
    }))
}

fn feed_label(index: usize, feed: &FeedGenerator) -> String {
    let name = feed
        .display_name
        .clone()
        .unwrap_or_else(|| format!("Feed {}", index + 1));
    let creator = feed
        .creator
        .as_ref()
        .map(|c| c.handle.as_str())
        .unwrap_or("unknown");
    format!("{} (by @{})", name, creator)
}

/// Accept an at:// URI as-is, or resolve a bsky.app feed URL to one.
async fn feed_from_input(client: &XrpcClient, input: &str) -> Result<SelectedFeed> {
    if let Some(uri) = extract_at_uri(input) {
        return Ok(SelectedFeed {
            name: record_key(&uri).to_string(),
            uri,
        });
    }

    let (actor, rkey) = parse_feed_url(input)
        .map_err(|e| anyhow!("Please provide a valid at:// URI or feed URL ({})", e))?;
    let did = sources::resolve_handle(client, &actor).await?;
    Ok(SelectedFeed {
        uri: feed_generator_uri(&did, &rkey),
        name: rkey,
    })
}

fn record_key(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsky_archive_lib::Actor;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_feed_label() {
        let feed = FeedGenerator {
            uri: "at://did:plc:a/app.bsky.feed.generator/science".into(),
            display_name: Some("Science".into()),
            creator: Some(Actor {
                handle: "bossett.social".into(),
                display_name: None,
            }),
        };
        assert_eq!(feed_label(0, &feed), "Science (by @bossett.social)");

        let anonymous = FeedGenerator {
            uri: feed.uri.clone(),
            display_name: None,
            creator: None,
        };
        assert_eq!(feed_label(4, &anonymous), "Feed 5 (by @unknown)");
    }

    #[test]
    fn test_record_key() {
        assert_eq!(
            record_key("at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.generator/whats-hot"),
            "whats-hot"
        );
    }

    #[tokio::test]
    async fn test_feed_from_at_uri_needs_no_network() {
        let client = XrpcClient::public("http://127.0.0.1:9");
        let feed = feed_from_input(
            &client,
            "  at://did:plc:abc/app.bsky.feed.generator/cats ",
        )
        .await
        .unwrap();
        assert_eq!(feed.uri, "at://did:plc:abc/app.bsky.feed.generator/cats");
        assert_eq!(feed.name, "cats");
    }

    #[tokio::test]
    async fn test_feed_from_did_url_needs_no_network() {
        let client = XrpcClient::public("http://127.0.0.1:9");
        let feed = feed_from_input(
            &client,
            "https://bsky.app/profile/did:plc:abc/feed/cats",
        )
        .await
        .unwrap();
        assert_eq!(feed.uri, "at://did:plc:abc/app.bsky.feed.generator/cats");
    }

    #[tokio::test]
    async fn test_feed_from_garbage_is_an_error() {
        let client = XrpcClient::public("http://127.0.0.1:9");
        assert!(feed_from_input(&client, "not a feed").await.is_err());
    }
}
