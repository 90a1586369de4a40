//! Endpoint wrappers: where posts and feeds come from.

use crate::filter::TimeWindow;
use crate::paginate::{Page, PageRequest, Paginator, PAGE_DELAY};
use crate::post;
use crate::session::XrpcClient;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// The "What's Hot Classic" feed generator.
pub const WHATS_HOT_FEED_URI: &str =
    "at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.generator/whats-hot";

const ACTOR_SEARCH_LIMIT: usize = 25;

// API Response types
#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

#[derive(Debug, Default, Deserialize)]
struct FeedGeneratorsResponse {
    #[serde(default)]
    feeds: Vec<FeedGenerator>,
}

#[derive(Debug, Default, Deserialize)]
struct ActorsResponse {
    #[serde(default)]
    actors: Vec<Actor>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedGenerator {
    pub uri: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub creator: Option<Actor>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Actor {
    pub handle: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    Top,
    Latest,
}

impl fmt::Display for SearchSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchSort::Top => f.write_str("top"),
            SearchSort::Latest => f.write_str("latest"),
        }
    }
}

async fn fetch_page(
    client: &XrpcClient,
    endpoint: &str,
    list_key: &str,
    params: &[(&str, String)],
    request: PageRequest,
) -> Result<Page> {
    let mut query = params.to_vec();
    query.push(("limit", request.limit.to_string()));
    if let Some(cursor) = request.cursor {
        query.push(("cursor", cursor));
    }

    let body = client
        .get(endpoint, &query)
        .await
        .with_context(|| format!("Failed to fetch {}", endpoint))?;

    Ok(Page::from_response(body, list_key))
}

fn with_comments(mut items: Vec<Value>) -> Vec<Value> {
    items.iter_mut().for_each(post::init_comments);
    items
}

/// Posts from a feed generator, up to `max`.
pub async fn get_feed(client: &XrpcClient, feed_uri: &str, max: usize) -> Vec<Value> {
    let posts = get_feed_raw(client, feed_uri, max, PAGE_DELAY).await;
    with_comments(posts)
}

/// Feed posts exactly as the server returns them, without a `comments` array.
pub async fn get_feed_raw(
    client: &XrpcClient,
    feed_uri: &str,
    max: usize,
    delay: Duration,
) -> Vec<Value> {
    info!("Fetching up to {} posts from feed: {}", max, feed_uri);
    let params = [("feed", feed_uri.to_string())];
    Paginator::new()
        .max(Some(max))
        .delay(delay)
        .run(|req| fetch_page(client, "app.bsky.feed.getFeed", "feed", &params, req))
        .await
}

/// Posts from the What's Hot feed.
pub async fn whats_hot(client: &XrpcClient, max: usize) -> Vec<Value> {
    get_feed(client, WHATS_HOT_FEED_URI, max).await
}

/// A user's timeline, newest first, restricted to `window`.
pub async fn get_author_feed(
    client: &XrpcClient,
    actor: &str,
    window: TimeWindow,
    max: Option<usize>,
) -> Vec<Value> {
    info!("Fetching posts for @{}...", actor);
    let params = [("actor", actor.to_string())];
    let posts = Paginator::new()
        .window(window)
        .max(max)
        .run(|req| fetch_page(client, "app.bsky.feed.getAuthorFeed", "feed", &params, req))
        .await;
    with_comments(posts)
}

pub async fn search_posts(
    client: &XrpcClient,
    query: &str,
    sort: SearchSort,
    max: usize,
) -> Vec<Value> {
    info!(
        "Searching for posts with query: '{}' (sorted by {}), up to {} posts",
        query, sort, max
    );
    let params = [("q", query.to_string()), ("sort", sort.to_string())];
    let posts = Paginator::new()
        .max(Some(max))
        .run(|req| fetch_page(client, "app.bsky.feed.searchPosts", "posts", &params, req))
        .await;
    with_comments(posts)
}

pub async fn popular_feeds(client: &XrpcClient) -> Vec<FeedGenerator> {
    info!("Discovering popular feeds...");
    let response =
        list::<FeedGeneratorsResponse>(client, "app.bsky.unspecced.getPopularFeedGenerators", &[])
            .await;
    match response {
        Ok(response) => response.feeds,
        Err(e) => {
            warn!("Could not fetch popular feeds: {:#}", e);
            Vec::new()
        }
    }
}

pub async fn feeds_by_actor(client: &XrpcClient, actor: &str) -> Vec<FeedGenerator> {
    info!("Fetching all feeds created by @{}...", actor);
    let params = [("actor", actor.to_string())];
    match list::<FeedGeneratorsResponse>(client, "app.bsky.feed.getActorFeeds", &params).await {
        Ok(response) => response.feeds,
        Err(e) => {
            warn!("Could not fetch feeds for {}: {:#}", actor, e);
            Vec::new()
        }
    }
}

pub async fn search_actors(client: &XrpcClient, query: &str) -> Vec<Actor> {
    info!("Searching for users matching '{}'...", query);
    let params = [
        ("q", query.to_string()),
        ("limit", ACTOR_SEARCH_LIMIT.to_string()),
    ];
    match list::<ActorsResponse>(client, "app.bsky.actor.searchActors", &params).await {
        Ok(response) => response.actors,
        Err(e) => {
            warn!("An error occurred during search: {:#}", e);
            Vec::new()
        }
    }
}

/// Resolve a Bluesky handle to a DID
pub async fn resolve_handle(client: &XrpcClient, handle: &str) -> Result<String> {
    if handle.starts_with("did:") {
        return Ok(handle.to_string());
    }

    let body = client
        .get(
            "com.atproto.identity.resolveHandle",
            &[("handle", handle.to_string())],
        )
        .await
        .context("Failed to resolve handle")?;
    let response: ResolveHandleResponse =
        serde_json::from_value(body).context("Failed to parse resolveHandle response")?;

    Ok(response.did)
}

async fn list<T>(client: &XrpcClient, endpoint: &str, params: &[(&str, String)]) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let body = client.get(endpoint, params).await?;
    if body.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(body).with_context(|| format!("Failed to parse {} response", endpoint))
}
