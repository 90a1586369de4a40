//! Comment-thread enrichment.
//!
//! Each post's reply tree is fetched two levels deep and flattened into
//! `{"post": ..., "replies": [...]}` comments on the item's `comments`
//! array. Fetches run through a bounded pool; output order matches input.

use crate::post;
use crate::session::XrpcClient;
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::future::Future;
use tracing::{debug, warn};

/// Comments plus their direct replies.
pub const THREAD_DEPTH: u32 = 2;
pub const MAX_COMMENTS_PER_POST: usize = 150;
pub const MAX_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichOptions {
    pub workers: usize,
    pub max_comments: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            workers: MAX_WORKERS,
            max_comments: MAX_COMMENTS_PER_POST,
        }
    }
}

/// Fetch a post's thread. Failures are logged and yield `None`.
pub async fn get_post_thread(client: &XrpcClient, uri: &str) -> Option<Value> {
    let params = [("uri", uri.to_string()), ("depth", THREAD_DEPTH.to_string())];
    match client.get("app.bsky.feed.getPostThread", &params).await {
        Ok(Value::Object(mut body)) => Some(
            body.remove("thread")
                .unwrap_or_else(|| Value::Object(Map::new())),
        ),
        Ok(_) => None,
        Err(e) => {
            warn!("Error fetching thread for {}: {}", uri, e);
            None
        }
    }
}

/// Reshape a thread into at most `max_comments` comments, each with the
/// posts of its direct replies. Blocked or missing posts become `{}`.
pub fn reshape_thread(thread: &Value, max_comments: usize) -> Vec<Value> {
    let Some(replies) = thread.get("replies").and_then(Value::as_array) else {
        return Vec::new();
    };

    replies
        .iter()
        .take(max_comments)
        .map(|comment| {
            let nested: Vec<Value> = comment
                .get("replies")
                .and_then(Value::as_array)
                .map(|replies| replies.iter().map(post_or_empty).collect())
                .unwrap_or_default();
            json!({
                "post": post_or_empty(comment),
                "replies": nested,
            })
        })
        .collect()
}

fn post_or_empty(thread: &Value) -> Value {
    thread
        .get("post")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn attach_comments(item: &mut Value, comments: Vec<Value>) {
    post::init_comments(item);
    if let Some(Value::Array(existing)) = item.get_mut("comments") {
        existing.extend(comments);
    }
}

/// Fetch and attach comments for every item using the XRPC client.
pub async fn enrich_posts<P>(
    client: &XrpcClient,
    items: Vec<Value>,
    options: EnrichOptions,
    on_done: P,
) -> Vec<Value>
where
    P: Fn(),
{
    let fetch = |uri: String| async move { get_post_thread(client, &uri).await };
    enrich_with(items, options, fetch, on_done).await
}

/// Bounded-concurrency enrichment over any thread fetcher.
///
/// At most `options.workers` fetches are in flight; `on_done` runs once per
/// item as it completes. Items without a URI pass through untouched.
pub async fn enrich_with<F, Fut, P>(
    items: Vec<Value>,
    options: EnrichOptions,
    fetch: F,
    on_done: P,
) -> Vec<Value>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<Value>>,
    P: Fn(),
{
    let fetch = &fetch;
    let on_done = &on_done;

    stream::iter(items)
        .map(|mut item| async move {
            if let Some(uri) = post::uri(&item).map(str::to_owned) {
                debug!(
                    "Fetching comments for post: {}",
                    uri.rsplit('/').next().unwrap_or(&uri)
                );
                if let Some(thread) = fetch(uri).await {
                    attach_comments(&mut item, reshape_thread(&thread, options.max_comments));
                }
            }
            on_done();
            item
        })
        .buffered(options.workers.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::time::Duration;

    fn sample_thread() -> Value {
        json!({
            "post": {"uri": "at://did:plc:a/app.bsky.feed.post/root"},
            "replies": [
                {
                    "post": {"uri": "c1"},
                    "replies": [
                        {"post": {"uri": "r1"}},
                        {"$type": "app.bsky.feed.defs#blockedPost", "uri": "r2"}
                    ]
                },
                {"post": {"uri": "c2"}},
                {"$type": "app.bsky.feed.defs#notFoundPost", "uri": "c3"}
            ]
        })
    }

    #[test]
    fn test_reshape_thread() {
        let comments = reshape_thread(&sample_thread(), 150);
        assert_eq!(
            comments,
            vec![
                json!({"post": {"uri": "c1"}, "replies": [{"uri": "r1"}, {}]}),
                json!({"post": {"uri": "c2"}, "replies": []}),
                json!({"post": {}, "replies": []}),
            ]
        );
    }

    #[test]
    fn test_reshape_thread_caps_comments() {
        assert_eq!(reshape_thread(&sample_thread(), 1).len(), 1);
        assert!(reshape_thread(&json!({"post": {}}), 150).is_empty());
    }

    #[tokio::test]
    async fn test_enrich_preserves_order_and_bounds_concurrency() {
        let items: Vec<Value> = (0..12)
            .map(|i| json!({"post": {"uri": format!("at://did:plc:a/app.bsky.feed.post/{}", i)}, "comments": []}))
            .collect();

        let in_flight = Cell::new(0usize);
        let peak = Cell::new(0usize);
        let done = Cell::new(0usize);

        let enriched = enrich_with(
            items,
            EnrichOptions {
                workers: 3,
                max_comments: 150,
            },
            |uri| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    in_flight.set(in_flight.get() + 1);
                    peak.set(peak.get().max(in_flight.get()));
                    let n: u64 = uri.rsplit('/').next().unwrap().parse().unwrap();
                    // Later items finish first.
                    tokio::time::sleep(Duration::from_millis(24 - 2 * n)).await;
                    in_flight.set(in_flight.get() - 1);
                    Some(json!({"replies": [{"post": {"uri": format!("{}/c", uri)}}]}))
                }
            },
            || done.set(done.get() + 1),
        )
        .await;

        assert_eq!(done.get(), 12);
        assert!(peak.get() <= 3);
        for (i, item) in enriched.iter().enumerate() {
            assert_eq!(
                item["comments"][0]["post"]["uri"],
                format!("at://did:plc:a/app.bsky.feed.post/{}/c", i)
            );
        }
    }

    #[tokio::test]
    async fn test_enrich_handles_search_shape_and_failures() {
        let items = vec![
            json!({"uri": "at://did:plc:a/app.bsky.feed.post/ok", "comments": []}),
            json!({"uri": "at://did:plc:a/app.bsky.feed.post/fail", "comments": []}),
            json!({"post": {}, "comments": []}),
        ];

        let enriched = enrich_with(
            items,
            EnrichOptions::default(),
            |uri| async move {
                if uri.ends_with("ok") {
                    Some(sample_thread())
                } else {
                    None
                }
            },
            || {},
        )
        .await;

        assert_eq!(enriched[0]["comments"].as_array().unwrap().len(), 3);
        assert_eq!(enriched[1]["comments"], json!([]));
        assert_eq!(enriched[2], json!({"post": {}, "comments": []}));
    }
}
