//! Cursor pagination over list-style XRPC endpoints.

use crate::filter::TimeWindow;
use crate::post;
use anyhow::Result;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Largest page the list endpoints accept.
pub const PAGE_SIZE: usize = 100;
/// Pause between page requests.
pub const PAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub cursor: Option<String>,
}

impl Page {
    /// Take the list under `key` and the `cursor` from a response body.
    /// A missing list is an empty page; an empty cursor is no cursor.
    pub fn from_response(body: Value, key: &str) -> Self {
        let Value::Object(mut body) = body else {
            return Self::default();
        };
        let items = match body.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let cursor = body
            .get("cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_owned);
        Self { items, cursor }
    }
}

/// Drives a page-fetching function until the listing is exhausted.
///
/// Without a [`TimeWindow`], pages are sized to never overshoot `max`.
/// With one, pages are always [`PAGE_SIZE`] and each item is checked
/// against the window: items older than the start end pagination, since
/// timelines are newest-first.
#[derive(Debug, Clone)]
pub struct Paginator {
    max: Option<usize>,
    window: Option<TimeWindow>,
    delay: Duration,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new()
    }
}

enum Admit {
    Continue,
    Stop,
}

impl Paginator {
    pub fn new() -> Self {
        Self {
            max: None,
            window: None,
            delay: PAGE_DELAY,
        }
    }

    pub fn max(mut self, max: Option<usize>) -> Self {
        self.max = max;
        self
    }

    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn next_limit(&self, collected: usize) -> usize {
        match (self.window, self.max) {
            (None, Some(max)) => PAGE_SIZE.min(max.saturating_sub(collected)),
            _ if self.max.is_some_and(|max| collected >= max) => 0,
            _ => PAGE_SIZE,
        }
    }

    fn admit(&self, window: &TimeWindow, item: Value, collected: &mut Vec<Value>) -> Admit {
        let Some(created_at) = post::created_at(&item) else {
            return Admit::Continue;
        };

        if window.contains(created_at) {
            collected.push(item);
            if self.max.is_some_and(|max| collected.len() >= max) {
                info!("Reached requested number of posts.");
                return Admit::Stop;
            }
        } else if window.is_before(created_at) {
            info!("Reached posts older than start time. Stopping.");
            return Admit::Stop;
        }
        Admit::Continue
    }

    /// Collect items. Errors stop pagination and keep what was collected.
    pub async fn run<F, Fut>(&self, mut fetch: F) -> Vec<Value>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page>>,
    {
        let mut collected: Vec<Value> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let limit = self.next_limit(collected.len());
            if limit == 0 {
                break;
            }

            let page = match fetch(PageRequest {
                cursor: cursor.clone(),
                limit,
            })
            .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!("An error occurred during fetching: {:#}", e);
                    break;
                }
            };

            if page.items.is_empty() {
                info!("No more posts found. Halting.");
                break;
            }

            let fetched = page.items.len();
            match &self.window {
                Some(window) => {
                    for item in page.items {
                        if let Admit::Stop = self.admit(window, item, &mut collected) {
                            return collected;
                        }
                    }
                }
                None => {
                    collected.extend(page.items);
                    if let Some(max) = self.max {
                        collected.truncate(max);
                    }
                }
            }

            info!("   Fetched {} posts. Total so far: {}", fetched, collected.len());

            cursor = page.cursor;
            if cursor.is_none() {
                info!("Reached the end of the listing.");
                break;
            }

            tokio::time::sleep(self.delay).await;
        }

        collected
    }
}
