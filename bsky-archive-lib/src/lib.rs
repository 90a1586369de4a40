//! Library for archiving Bluesky posts with their comment threads
//!
//! This library handles:
//! - Creating and refreshing an XRPC session (or using the public API)
//! - Paginating feeds, author timelines and post search
//! - Fetching each post's reply tree through a bounded worker pool
//! - Filtering by time window and language
//! - Writing the result as a timestamped JSON archive
//!
//! Posts are kept as the raw JSON the server returns, with `comments` and
//! `post_url` fields added.

pub mod config;
pub mod error;
pub mod filter;
pub mod links;
pub mod output;
pub mod paginate;
pub mod post;
pub mod session;
pub mod sources;
pub mod thread;

pub use config::Config;
pub use error::ApiError;
pub use filter::{DateWindow, TimeWindow};
pub use output::Archive;
pub use session::{Credentials, XrpcClient};
pub use sources::{Actor, FeedGenerator, SearchSort};
pub use thread::EnrichOptions;
