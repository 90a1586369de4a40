//! Timestamped JSON archives.

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Local-time stamp used in archive file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub fn timestamp() -> String {
    Local::now().format(FILE_TIMESTAMP_FORMAT).to_string()
}

/// Filename-safe feed name: alphanumerics, spaces, `_` and `-`, at most 40 chars.
pub fn safe_feed_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let cleaned: String = cleaned.trim().replace(' ', "_").chars().take(40).collect();
    if cleaned.is_empty() {
        "feed".to_string()
    } else {
        cleaned
    }
}

/// Filename-safe search query: alphanumerics, spaces and `_`, at most 30 chars.
pub fn safe_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_'))
        .collect();
    cleaned.trim_end().replace(' ', "_").chars().take(30).collect()
}

pub fn handle_slug(handle: &str) -> String {
    handle.replace('.', "_")
}

/// Where an archive goes and how it is formatted.
#[derive(Debug, Clone)]
pub struct Archive {
    dir: PathBuf,
    file_name: String,
    indent: usize,
}

impl Archive {
    /// `<dir>/<prefix>_<timestamp>.json`, two-space indent.
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            dir: dir.into(),
            file_name: format!("{}_{}.json", prefix, timestamp()),
            indent: 2,
        }
    }

    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Write `items` as pretty JSON, creating the directory if needed.
    /// Nothing is written for an empty collection.
    pub fn save<T: Serialize>(&self, items: &[T]) -> Result<Option<PathBuf>> {
        if items.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))?;

        let path = self.path();
        info!("Saving {} posts to '{}'...", items.len(), path.display());
        write_pretty(&path, items, self.indent)?;

        Ok(Some(path))
    }
}

fn write_pretty<T: Serialize>(path: &Path, items: &[T], indent: usize) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let indent = " ".repeat(indent);
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = Serializer::with_formatter(&mut writer, formatter);
    items
        .serialize(&mut serializer)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;

    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    #[test]
    fn test_safe_feed_name() {
        assert_eq!(safe_feed_name("Science & Tech!"), "Science__Tech");
        assert_eq!(safe_feed_name("  what's-hot "), "whats-hot");
        assert_eq!(safe_feed_name("???"), "feed");
        assert_eq!(safe_feed_name(&"a".repeat(60)).len(), 40);
    }

    #[test]
    fn test_safe_query() {
        assert_eq!(safe_query("\"climate change\" -bitcoin"), "climate_change_bitcoin");
        assert_eq!(safe_query(&"word ".repeat(20)).len(), 30);
    }

    #[test]
    fn test_handle_slug() {
        assert_eq!(handle_slug("nasa.bsky.social"), "nasa_bsky_social");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, FILE_TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_save_writes_pretty_unicode_json() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().join("feed_model"), "feed_science");
        let items = vec![json!({"post": {"record": {"text": "caf\u{e9} \u{1f98b}"}}, "comments": []})];

        let path = archive.save(&items).unwrap().unwrap();
        assert!(path.starts_with(dir.path().join("feed_model")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("feed_science_") && name.ends_with(".json"));

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("caf\u{e9} \u{1f98b}"));
        assert!(written.contains("\n  {\n    \"post\""));
        let parsed: Vec<Value> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, items);
    }

    #[test]
    fn test_save_keeps_server_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), "posts_alice_test");
        let raw = r#"{"post":{"uri":"at://did:plc:a/app.bsky.feed.post/1","cid":"bafy","author":{"handle":"alice.test"}},"reply":null}"#;
        let mut item: Value = serde_json::from_str(raw).unwrap();
        crate::post::init_comments(&mut item);

        let path = archive.save(&[item]).unwrap().unwrap();
        let written = fs::read_to_string(path).unwrap();

        let at = |key: &str| written.find(&format!("\"{}\"", key)).unwrap();
        assert!(at("post") < at("reply"));
        assert!(at("reply") < at("comments"));
        assert!(at("uri") < at("cid"));
        assert!(at("cid") < at("author"));
    }

    #[test]
    fn test_save_with_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path(), "Trends_bluesky").indent(4);
        let path = archive.save(&[json!({"a": 1})]).unwrap().unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert_eq!(written, "[\n    {\n        \"a\": 1\n    }\n]\n");
    }

    #[test]
    fn test_save_skips_empty_collections() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path().join("never"), "posts_x");
        assert!(archive.save::<Value>(&[]).unwrap().is_none());
        assert!(!dir.path().join("never").exists());
    }
}
