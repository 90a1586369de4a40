use crate::post;
use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::Value;

/// Drop non-printable characters (controls, zero-width and bidi marks,
/// non-breaking spaces) that sneak in when pasting from a browser, then trim.
pub fn clean_input(input: &str) -> String {
    input
        .chars()
        .filter(|&c| is_printable(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_printable(c: char) -> bool {
    if c.is_control() {
        return false;
    }
    if c.is_whitespace() && c != ' ' {
        return false;
    }
    !matches!(
        c,
        '\u{00ad}'
            | '\u{200b}'..='\u{200f}'
            | '\u{202a}'..='\u{202e}'
            | '\u{2060}'..='\u{2064}'
            | '\u{feff}'
    )
}

/// Convert at://did:plc:xxx/app.bsky.feed.post/yyy to https://bsky.app/profile/handle/post/yyy
pub fn post_url(handle: &str, at_uri: &str) -> String {
    let post_id = at_uri.rsplit('/').next().unwrap_or("");
    format!("https://bsky.app/profile/{}/post/{}", handle, post_id)
}

/// Add a clickable `post_url` to every item that has both an author handle
/// and a URI.
pub fn inject_post_urls(items: &mut [Value]) {
    for item in items.iter_mut() {
        let url = match (post::author_handle(item), post::uri(item)) {
            (Some(handle), Some(uri)) => post_url(handle, uri),
            _ => continue,
        };
        if let Some(view) = post::view_mut(item) {
            view.insert("post_url".to_string(), Value::String(url));
        }
    }
}

/// Find the first at:// URI in the provided text.
pub fn extract_at_uri(text: &str) -> Option<String> {
    let re = Regex::new(r"at://[^\s/]+(?:/[^\s/]+)*").ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}

/// Parse a Bluesky feed URL and extract the creator and the feed's record key.
///
/// # Example
/// ```
/// use bsky_archive_lib::links::parse_feed_url;
/// let (actor, rkey) = parse_feed_url("https://bsky.app/profile/bsky.app/feed/whats-hot").unwrap();
/// assert_eq!(actor, "bsky.app");
/// assert_eq!(rkey, "whats-hot");
/// ```
pub fn parse_feed_url(url: &str) -> Result<(String, String)> {
    let url = url.trim_end_matches('/');
    let url = url.split(['?', '#']).next().unwrap_or(url);

    let parts: Vec<&str> = url.split('/').collect();

    let profile_idx = parts
        .iter()
        .position(|&p| p == "profile")
        .ok_or_else(|| anyhow!("Invalid Bluesky feed URL: missing 'profile' segment"))?;
    let feed_idx = parts
        .iter()
        .position(|&p| p == "feed")
        .ok_or_else(|| anyhow!("Invalid Bluesky feed URL: missing 'feed' segment"))?;

    if profile_idx + 1 >= parts.len() || feed_idx + 1 >= parts.len() {
        return Err(anyhow!("Invalid Bluesky feed URL: incomplete path"));
    }

    let actor = urlencoding::decode(parts[profile_idx + 1])
        .map_err(|_| anyhow!("Invalid Bluesky feed URL: bad percent-encoding"))?
        .into_owned();
    let rkey = parts[feed_idx + 1].to_string();

    Ok((actor, rkey))
}

/// Build the AT URI of a feed generator record.
pub fn feed_generator_uri(did: &str, rkey: &str) -> String {
    format!("at://{}/app.bsky.feed.generator/{}", did, rkey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_input() {
        assert_eq!(clean_input("  nasa.bsky.social\n"), "nasa.bsky.social");
        assert_eq!(clean_input("\u{200b}nasa\u{feff}.bsky.social"), "nasa.bsky.social");
        assert_eq!(clean_input("two words\t"), "two words");
        assert_eq!(clean_input("caf\u{e9}"), "caf\u{e9}");
    }

    #[test]
    fn test_post_url() {
        let url = post_url(
            "alice.bsky.social",
            "at://did:plc:abc/app.bsky.feed.post/3kxyz",
        );
        assert_eq!(url, "https://bsky.app/profile/alice.bsky.social/post/3kxyz");
    }

    #[test]
    fn test_inject_post_urls_both_shapes() {
        let mut items = vec![
            json!({"post": {"uri": "at://did:plc:a/app.bsky.feed.post/1", "author": {"handle": "a.test"}}}),
            json!({"uri": "at://did:plc:b/app.bsky.feed.post/2", "author": {"handle": "b.test"}}),
            json!({"post": {"uri": "at://did:plc:c/app.bsky.feed.post/3", "author": {}}}),
        ];
        inject_post_urls(&mut items);

        assert_eq!(
            items[0]["post"]["post_url"],
            "https://bsky.app/profile/a.test/post/1"
        );
        assert_eq!(items[1]["post_url"], "https://bsky.app/profile/b.test/post/2");
        assert!(items[2]["post"].get("post_url").is_none());
    }

    #[test]
    fn test_extract_at_uri() {
        let text = "feed is at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.generator/whats-hot ok";
        assert_eq!(
            extract_at_uri(text).as_deref(),
            Some("at://did:plc:z72i7hdynmk6r22z27h6tvur/app.bsky.feed.generator/whats-hot")
        );
        assert_eq!(extract_at_uri("https://bsky.app/profile/x"), None);
        assert_eq!(extract_at_uri(""), None);
    }

    #[test]
    fn test_parse_feed_url_with_query() {
        let (actor, rkey) =
            parse_feed_url("https://bsky.app/profile/did%3Aplc%3Aabc/feed/science?ref=share").unwrap();
        assert_eq!(actor, "did:plc:abc");
        assert_eq!(rkey, "science");
    }

    #[test]
    fn test_parse_feed_url_rejects_post_url() {
        assert!(parse_feed_url("https://bsky.app/profile/user.bsky.social/post/abc123").is_err());
        assert!(parse_feed_url("https://bsky.app/profile/user.bsky.social/feed").is_err());
    }

    #[test]
    fn test_feed_generator_uri() {
        assert_eq!(
            feed_generator_uri("did:plc:abc", "science"),
            "at://did:plc:abc/app.bsky.feed.generator/science"
        );
    }
}
