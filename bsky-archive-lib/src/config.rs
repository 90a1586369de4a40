use crate::session::{Credentials, AUTH_HOST, PUBLIC_HOST};
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::debug;

/// Settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub public_host: String,
    pub output_root: PathBuf,
}

/// Load `.env` from the working directory (or a parent) into the process
/// environment. Variables already set are left alone.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            host: AUTH_HOST.to_string(),
            public_host: PUBLIC_HOST.to_string(),
            output_root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Read `BSKY_USERNAME`, `BSKY_PASSWORD`, `BSKY_HOST`,
    /// `BSKY_PUBLIC_HOST` and `BSKY_OUTPUT_ROOT`. Call [`load_dotenv`] first
    /// for `.env` values to be seen.
    pub fn from_env() -> Self {
        let config = Self::from_vars(|key| std::env::var(key).ok());
        debug!(
            "Config: host={} public_host={} output_root={}",
            config.host,
            config.public_host,
            config.output_root.display()
        );
        config
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            username: non_empty("BSKY_USERNAME"),
            password: non_empty("BSKY_PASSWORD"),
            host: non_empty("BSKY_HOST").unwrap_or(defaults.host),
            public_host: non_empty("BSKY_PUBLIC_HOST").unwrap_or(defaults.public_host),
            output_root: non_empty("BSKY_OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_root),
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials::new(username, password)),
            _ => Err(anyhow!(
                "BSKY_USERNAME and BSKY_PASSWORD must be set (or use --public)"
            )),
        }
    }
}
