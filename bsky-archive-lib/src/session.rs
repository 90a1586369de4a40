//! Bearer-token session against an XRPC host.
//!
//! An [`XrpcClient`] is either authenticated, holding an access/refresh token
//! pair minted by `com.atproto.server.createSession`, or public, talking to
//! the unauthenticated AppView host. Clones share the token state, so a
//! refresh performed by one worker is picked up by every other.

use crate::error::ApiError;
use crate::links::clean_input;
use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default host for authenticated requests.
pub const AUTH_HOST: &str = "https://bsky.social";
/// Default host for unauthenticated requests.
pub const PUBLIC_HOST: &str = "https://public.api.bsky.app";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const SESSION_TIMEOUT: Duration = Duration::from_secs(15);

/// Login identifier (handle or email) and app password.
#[derive(Debug, Clone)]
pub struct Credentials {
    identifier: String,
    password: String,
}

impl Credentials {
    pub fn new(identifier: &str, password: &str) -> Self {
        Self {
            identifier: clean_input(identifier),
            password: clean_input(password),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[derive(Debug, Default, Deserialize)]
struct SessionResponse {
    #[serde(rename = "accessJwt")]
    access_jwt: Option<String>,
    #[serde(rename = "refreshJwt")]
    refresh_jwt: Option<String>,
    did: Option<String>,
    handle: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Tokens {
    access_jwt: Option<String>,
    refresh_jwt: Option<String>,
}

impl Tokens {
    fn is_active(&self) -> bool {
        self.access_jwt.is_some()
    }
}

#[derive(Debug)]
struct Auth {
    tokens: RwLock<Tokens>,
    // Held for the whole refresh round-trip so concurrent workers that all
    // saw `ExpiredToken` spend the refresh token only once.
    refreshing: tokio::sync::Mutex<()>,
}

impl Auth {
    fn access_jwt(&self) -> Option<String> {
        self.tokens.read().access_jwt.clone()
    }
}

#[derive(Debug, Clone)]
pub struct XrpcClient {
    http: reqwest::Client,
    host: String,
    auth: Option<Arc<Auth>>,
}

impl XrpcClient {
    /// A client for the unauthenticated public API.
    pub fn public(host: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.trim_end_matches('/').to_string(),
            auth: None,
        }
    }

    /// Create a session with `createSession` and return an authenticated client.
    pub async fn login(host: &str, credentials: &Credentials) -> Result<Self> {
        let host = host.trim_end_matches('/').to_string();
        let http = reqwest::Client::new();

        info!("Attempting to create a session...");

        let response = http
            .post(format!("{}/xrpc/com.atproto.server.createSession", host))
            .json(&json!({
                "identifier": credentials.identifier,
                "password": credentials.password,
            }))
            .timeout(SESSION_TIMEOUT)
            .send()
            .await
            .context("Network error while creating session")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read session response")?;
        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &body))
                .context("Failed to create session");
        }

        let session: SessionResponse =
            serde_json::from_str(&body).context("Failed to parse session response")?;
        if session.access_jwt.is_none() {
            return Err(anyhow!("Session response did not contain an access token"));
        }

        info!(
            "Session created successfully for handle: {} ({})",
            session
                .handle
                .as_deref()
                .unwrap_or(credentials.identifier()),
            session.did.as_deref().unwrap_or("unknown DID")
        );

        Ok(Self {
            http,
            host,
            auth: Some(Arc::new(Auth {
                tokens: RwLock::new(Tokens {
                    access_jwt: session.access_jwt,
                    refresh_jwt: session.refresh_jwt,
                }),
                refreshing: tokio::sync::Mutex::new(()),
            })),
        })
    }

    /// Mint a new access token with the refresh token. The caller holds
    /// `auth.refreshing`.
    ///
    /// The refresh token is only replaced when the server sends a new one.
    /// On failure the session is deactivated and later requests fail with
    /// [`ApiError::Inactive`].
    async fn refresh_locked(&self, auth: &Auth) -> Result<(), ApiError> {
        warn!("Access token expired or invalid. Attempting refresh...");

        let refresh_jwt = auth.tokens.read().refresh_jwt.clone();
        let Some(refresh_jwt) = refresh_jwt else {
            warn!("No refresh token available. Cannot refresh session.");
            auth.tokens.write().access_jwt = None;
            return Err(ApiError::Inactive);
        };

        match self.request_refresh(&refresh_jwt).await {
            Ok(session) => {
                let mut tokens = auth.tokens.write();
                tokens.access_jwt = session.access_jwt;
                if session.refresh_jwt.is_some() {
                    tokens.refresh_jwt = session.refresh_jwt;
                }
                if !tokens.is_active() {
                    return Err(ApiError::Inactive);
                }
                info!("Session refreshed successfully.");
                Ok(())
            }
            Err(err) => {
                warn!("Failed to refresh session: {}", err);
                auth.tokens.write().access_jwt = None;
                Err(err)
            }
        }
    }

    async fn request_refresh(&self, refresh_jwt: &str) -> Result<SessionResponse, ApiError> {
        let response = self
            .http
            .post(format!("{}/xrpc/com.atproto.server.refreshSession", self.host))
            .bearer_auth(refresh_jwt)
            .timeout(SESSION_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    /// `GET {host}/xrpc/{endpoint}` with the given query parameters.
    ///
    /// An expired access token is refreshed and the identical request is
    /// re-issued exactly once.
    pub async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let Some(auth) = &self.auth else {
            return self.send(endpoint, params, None).await;
        };

        let used = auth.access_jwt().ok_or(ApiError::Inactive)?;
        match self.send(endpoint, params, Some(&used)).await {
            Err(err) if err.is_expired_token() => {
                {
                    let _refreshing = auth.refreshing.lock().await;
                    // Another worker may have refreshed while this request was in flight.
                    if auth.access_jwt().as_deref() == Some(used.as_str())
                        && self.refresh_locked(auth).await.is_err()
                    {
                        return Err(err);
                    }
                }
                let current = auth.access_jwt().ok_or(ApiError::Inactive)?;
                self.send(endpoint, params, Some(&current)).await
            }
            other => other,
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        access_jwt: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut request = self
            .http
            .get(format!("{}/xrpc/{}", self.host, endpoint))
            .query(params)
            .timeout(REQUEST_TIMEOUT);

        if let Some(access_jwt) = access_jwt {
            request = request.bearer_auth(access_jwt);
        }

        debug!(endpoint, "GET");

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        Ok(parse_body(&body))
    }
}

/// Empty bodies become `null`; bodies that are not JSON become `{}`.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::Object(Map::new()))
}
