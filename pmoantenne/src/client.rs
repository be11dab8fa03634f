//! HTTP client for the antenne.de now-playing API
//!
//! One call to [`AntenneClient::now_playing`] is one logical request: transient
//! failures (connection errors, timeouts, 5xx and 429 answers) are retried a
//! bounded number of times with exponential backoff before the error is
//! returned to the caller.
//!
//! # Example
//!
//! ```no_run
//! use pmoantenne::AntenneClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AntenneClient::new()?;
//!
//!     for entry in client.now_playing().await? {
//!         println!("{}: {:?} - {:?}", entry.mountpoint, entry.artist, entry.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::models::{NowPlayingResponse, StationEntry};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Default now-playing endpoint
pub const DEFAULT_NOW_PLAYING_URL: &str = "https://www.antenne.de/api/metadata/now";

/// Default timeout for one HTTP attempt (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Upper bound for a single backoff delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "PMOTracker/0.1.0 (pmoantenne)";

/// Exponential backoff between retries
///
/// The first delay is the base delay, each following one doubles, capped at
/// [`MAX_BACKOFF`].
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: None,
        }
    }

    pub fn reset(&mut self) {
        self.current = None;
    }

    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            Some(current) => current.saturating_mul(2),
            None => self.base,
        }
        .min(MAX_BACKOFF);
        self.current = Some(next);
        next
    }
}

/// antenne.de now-playing client
///
/// The underlying `reqwest::Client` is kept for the lifetime of the value, so
/// repeated polls reuse pooled connections.
#[derive(Debug, Clone)]
pub struct AntenneClient {
    client: Client,
    url: Url,
    timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl AntenneClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The endpoint this client polls
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fetch every station entry currently published by the endpoint
    ///
    /// Retries transient failures up to `max_retries` times. A non-200 status,
    /// a transport failure after the last retry, or a body that is not shaped
    /// like `{"data": [...]}` is returned as an error.
    pub async fn now_playing(&self) -> Result<Vec<StationEntry>> {
        let mut backoff = Backoff::new(self.backoff_base);
        let mut attempt = 0;

        loop {
            match self.request_once().await {
                Ok(entries) => return Ok(entries),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Now-playing request failed: {err}, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request_once(&self) -> Result<Vec<StationEntry>> {
        tracing::trace!("Fetching now playing: {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::ApiError { status });
        }

        let body = response.bytes().await?;
        let parsed: NowPlayingResponse = serde_json::from_slice(&body)?;

        tracing::trace!("Received {} station entries", parsed.data.len());

        Ok(parsed.data)
    }
}

/// Builder for configuring an AntenneClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    url: String,
    timeout: Duration,
    user_agent: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            url: DEFAULT_NOW_PLAYING_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the now-playing endpoint URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the timeout of a single attempt
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the number of retries after the first attempt
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay before the first retry
    pub fn backoff_base(mut self, delay: Duration) -> Self {
        self.backoff_base = delay;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AntenneClient> {
        let url = Url::parse(&self.url)?;

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?,
        };

        Ok(AntenneClient {
            client,
            url,
            timeout: self.timeout,
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
        })
    }
}
