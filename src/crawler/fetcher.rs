//! HTTP page fetcher with rate limiting
//!
//! Issues exactly one GET per call with a bounded timeout:
//! - process-wide rate limiting with governor
//! - browser-like headers with User-Agent rotation
//! - charset detection from the Content-Type header
//!
//! Retries are the caller's decision (see [`crate::utils::retry`]).

use crate::utils::error::FetchError;
use encoding_rs::{Encoding, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    Client, Response,
};
use std::num::NonZeroU32;
use std::time::Duration;


/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Page fetcher shared by all workers of a run
pub struct PageFetcher {
    /// HTTP client with compression and cookies
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Fixed User-Agent overriding the rotation pool
    user_agent: Option<String>,
}

impl PageFetcher {
    /// Create a new fetcher rotating through the User-Agent pool
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(requests_per_second, None)
    }

    /// Create a new fetcher with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(
        requests_per_second: u32,
        user_agent: Option<String>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().gzip(true).cookie_store(true).build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            user_agent,
        })
    }

    /// Issue a single GET and return the decoded body
    ///
    /// # Errors
    ///
    /// - `FetchError::InvalidUrl` if the URL does not parse
    /// - `FetchError::Timeout` if no response arrives within `timeout`
    /// - `FetchError::Status` for any non-2xx response
    /// - `FetchError::Http` for connection and body errors
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        self.rate_limiter.until_ready().await;

        tracing::debug!(url = %parsed, timeout_secs = timeout.as_secs(), "Fetching page");

        let response = self
            .client
            .get(parsed)
            .headers(self.build_headers())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        self.decode_response(response).await
    }

    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await.map_err(classify)?;

        self.decode_bytes(&bytes, &content_type)
    }

    /// Decode bytes using the charset from Content-Type, defaulting to UTF-8
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Decode` if the bytes are invalid for the charset
    pub fn decode_bytes(&self, bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
        let encoding = charset_label(content_type)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);

        let (cow, _encoding, had_errors) = encoding.decode(bytes);

        if had_errors {
            return Err(FetchError::Decode(format!(
                "{} decoding errors",
                encoding.name()
            )));
        }

        Ok(cow.into_owned())
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let agent = match &self.user_agent {
            Some(ua) => HeaderValue::from_str(ua).ok(),
            None => None,
        };
        headers.insert(
            USER_AGENT,
            agent.unwrap_or_else(|| HeaderValue::from_static(self.random_user_agent())),
        );

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-IN,en;q=0.9,en-US;q=0.8"),
        );

        headers
    }

    /// Get a random user agent from the pool
    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(e)
    }
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_lowercase())
}
