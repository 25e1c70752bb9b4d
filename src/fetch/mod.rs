//! Plain-HTTP transport.
//!
//! [`PageFetcher`] is the seam between the pipeline and the network: the
//! production [`HttpFetcher`] speaks reqwest, tests substitute a fixture
//! map. Failures never escape this layer as errors; every failed request
//! becomes a `None` slot so batch results stay aligned with their URLs.

pub mod render;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches page bodies. One failed URL must not fail its batch, so both
/// methods map failures to `None` instead of returning errors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one URL. Any failure (connect, status, body read) is `None`.
    async fn fetch(&self, url: &str) -> Option<String>;

    /// Fetches a batch concurrently. The result aligns index-for-index with
    /// `urls`, failed slots holding `None`.
    async fn fetch_batch(&self, urls: &[String]) -> Vec<Option<String>> {
        join_all(urls.iter().map(|url| self.fetch(url))).await
    }
}

/// Production fetcher over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    verbose: bool,
}

impl HttpFetcher {
    /// Builds a client for one site. API sites exchange JSON; HTML sites get
    /// a browser-like user agent only.
    pub fn new(accepts_json: bool, verbose: bool) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        if accepts_json {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, verbose })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("GET {} failed: {}", url, e);
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            warn!("GET {} returned {}", url, status);
            return None;
        }
        match response.text().await {
            Ok(body) => {
                if self.verbose {
                    debug!("GET {} -> {} bytes: {}", url, body.len(), preview(&body));
                }
                Some(body)
            }
            Err(e) => {
                warn!("GET {} body read failed: {}", url, e);
                None
            }
        }
    }
}

/// Politeness pause between page boundaries and secondary rounds. The delay
/// is a floor, not a target, so this is a plain uncancellable sleep.
pub async fn pause(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    debug!("pausing {}ms before next request round", delay.as_millis());
    tokio::time::sleep(delay).await;
}

/// First few hundred characters of a payload, for verbose logs.
pub fn preview(body: &str) -> String {
    const LIMIT: usize = 400;
    if body.chars().count() <= LIMIT {
        return body.to_string();
    }
    let head: String = body.chars().take(LIMIT).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Option<String> {
            self.0.get(url).cloned()
        }
    }

    #[tokio::test]
    async fn batch_results_align_with_urls() {
        let mut bodies = HashMap::new();
        bodies.insert("a".to_string(), "body-a".to_string());
        bodies.insert("c".to_string(), "body-c".to_string());
        let fetcher = MapFetcher(bodies);

        let urls = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = fetcher.fetch_batch(&urls).await;

        assert_eq!(
            results,
            vec![
                Some("body-a".to_string()),
                None,
                Some("body-c".to_string()),
            ]
        );
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let shown = preview(&body);
        assert!(shown.len() < body.len());
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
