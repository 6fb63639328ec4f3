// src/ingest/fetch.rs
//! Page transport used by sources: real HTTP, or in-memory fixtures.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::CollectError;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent reddit expects from feed readers.
pub const REDDIT_USER_AGENT: &str = "RSS Reader 1.0 by /u/algor512";

#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, CollectError>;
}

/// Per-source transport overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transport {
    pub user_agent: Option<String>,
    /// Negotiate HTTP/1.1 only (some hosts reject HTTP/2 clients).
    pub http1_only: bool,
}

impl Transport {
    /// Defaults for a feed url: reddit gets its own agent and HTTP/1.1.
    pub fn for_url(url: &str) -> Self {
        if url.contains("reddit.com") {
            Self {
                user_agent: Some(REDDIT_USER_AGENT.to_string()),
                http1_only: true,
            }
        } else {
            Self::default()
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(transport: &Transport) -> Result<Self, CollectError> {
        let mut builder = reqwest::Client::builder().timeout(FETCH_TIMEOUT);
        if let Some(agent) = &transport.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        if transport.http1_only {
            builder = builder.http1_only();
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, CollectError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| CollectError::Fetch {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CollectError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|source| CollectError::Fetch {
            url: url.to_string(),
            source,
        })
    }
}

/// Serves canned bodies by url and remembers every request.
#[derive(Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    /// Urls requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        match self.requests.lock() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }
}

#[async_trait::async_trait]
impl Fetch for FixtureFetcher {
    async fn get_text(&self, url: &str) -> Result<String, CollectError> {
        match self.requests.lock() {
            Ok(mut g) => g.push(url.to_string()),
            Err(poison) => poison.into_inner().push(url.to_string()),
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| CollectError::MissingFixture(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reddit_gets_custom_transport() {
        let t = Transport::for_url("https://www.reddit.com/r/rust/.rss");
        assert_eq!(t.user_agent.as_deref(), Some(REDDIT_USER_AGENT));
        assert!(t.http1_only);
        assert_eq!(Transport::for_url("https://blog.rust-lang.org/feed.xml"), Transport::default());
    }

    #[tokio::test]
    async fn fixture_fetcher_records_requests() {
        let f = FixtureFetcher::new().with_page("https://a.test/1", "one");
        assert_eq!(f.get_text("https://a.test/1").await.unwrap(), "one");
        assert!(matches!(
            f.get_text("https://a.test/2").await,
            Err(CollectError::MissingFixture(_))
        ));
        assert_eq!(f.requests(), vec!["https://a.test/1", "https://a.test/2"]);
    }
}
