//! Web context search.
//!
//! [`HttpContextSearch`] speaks the Google Programmable Search (Custom
//! Search JSON) API: `GET /customsearch/v1?key=..&cx=..&q=..&num=..`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::providers::ApiKey;
use crate::providers::http;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// The API refuses `num` above 10.
const MAX_RESULTS: usize = 10;

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    /// 1-based position in the result list.
    pub rank: usize,
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub link: String,
}

/// Fetches short web snippets for a query.
#[async_trait]
pub trait ContextSearch: Send + Sync {
    /// Up to `limit` snippets, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchSnippet>>;
}

/// Google Custom Search client.
#[derive(Debug, Clone)]
pub struct HttpContextSearch {
    api_key: ApiKey,
    engine_id: String,
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpContextSearch {
    pub fn new(api_key: impl Into<ApiKey>, engine_id: impl Into<String>) -> Self {
        Self::with_base_url(api_key, engine_id, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        api_key: impl Into<ApiKey>,
        engine_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            http: http::client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ContextSearch for HttpContextSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchSnippet>> {
        let limit = limit.clamp(1, MAX_RESULTS);
        let key = self.api_key.resolve("search")?;
        let num = limit.to_string();
        let response = self
            .http
            .get(format!("{}/customsearch/v1", self.base_url))
            .query(&[
                ("key", key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| http::send_error(e, self.timeout))?;
        let response = http::check_status(response, "customsearch").await?;
        let body: SearchResponse = http::json(response).await?;
        Ok(rank(body.items, limit))
    }
}

fn rank(items: Vec<SearchItem>, limit: usize) -> Vec<SearchSnippet> {
    items
        .into_iter()
        .filter(|item| !item.snippet.trim().is_empty())
        .take(limit)
        .enumerate()
        .map(|(i, item)| SearchSnippet {
            rank: i + 1,
            title: item.title,
            snippet: item.snippet.split_whitespace().collect::<Vec<_>>().join(" "),
            link: item.link,
        })
        .collect()
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, snippet: &str) -> SearchItem {
        SearchItem {
            title: title.into(),
            snippet: snippet.into(),
            link: String::new(),
        }
    }

    #[test]
    fn ranks_skip_empty_snippets_and_collapse_whitespace() {
        let ranked = rank(
            vec![
                item("a", ""),
                item("b", "Mobile\n wallet   app"),
                item("c", "Bank"),
                item("d", "extra"),
            ],
            2,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].title, "b");
        assert_eq!(ranked[0].snippet, "Mobile wallet app");
        assert_eq!(ranked[1].title, "c");
    }
}
