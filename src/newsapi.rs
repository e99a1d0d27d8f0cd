use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Default news API host
pub const DEFAULT_HOST: &str = "https://newsapi.org";

/// Default country the headlines are scoped to
pub const DEFAULT_COUNTRY: &str = "IN";

/// A single article as returned by the news API.
///
/// Only the fields the cache keeps are deserialized; the API occasionally
/// returns null for either of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopHeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Trait defining the news retrieval operations required by the ingestion job
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Fetch the current top headlines, optionally scoped to a category
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be decoded
    async fn top_headlines(&self, category: Option<&str>) -> Result<Vec<Article>>;
}

/// News API client over HTTP
pub struct NewsApiClient {
    client: Client,
    host: String,
    api_key: String,
    country: String,
}

impl NewsApiClient {
    /// Creates a new client for the given host, API key and country
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            host: host.into(),
            api_key: api_key.into(),
            country: country.into(),
        }
    }
}

#[async_trait]
impl NewsFeed for NewsApiClient {
    #[instrument(skip(self), fields(country = %self.country))]
    async fn top_headlines(&self, category: Option<&str>) -> Result<Vec<Article>> {
        let mut url = format!(
            "{}/v2/top-headlines?country={}&apiKey={}",
            self.host, self.country, self.api_key
        );
        if let Some(category) = category {
            url.push_str("&category=");
            url.push_str(category);
        }

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::NewsFeedError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::NewsFeedError(format!(
                "news API returned {}",
                response.status()
            )));
        }

        let body: TopHeadlinesResponse = response
            .json()
            .await
            .map_err(|e| Error::NewsFeedError(e.to_string()))?;

        debug!(articles = body.articles.len(), "Top headlines fetched");
        Ok(body.articles)
    }
}
