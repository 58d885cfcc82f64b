use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::{EntityConfig, FetchConfig};
use crate::error::{FetchError, SourceError};
use crate::feed;
use crate::news::{self, NewsItem};

const USER_AGENT: &str = "PolicyTracker/1.0 (RSS Dashboard)";

/// A per-source failure shown next to the entity's headlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWarning {
    pub entity: String,
    pub source: String,
    pub message: String,
}

/// Headlines for one entity plus any sources that failed along the way.
#[derive(Debug, Clone)]
pub struct EntityNews {
    pub entity: String,
    pub items: Vec<NewsItem>,
    pub warnings: Vec<SourceWarning>,
}

pub struct Fetcher {
    client: Client,
    retry_delay: Duration,
    max_items_per_feed: usize,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            retry_delay: config.retry_delay(),
            max_items_per_feed: config.max_items_per_feed,
        })
    }

    /// GET `url`, retrying exactly once after a timeout.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        match self.fetch_once(url).await {
            Err(e) if e.is_timeout() => {
                warn!("Timed out fetching {}, retrying in {:?}", url, self.retry_delay);
                tokio::time::sleep(self.retry_delay).await;
                self.fetch_once(url).await.map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout { attempts: 2 }
                    } else {
                        e
                    }
                })
            }
            result => result,
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }

    /// Fetch and parse one feed, tagging every item with `entity`.
    pub async fn fetch_source(
        &self,
        entity: &str,
        url: &str,
    ) -> Result<Vec<NewsItem>, SourceError> {
        info!("Fetching feed for {} ({})", entity, url);

        let bytes = self.fetch(url).await?;
        let entries = feed::parse_items(&bytes, self.max_items_per_feed)?;

        Ok(entries
            .into_iter()
            .map(|entry| NewsItem::from_entry(entry, entity))
            .collect())
    }

    /// Run the fetch, parse and filter pipeline for one entity.
    ///
    /// A single-feed entity keeps feed order. An entity with several feeds
    /// gets the merged list sorted by raw date string. Failed sources are
    /// reported as warnings and do not affect the others.
    pub async fn entity_news(
        &self,
        entity: &EntityConfig,
        keyword: &str,
        limit: usize,
    ) -> EntityNews {
        let urls = entity.feed_urls();
        let mut per_source = Vec::with_capacity(urls.len());
        let mut warnings = Vec::new();

        for url in &urls {
            match self.fetch_source(&entity.name, url).await {
                Ok(items) => per_source.push(news::filter_by_keyword(items, keyword)),
                Err(e) => {
                    warn!("Failed to load feed for '{}' ({}): {}", entity.name, url, e);
                    warnings.push(SourceWarning {
                        entity: entity.name.clone(),
                        source: url.clone(),
                        message: format!("Could not load news for {}: {}", entity.name, e),
                    });
                }
            }
        }

        let items = if urls.len() > 1 {
            news::aggregate(per_source, limit)
        } else {
            let mut items: Vec<NewsItem> = per_source.into_iter().flatten().collect();
            items.truncate(limit);
            items
        };

        info!(
            "Collected {} items for '{}' ({} warnings)",
            items.len(),
            entity.name,
            warnings.len()
        );

        EntityNews {
            entity: entity.name.clone(),
            items,
            warnings,
        }
    }

    /// Entities are processed one after another, in the order given.
    pub async fn collect(
        &self,
        entities: &[&EntityConfig],
        keyword: &str,
        limit: usize,
    ) -> Vec<EntityNews> {
        let mut sections = Vec::with_capacity(entities.len());
        for entity in entities {
            sections.push(self.entity_news(entity, keyword, limit).await);
        }
        sections
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { attempts: 1 }
    } else if let Some(status) = err.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Transport(err.to_string())
    }
}
