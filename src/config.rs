use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound of the article-count slider.
pub const MAX_ARTICLE_COUNT: usize = 15;

const GOOGLE_NEWS_SEARCH: &str = "https://news.google.com/rss/search";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Auto-refresh interval in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Number of automatic reloads before the page stops refreshing itself
    #[serde(default = "default_max_refresh_rounds")]
    pub max_refresh_rounds: u32,
    #[serde(default = "default_article_count")]
    pub default_article_count: usize,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default = "default_subscribers_path")]
    pub subscribers_path: PathBuf,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub comments: CommentsConfig,
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub videos: Vec<VideoConfig>,
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_max_refresh_rounds() -> u32 {
    10
}

fn default_article_count() -> usize {
    5
}

fn default_subscribers_path() -> PathBuf {
    PathBuf::from("subscribers.csv")
}

fn default_database_url() -> String {
    "sqlite:policy_tracker.db?mode=rwc".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Pause before the single re-attempt after a timeout
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    /// Items extracted per feed document before the parser stops
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: usize,
}

fn default_timeout_secs() -> f64 {
    10.0
}

fn default_retry_delay_secs() -> f64 {
    1.0
}

fn default_max_items_per_feed() -> usize {
    50
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_items_per_feed: default_max_items_per_feed(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub feeds: Vec<String>,
    /// Google News search query, expanded into a search feed URL
    #[serde(default)]
    pub query: Option<String>,
}

impl EntityConfig {
    /// All feed URLs for this entity, the search feed first.
    pub fn feed_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(self.feeds.len() + 1);
        if let Some(query) = self.query.as_deref().filter(|q| !q.trim().is_empty()) {
            urls.push(google_news_url(query));
        }
        urls.extend(self.feeds.iter().cloned());
        urls
    }
}

pub fn google_news_url(query: &str) -> String {
    match url::Url::parse_with_params(
        GOOGLE_NEWS_SEARCH,
        &[
            ("q", query.trim()),
            ("hl", "en-US"),
            ("gl", "US"),
            ("ceid", "US:en"),
        ],
    ) {
        Ok(url) => url.to_string(),
        Err(_) => GOOGLE_NEWS_SEARCH.to_string(),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    pub entity: String,
    pub title: String,
    pub embed_url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommentBackend {
    #[default]
    Sqlite,
    Firebase,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommentsConfig {
    #[serde(default)]
    pub backend: CommentBackend,
    /// Realtime Database URL, required by the firebase backend
    #[serde(default)]
    pub database_url: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_ARTICLE_COUNT).contains(&self.default_article_count) {
            anyhow::bail!(
                "default_article_count must be between 1 and {}",
                MAX_ARTICLE_COUNT
            );
        }
        // NaN, infinities and out-of-range values would panic in Duration::from_secs_f64
        let timeout_ok = Duration::try_from_secs_f64(self.fetch.timeout_secs)
            .map(|d| !d.is_zero())
            .unwrap_or(false);
        let retry_ok = Duration::try_from_secs_f64(self.fetch.retry_delay_secs).is_ok();
        if !timeout_ok || !retry_ok {
            anyhow::bail!("fetch timeout must be positive and retry delay non-negative");
        }

        let mut seen = HashSet::new();
        for entity in &self.entities {
            if !seen.insert(entity.name.as_str()) {
                anyhow::bail!("entity '{}' is configured more than once", entity.name);
            }
            if entity.feed_urls().is_empty() {
                anyhow::bail!("entity '{}' has no feeds and no query", entity.name);
            }
        }

        if self.comments.backend == CommentBackend::Firebase
            && self.comments.database_url.is_none()
        {
            anyhow::bail!("comments.database_url is required for the firebase backend");
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// Service-account credentials for the remote comment store.
#[derive(Deserialize, Clone)]
pub struct ServiceAccount {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_x509_cert_url: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("private_key_id", &"<redacted>")
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Secret stores often keep the PEM on one line with literal `\n`.
    fn normalize(mut self) -> Self {
        self.private_key = self.private_key.replace("\\n", "\n");
        self
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Secrets {
    #[serde(default)]
    pub firebase: Option<ServiceAccount>,
}

impl Secrets {
    /// Reads `path` if it exists, otherwise falls back to the
    /// `FIREBASE_SERVICE_ACCOUNT` environment variable holding the JSON key.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            return Self::from_str(&content);
        }
        match std::env::var("FIREBASE_SERVICE_ACCOUNT") {
            Ok(json) => Self::from_service_account_json(&json),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let secrets: Secrets = toml::from_str(content)?;
        Ok(Self {
            firebase: secrets.firebase.map(ServiceAccount::normalize),
        })
    }

    pub fn from_service_account_json(json: &str) -> anyhow::Result<Self> {
        let account: ServiceAccount = serde_json::from_str(json)?;
        Ok(Self {
            firebase: Some(account.normalize()),
        })
    }
}
