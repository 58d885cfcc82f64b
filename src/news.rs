use crate::feed::FeedEntry;
use crate::sentiment::Sentiment;

/// A headline ready for rendering. Built fresh on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published: String,
    pub entity: String,
    pub sentiment: Option<Sentiment>,
    pub image_url: Option<String>,
}

impl NewsItem {
    pub fn from_entry(entry: FeedEntry, entity: &str) -> Self {
        Self {
            title: entry.title,
            link: entry.link,
            published: entry.published,
            entity: entity.to_string(),
            sentiment: None,
            image_url: entry.image_url,
        }
    }
}

/// Case-insensitive substring test against the title only.
/// A blank keyword matches everything.
pub fn matches_keyword(title: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    keyword.is_empty() || title.to_lowercase().contains(&keyword.to_lowercase())
}

/// Drop items whose title does not contain `keyword`, keeping feed order.
pub fn filter_by_keyword(items: Vec<NewsItem>, keyword: &str) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| matches_keyword(&item.title, keyword))
        .collect()
}

/// Keyword filter followed by truncation to `limit`.
pub fn filter_and_limit(items: Vec<NewsItem>, keyword: &str, limit: usize) -> Vec<NewsItem> {
    let mut items = filter_by_keyword(items, keyword);
    items.truncate(limit);
    items
}

/// Order merged multi-source results by the raw `published` text, descending.
///
/// This compares strings, not dates: "Mon, 9 Dec" sorts after "Mon, 10 Dec"
/// and weekday names dominate the comparison. Feeds rarely share one date
/// format, so the result is only chronological by accident. Equal strings
/// keep their merge order.
pub fn sort_by_published_desc(items: &mut [NewsItem]) {
    items.sort_by(|a, b| b.published.cmp(&a.published));
}

/// Merge per-source results, sort by raw date string and truncate.
pub fn aggregate(sources: Vec<Vec<NewsItem>>, limit: usize) -> Vec<NewsItem> {
    let mut merged: Vec<NewsItem> = sources.into_iter().flatten().collect();
    sort_by_published_desc(&mut merged);
    merged.truncate(limit);
    merged
}
