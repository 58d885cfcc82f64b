use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::comments::{self, Comment, CommentStore};
use crate::config::{Config, EntityConfig, VideoConfig, MAX_ARTICLE_COUNT};
use crate::error::SubmitError;
use crate::fetcher::{EntityNews, Fetcher, SourceWarning};
use crate::news::NewsItem;
use crate::sentiment::{self, SentimentSummary, WordCount};
use crate::subscribers::SubscriberStore;

const WORD_CLOUD_SIZE: usize = 50;

pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<Fetcher>,
    pub subscribers: Arc<SubscriberStore>,
    pub comments: Arc<dyn CommentStore>,
}

/// All dashboard routes, without static files or tracing layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/news", get(news))
        .route("/videos", get(videos))
        .route("/forum", get(forum).post(post_forum))
        .route("/reports", get(reports))
        .route("/subscribe", post(subscribe))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    News,
    Videos,
    Forum,
    Reports,
}

impl Page {
    pub fn path(&self) -> &'static str {
        match self {
            Page::News => "/news",
            Page::Videos => "/videos",
            Page::Forum => "/forum",
            Page::Reports => "/reports",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Page::News => "News",
            Page::Videos => "Videos",
            Page::Forum => "Forum",
            Page::Reports => "AI Reports",
        }
    }
}

const PAGES: [Page; 4] = [Page::News, Page::Videos, Page::Forum, Page::Reports];

/// Sidebar state decoded from the query string.
///
/// Entities arrive as repeated `entity=` pairs from the multi-select, so the
/// query is read as raw pairs rather than a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub entities: Vec<String>,
    pub keyword: String,
    pub count: usize,
    pub round: u32,
}

impl Selection {
    pub fn from_pairs(config: &Config, pairs: &[(String, String)]) -> Self {
        let mut entities: Vec<String> = Vec::new();
        let mut keyword = String::new();
        let mut count = config.default_article_count;
        let mut round = 0;

        for (key, value) in pairs {
            match key.as_str() {
                "entity" => {
                    if config.entity(value).is_some() && !entities.contains(value) {
                        entities.push(value.clone());
                    }
                }
                "keyword" => keyword = value.trim().to_string(),
                "count" => {
                    if let Ok(n) = value.trim().parse::<usize>() {
                        count = n.clamp(1, MAX_ARTICLE_COUNT);
                    }
                }
                "round" => round = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }

        if entities.is_empty() {
            entities = config.entities.iter().map(|e| e.name.clone()).collect();
        }

        Self {
            entities,
            keyword,
            count,
            round,
        }
    }

    /// Query string reproducing this selection, with an optional round.
    pub fn query_string(&self, round: Option<u32>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for entity in &self.entities {
            query.append_pair("entity", entity);
        }
        if !self.keyword.is_empty() {
            query.append_pair("keyword", &self.keyword);
        }
        query.append_pair("count", &self.count.to_string());
        if let Some(round) = round {
            query.append_pair("round", &round.to_string());
        }
        query.finish()
    }
}

pub struct EntityOption {
    pub name: String,
    pub selected: bool,
}

pub struct PageLink {
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

pub struct Sidebar {
    pub entities: Vec<EntityOption>,
    pub keyword: String,
    pub count: usize,
    pub max_count: usize,
    pub pages: Vec<PageLink>,
    pub action: &'static str,
}

impl Sidebar {
    fn new(config: &Config, selection: &Selection, active: Page) -> Self {
        let query = selection.query_string(None);
        Self {
            entities: config
                .entities
                .iter()
                .map(|e| EntityOption {
                    name: e.name.clone(),
                    selected: selection.entities.contains(&e.name),
                })
                .collect(),
            keyword: selection.keyword.clone(),
            count: selection.count,
            max_count: MAX_ARTICLE_COUNT,
            pages: PAGES
                .iter()
                .map(|page| PageLink {
                    label: page.label(),
                    href: format!("{}?{}", page.path(), query),
                    active: *page == active,
                })
                .collect(),
            action: active.path(),
        }
    }
}

pub struct Refresh {
    pub interval_secs: u64,
    pub next_url: String,
    pub round: u32,
    pub max_rounds: u32,
}

// Template structs
#[derive(Template)]
#[template(path = "news.html")]
pub struct NewsTemplate {
    pub sidebar: Sidebar,
    pub sections: Vec<EntityNews>,
    pub refresh: Option<Refresh>,
    pub updated_at: String,
}

pub struct VideoGroup {
    pub entity: String,
    pub videos: Vec<VideoConfig>,
}

#[derive(Template)]
#[template(path = "videos.html")]
pub struct VideosTemplate {
    pub sidebar: Sidebar,
    pub groups: Vec<VideoGroup>,
}

#[derive(Template)]
#[template(path = "forum.html")]
pub struct ForumTemplate {
    pub sidebar: Sidebar,
    pub comments: Vec<Comment>,
    pub warning: Option<String>,
    pub username: String,
    pub comment: String,
}

#[derive(Template)]
#[template(path = "reports.html")]
pub struct ReportsTemplate {
    pub sidebar: Sidebar,
    pub items: Vec<NewsItem>,
    pub summary: SentimentSummary,
    pub words: Vec<WordCount>,
    pub warnings: Vec<SourceWarning>,
}

#[derive(Template)]
#[template(path = "subscribe_status.html")]
pub struct SubscribeStatusTemplate {
    pub warning: Option<String>,
    pub success: Option<String>,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

fn selected_entities<'a>(config: &'a Config, selection: &Selection) -> Vec<&'a EntityConfig> {
    selection
        .entities
        .iter()
        .filter_map(|name| config.entity(name))
        .collect()
}

// Route handlers
pub async fn index() -> Redirect {
    Redirect::to(Page::News.path())
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let config = &state.config;
    let selection = Selection::from_pairs(config, &pairs);

    let entities = selected_entities(config, &selection);
    let sections = state
        .fetcher
        .collect(&entities, &selection.keyword, selection.count)
        .await;

    let refresh = (selection.round < config.max_refresh_rounds).then(|| Refresh {
        interval_secs: config.refresh_interval_secs,
        next_url: format!(
            "{}?{}",
            Page::News.path(),
            selection.query_string(Some(selection.round + 1))
        ),
        round: selection.round,
        max_rounds: config.max_refresh_rounds,
    });

    Ok(HtmlTemplate(NewsTemplate {
        sidebar: Sidebar::new(config, &selection, Page::News),
        sections,
        refresh,
        updated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    }))
}

pub async fn videos(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let config = &state.config;
    let selection = Selection::from_pairs(config, &pairs);

    let groups = selection
        .entities
        .iter()
        .map(|entity| VideoGroup {
            entity: entity.clone(),
            videos: config
                .videos
                .iter()
                .filter(|v| &v.entity == entity)
                .cloned()
                .collect(),
        })
        .collect();

    Ok(HtmlTemplate(VideosTemplate {
        sidebar: Sidebar::new(config, &selection, Page::Videos),
        groups,
    }))
}

pub async fn forum(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let selection = Selection::from_pairs(&state.config, &pairs);
    let comments = state.comments.list().await?;

    Ok(HtmlTemplate(ForumTemplate {
        sidebar: Sidebar::new(&state.config, &selection, Page::Forum),
        comments,
        warning: None,
        username: String::new(),
        comment: String::new(),
    }))
}

/// Last value submitted for `key`, or empty.
fn form_value(pairs: &[(String, String)], key: &str) -> String {
    pairs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

/// The comment form also carries the sidebar selection as hidden fields,
/// so it is read as raw pairs like the page queries.
pub async fn post_forum(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let selection = Selection::from_pairs(&state.config, &pairs);
    let username = form_value(&pairs, "username");
    let comment = form_value(&pairs, "comment");

    match comments::post_comment(state.comments.as_ref(), &username, &comment).await {
        Ok(_) => {
            let location = format!("{}?{}", Page::Forum.path(), selection.query_string(None));
            Ok(Redirect::to(&location).into_response())
        }
        Err(SubmitError::Invalid(invalid)) => {
            let comments = state.comments.list().await?;
            Ok(HtmlTemplate(ForumTemplate {
                sidebar: Sidebar::new(&state.config, &selection, Page::Forum),
                comments,
                warning: Some(invalid.to_string()),
                username,
                comment,
            })
            .into_response())
        }
        Err(SubmitError::Store(e)) => Err(AppError(e)),
    }
}

pub async fn reports(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let config = &state.config;
    let selection = Selection::from_pairs(config, &pairs);

    let entities = selected_entities(config, &selection);
    let sections = state
        .fetcher
        .collect(&entities, &selection.keyword, selection.count)
        .await;

    let mut items = Vec::new();
    let mut warnings = Vec::new();
    for section in sections {
        items.extend(section.items);
        warnings.extend(section.warnings);
    }
    sentiment::annotate(&mut items);

    let summary = SentimentSummary::from_items(&items);
    let words = sentiment::word_frequencies(items.iter().map(|i| i.title.as_str()), WORD_CLOUD_SIZE);

    Ok(HtmlTemplate(ReportsTemplate {
        sidebar: Sidebar::new(config, &selection, Page::Reports),
        items,
        summary,
        words,
        warnings,
    }))
}

#[derive(Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub email: String,
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SubscribeForm>,
) -> Result<impl IntoResponse, AppError> {
    let status = match state.subscribers.subscribe(&form.email).await {
        Ok(()) => SubscribeStatusTemplate {
            warning: None,
            success: Some("Subscribed! You're on the list for the daily newsletter.".to_string()),
        },
        Err(SubmitError::Invalid(invalid)) => SubscribeStatusTemplate {
            warning: Some(invalid.to_string()),
            success: None,
        },
        Err(SubmitError::Store(e)) => return Err(AppError(e)),
    };
    Ok(HtmlTemplate(status))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::db::Database;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel><title>Test</title>
            <item><title>Don Davis wins election</title><link>https://news.example.com/1</link><pubDate>Tue, 05 Nov 2024 20:00:00 GMT</pubDate></item>
            <item><title>Weather update</title><link>https://news.example.com/2</link><pubDate>Tue, 05 Nov 2024 18:00:00 GMT</pubDate></item>
            <item><title>davis speaks on budget crisis</title><link>https://news.example.com/3</link><pubDate>Tue, 05 Nov 2024 16:00:00 GMT</pubDate></item>
        </channel></rss>"#;

    struct TestApp {
        app: Router,
        db: Arc<Database>,
        subscribers: Arc<SubscriberStore>,
        _dir: tempfile::TempDir,
    }

    fn test_config(feed_base: &str) -> Config {
        Config {
            refresh_interval_secs: 60,
            max_refresh_rounds: 2,
            default_article_count: 5,
            fetch: FetchConfig {
                timeout_secs: 0.5,
                retry_delay_secs: 0.01,
                max_items_per_feed: 50,
            },
            subscribers_path: "unused.csv".into(),
            database_url: "sqlite::memory:".to_string(),
            comments: Default::default(),
            entities: vec![
                EntityConfig {
                    name: "Don Davis".to_string(),
                    feeds: vec![format!("{}/davis", feed_base)],
                    query: None,
                },
                EntityConfig {
                    name: "Broken Source".to_string(),
                    feeds: vec![format!("{}/broken", feed_base)],
                    query: None,
                },
            ],
            videos: vec![VideoConfig {
                entity: "Don Davis".to_string(),
                title: "Town hall".to_string(),
                embed_url: "https://www.youtube.com/embed/xyz".to_string(),
            }],
        }
    }

    async fn create_test_app(feed_base: &str) -> TestApp {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        let db = Arc::new(db);

        let dir = tempfile::tempdir().unwrap();
        let subscribers = Arc::new(SubscriberStore::new(dir.path().join("subscribers.csv")));

        let config = test_config(feed_base);
        let fetcher = Arc::new(Fetcher::new(&config.fetch).unwrap());
        let state = Arc::new(AppState {
            config: Arc::new(config),
            fetcher,
            subscribers: subscribers.clone(),
            comments: db.clone(),
        });

        TestApp {
            app: router(state),
            db,
            subscribers,
            _dir: dir,
        }
    }

    async fn feed_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/davis"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        server
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn post_form(app: Router, uri: &str, form: &str) -> Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn test_health_endpoint() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (status, body) = get(t.app, "/health").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "OK");
        }

        #[tokio::test]
        async fn test_index_redirects_to_news() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let response = t
                .app
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers()[header::LOCATION], "/news");
        }
    }

    mod selection_tests {
        use super::*;

        fn pairs(raw: &str) -> Vec<(String, String)> {
            serde_urlencoded::from_str(raw).unwrap()
        }

        #[test]
        fn test_defaults_select_all_entities() {
            let config = test_config("http://localhost");
            let selection = Selection::from_pairs(&config, &[]);

            assert_eq!(selection.entities, vec!["Don Davis", "Broken Source"]);
            assert_eq!(selection.keyword, "");
            assert_eq!(selection.count, 5);
            assert_eq!(selection.round, 0);
        }

        #[test]
        fn test_repeated_entities_and_unknowns() {
            let config = test_config("http://localhost");
            let selection = Selection::from_pairs(
                &config,
                &pairs("entity=Broken+Source&entity=Nobody&entity=Don+Davis&entity=Don+Davis"),
            );

            assert_eq!(selection.entities, vec!["Broken Source", "Don Davis"]);
        }

        #[test]
        fn test_count_clamped_to_slider_bounds() {
            let config = test_config("http://localhost");

            assert_eq!(Selection::from_pairs(&config, &pairs("count=0")).count, 1);
            assert_eq!(Selection::from_pairs(&config, &pairs("count=99")).count, 15);
            assert_eq!(Selection::from_pairs(&config, &pairs("count=7")).count, 7);
            assert_eq!(Selection::from_pairs(&config, &pairs("count=abc")).count, 5);
        }

        #[test]
        fn test_query_string_round_trip() {
            let config = test_config("http://localhost");
            let selection =
                Selection::from_pairs(&config, &pairs("entity=Don+Davis&keyword=vote&count=3"));

            let query = selection.query_string(Some(4));
            assert_eq!(query, "entity=Don+Davis&keyword=vote&count=3&round=4");

            let again = Selection::from_pairs(&config, &pairs(&query));
            assert_eq!(again.entities, selection.entities);
            assert_eq!(again.round, 4);
        }
    }

    mod news_tests {
        use super::*;

        #[tokio::test]
        async fn test_script_links_not_rendered() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/davis"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"<rss><channel><item>
                        <title>Click me</title>
                        <link>javascript:alert(document.cookie)</link>
                        <enclosure url="javascript:alert(2)" type="image/png"/>
                    </item></channel></rss>"#,
                ))
                .mount(&server)
                .await;
            let t = create_test_app(&server.uri()).await;

            let (status, body) = get(t.app, "/news?entity=Don+Davis").await;

            assert_eq!(status, StatusCode::OK);
            assert!(body.contains("Click me"));
            assert!(!body.contains("javascript:"));
            assert!(body.contains("placeholder.svg"));
        }

        #[tokio::test]
        async fn test_news_filters_by_keyword() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (status, body) = get(t.app, "/news?entity=Don+Davis&keyword=Davis").await;

            assert_eq!(status, StatusCode::OK);
            assert!(body.contains("Don Davis wins election"));
            assert!(body.contains("davis speaks on budget crisis"));
            assert!(!body.contains("Weather update"));
        }

        #[tokio::test]
        async fn test_news_respects_count() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (_, body) = get(t.app, "/news?entity=Don+Davis&count=1").await;

            assert!(body.contains("Don Davis wins election"));
            assert!(!body.contains("Weather update"));
        }

        #[tokio::test]
        async fn test_failed_source_shows_warning_only_for_that_entity() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (status, body) = get(t.app, "/news").await;

            assert_eq!(status, StatusCode::OK);
            assert!(body.contains("Could not load news for Broken Source"));
            assert!(body.contains("Don Davis wins election"));
        }

        #[tokio::test]
        async fn test_auto_refresh_until_round_cap() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (_, body) = get(t.app.clone(), "/news?entity=Don+Davis&round=1").await;
            assert!(body.contains("http-equiv=\"refresh\""));
            assert!(body.contains("round=2"));

            let (_, body) = get(t.app, "/news?entity=Don+Davis&round=2").await;
            assert!(!body.contains("http-equiv=\"refresh\""));
        }
    }

    mod videos_tests {
        use super::*;

        #[tokio::test]
        async fn test_videos_for_selected_entity() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (status, body) = get(t.app, "/videos?entity=Don+Davis").await;

            assert_eq!(status, StatusCode::OK);
            assert!(body.contains("Town hall"));
            assert!(body.contains("youtube.com"));
        }

        #[tokio::test]
        async fn test_videos_empty_entity() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (status, body) = get(t.app, "/videos?entity=Broken+Source").await;

            assert_eq!(status, StatusCode::OK);
            assert!(!body.contains("Town hall"));
            assert!(body.contains("No videos"));
        }
    }

    mod forum_tests {
        use super::*;

        #[tokio::test]
        async fn test_post_comment_redirects_and_lists() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let response =
                post_form(t.app.clone(), "/forum", "username=voter&comment=Great+tracker").await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(
                response.headers()[header::LOCATION],
                "/forum?entity=Don+Davis&entity=Broken+Source&count=5"
            );

            let (_, body) = get(t.app, "/forum").await;
            assert!(body.contains("voter"));
            assert!(body.contains("Great tracker"));
            assert_eq!(t.db.get_comment_count().await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_selection_survives_comment_post() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;
            let selection = "entity=Don+Davis&keyword=vote&count=3";

            let response = post_form(
                t.app.clone(),
                "/forum",
                &format!("{}&username=voter&comment=", selection),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_string(response).await;
            assert!(body.contains("Please enter a comment."));
            assert!(body.contains("entity=Don+Davis&amp;keyword=vote&amp;count=3"));
            assert!(body.contains(r#"<input type="hidden" name="keyword" value="vote">"#));

            let response = post_form(
                t.app,
                "/forum",
                &format!("{}&username=voter&comment=Hi", selection),
            )
            .await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(
                response.headers()[header::LOCATION],
                format!("/forum?{}", selection)
            );
        }

        #[tokio::test]
        async fn test_empty_comment_reprompts() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let response = post_form(t.app, "/forum", "username=voter&comment=").await;
            assert_eq!(response.status(), StatusCode::OK);

            let body = body_string(response).await;
            assert!(body.contains("Please enter a comment."));
            // the username is kept in the form
            assert!(body.contains("value=\"voter\""));
            assert_eq!(t.db.get_comment_count().await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_comment_html_is_escaped() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            post_form(
                t.app.clone(),
                "/forum",
                "username=x&comment=%3Cscript%3Ealert(1)%3C%2Fscript%3E",
            )
            .await;

            let (_, body) = get(t.app, "/forum").await;
            assert!(!body.contains("<script>alert(1)</script>"));
            assert!(body.contains("&lt;script&gt;"));
        }
    }

    mod reports_tests {
        use super::*;

        #[tokio::test]
        async fn test_reports_show_sentiment_and_words() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let (status, body) = get(t.app, "/reports?entity=Don+Davis").await;

            assert_eq!(status, StatusCode::OK);
            assert!(body.contains("Positive"));
            assert!(body.contains("Negative"));
            // one headline per bucket, so every bar is full width
            assert_eq!(body.matches("width: 100%").count(), 3);
            // most frequent non-stop-word across the three titles
            assert!(body.contains(">davis<"));
        }
    }

    mod subscribe_tests {
        use super::*;

        #[tokio::test]
        async fn test_subscribe_appends_email() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let response = post_form(t.app, "/subscribe", "email=voter%40example.com").await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.contains("Subscribed"));

            assert_eq!(t.subscribers.list().await.unwrap(), vec!["voter@example.com"]);
        }

        #[tokio::test]
        async fn test_empty_email_warns_and_leaves_store_unchanged() {
            let server = feed_server().await;
            let t = create_test_app(&server.uri()).await;

            let response = post_form(t.app, "/subscribe", "email=+").await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response)
                .await
                .contains("Please enter an email address."));

            assert!(t.subscribers.list().await.unwrap().is_empty());
            assert!(!t.subscribers.path().exists());
        }
    }
}
