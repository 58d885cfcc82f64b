use std::sync::Arc;

use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use policy_tracker::comments::{CommentStore, FirebaseCommentStore};
use policy_tracker::config::{CommentBackend, Config, Secrets};
use policy_tracker::db::Database;
use policy_tracker::fetcher::Fetcher;
use policy_tracker::routes::{self, AppState};
use policy_tracker::subscribers::SubscriberStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "policy_tracker=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("POLICY_TRACKER_CONFIG").unwrap_or_else(|_| "tracker.toml".to_string());
    let mut config = Config::load(&config_path)?;
    info!(
        "Loaded {} entities and {} videos from {}",
        config.entities.len(),
        config.videos.len(),
        config_path
    );

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }

    let secrets_path =
        std::env::var("POLICY_TRACKER_SECRETS").unwrap_or_else(|_| "secrets.toml".to_string());
    let secrets = Secrets::load(&secrets_path)?;

    // Pick the comment backend
    let comments: Arc<dyn CommentStore> = match config.comments.backend {
        CommentBackend::Sqlite => {
            let db = Database::new(&config.database_url).await?;
            db.initialize().await?;
            info!("Database initialized");
            Arc::new(db)
        }
        CommentBackend::Firebase => {
            let url = config
                .comments
                .database_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("comments.database_url is not set"))?;
            if secrets.firebase.is_none() {
                warn!("No service account configured, comment requests will be unauthenticated");
            }
            info!("Using Realtime Database comments at {}", url);
            Arc::new(FirebaseCommentStore::new(&url, secrets.firebase)?)
        }
    };

    let fetcher = Arc::new(Fetcher::new(&config.fetch)?);
    let subscribers = Arc::new(SubscriberStore::new(&config.subscribers_path));

    // Create app state
    let state = Arc::new(AppState {
        config: Arc::new(config),
        fetcher,
        subscribers,
        comments,
    });

    // Build router
    let app = routes::router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server starting on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
