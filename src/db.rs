use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::comments::Comment;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                comment TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Comments in insertion order.
    pub async fn get_comments(&self) -> anyhow::Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT username, comment FROM comments ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    pub async fn get_comment_count(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn insert_comment(&self, comment: &Comment) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO comments (username, comment, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&comment.username)
        .bind(&comment.comment)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
