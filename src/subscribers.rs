use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{SubmitError, ValidationError};

/// Append-only newsletter list, one address per line, no header.
///
/// The file is opened and closed for every write. Nothing deduplicates
/// addresses and nothing ever sends the newsletter. Addresses with control
/// characters are rejected so every record stays on a single line.
pub struct SubscriberStore {
    path: PathBuf,
}

impl SubscriberStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn subscribe(&self, email: &str) -> Result<(), SubmitError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::EmptyEmail.into());
        }
        if email.chars().any(char::is_control) {
            return Err(ValidationError::EmailControlCharacters.into());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        file.write_all(csv_line(email).as_bytes())
            .await
            .with_context(|| format!("appending to {}", self.path.display()))?;
        file.flush().await.context("flushing subscriber file")?;

        info!("New newsletter subscriber recorded");
        Ok(())
    }

    /// All recorded lines, unquoted. A missing file means no subscribers.
    pub async fn list(&self) -> anyhow::Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(content.lines().map(unquote).collect())
    }
}

fn csv_line(field: &str) -> String {
    if field.contains([',', '"']) {
        format!("\"{}\"\n", field.replace('"', "\"\""))
    } else {
        format!("{}\n", field)
    }
}

fn unquote(line: &str) -> String {
    match line.strip_prefix('"').and_then(|l| l.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => line.to_string(),
    }
}
