//! The forum comment board and its storage backends.
//!
//! Comments are append-only: there is no edit, delete or moderation. The
//! default backend is the local SQLite database; the `firebase` backend
//! talks to a Realtime Database over REST using a service-account token.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ServiceAccount;
use crate::db::Database;
use crate::error::{SubmitError, ValidationError};

const COMMENTS_PATH: &str = "comments.json";
const TOKEN_SCOPES: &str = "https://www.googleapis.com/auth/firebase.database https://www.googleapis.com/auth/userinfo.email";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh a cached token this long before it expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub username: String,
    pub comment: String,
}

impl Comment {
    /// Build a comment from form input, rejecting blank fields.
    pub fn new(username: &str, comment: &str) -> Result<Self, ValidationError> {
        let username = username.trim();
        let comment = comment.trim();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if comment.is_empty() {
            return Err(ValidationError::EmptyComment);
        }
        Ok(Self {
            username: username.to_string(),
            comment: comment.to_string(),
        })
    }
}

/// An ordered, append-only collection of comments.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Every comment, oldest first.
    async fn list(&self) -> anyhow::Result<Vec<Comment>>;

    async fn append(&self, comment: &Comment) -> anyhow::Result<()>;
}

/// Validate form input and append it to `store`.
pub async fn post_comment(
    store: &dyn CommentStore,
    username: &str,
    body: &str,
) -> Result<Comment, SubmitError> {
    let comment = Comment::new(username, body)?;
    store.append(&comment).await?;
    info!("Comment posted by '{}'", comment.username);
    Ok(comment)
}

#[async_trait]
impl CommentStore for Database {
    async fn list(&self) -> anyhow::Result<Vec<Comment>> {
        self.get_comments().await
    }

    async fn append(&self, comment: &Comment) -> anyhow::Result<()> {
        self.insert_comment(comment).await
    }
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Mints OAuth access tokens from a service account (JWT bearer grant).
struct TokenSource {
    account: ServiceAccount,
    signing_key: SigningKey<Sha256>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    fn new(account: ServiceAccount) -> anyhow::Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(&account.private_key)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&account.private_key))
            .map_err(|e| anyhow!("Failed to parse service-account private key: {}", e))?;

        Ok(Self {
            account,
            signing_key: SigningKey::<Sha256>::new(private_key),
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: i64) -> anyhow::Result<String> {
        let header = serde_json::json!({
            "alg": "RS256",
            "typ": "JWT",
            "kid": self.account.private_key_id,
        });
        let claims = Claims {
            iss: &self.account.client_email,
            scope: TOKEN_SCOPES,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.signing_key.sign(signing_input.as_bytes());

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    async fn access_token(&self, client: &Client) -> anyhow::Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_EXPIRY_MARGIN_SECS > now {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting access token for {}", self.account.client_email);
        let assertion = self.assertion(now)?;
        let response: TokenResponse = client
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()
            .context("token endpoint rejected the service-account assertion")?
            .json()
            .await?;

        let access_token = response.access_token.clone();
        *cached = Some(CachedToken {
            access_token: response.access_token,
            expires_at: now + response.expires_in.unwrap_or(TOKEN_LIFETIME_SECS),
        });
        Ok(access_token)
    }
}

/// Comment collection stored under `/comments` of a Realtime Database.
///
/// Push IDs sort chronologically, so ordering the returned object by key
/// yields insertion order.
pub struct FirebaseCommentStore {
    client: Client,
    collection_url: String,
    tokens: Option<TokenSource>,
}

impl FirebaseCommentStore {
    /// `account` of `None` sends unauthenticated requests, as accepted by
    /// the local emulator and open rule sets.
    pub fn new(database_url: &str, account: Option<ServiceAccount>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let tokens = account.map(TokenSource::new).transpose()?;

        Ok(Self {
            client,
            collection_url: format!("{}/{}", database_url.trim_end_matches('/'), COMMENTS_PATH),
            tokens,
        })
    }

    async fn request(&self, builder: reqwest::RequestBuilder) -> anyhow::Result<reqwest::Response> {
        let builder = match &self.tokens {
            Some(tokens) => {
                let token = tokens.access_token(&self.client).await?;
                builder.query(&[("access_token", token)])
            }
            None => builder,
        };
        Ok(builder.send().await?.error_for_status()?)
    }
}

#[async_trait]
impl CommentStore for FirebaseCommentStore {
    async fn list(&self) -> anyhow::Result<Vec<Comment>> {
        let response = self.request(self.client.get(&self.collection_url)).await?;
        // An empty collection is returned as JSON `null`.
        let comments: Option<BTreeMap<String, Comment>> = response
            .json()
            .await
            .context("decoding comment collection")?;
        Ok(comments.unwrap_or_default().into_values().collect())
    }

    async fn append(&self, comment: &Comment) -> anyhow::Result<()> {
        self.request(self.client.post(&self.collection_url).json(comment))
            .await?;
        Ok(())
    }
}
