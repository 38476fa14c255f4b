//! Avatar downloads.
//!
//! Best effort: a failed download costs the comment its local path, never
//! the comment itself.

use crate::config::AvatarConfig;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Filesystem-safe identifier for an author: lower-cased, only `[a-z0-9_-]`.
///
/// Falls back to `user_<unix nanos>` when nothing survives.
pub fn sanitize_username(username: &str) -> String {
    let safe: String = username
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect();
    if safe.is_empty() {
        format!("user_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    } else {
        safe
    }
}

/// Somewhere to keep a copy of an author's avatar.
#[async_trait(?Send)]
pub trait AvatarStore {
    /// Fetch `url` and store it for `user`, returning the recorded path.
    async fn store(&self, user: &str, url: &str) -> Result<String>;
}

/// Downloads avatars over HTTP into a directory.
pub struct HttpAvatarStore {
    client: reqwest::Client,
    dir: PathBuf,
    link_prefix: String,
}

impl HttpAvatarStore {
    pub fn new(config: &AvatarConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &AvatarConfig) -> Self {
        Self {
            client,
            dir: config.dir.clone(),
            link_prefix: config.link_prefix.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait(?Send)]
impl AvatarStore for HttpAvatarStore {
    async fn store(&self, user: &str, url: &str) -> Result<String> {
        let filename = format!("{}.jpg", sanitize_username(user));

        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, &bytes).await?;
        debug!("avatar of {} saved to {}", user, path.display());

        if self.link_prefix.is_empty() {
            Ok(filename)
        } else {
            Ok(format!("{}/{}", self.link_prefix, filename))
        }
    }
}
