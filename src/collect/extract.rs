//! One list item in, at most one comment out.

use crate::avatar::AvatarStore;
use crate::comment::Comment;
use crate::config::CommentsConfig;
use crate::driver::Driver;
use std::fmt;
use tracing::debug;

/// Why an item produced no comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingAuthor,
    MissingText,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingAuthor => write!(f, "no author"),
            Rejection::MissingText => write!(f, "no text"),
        }
    }
}

pub struct Extractor<'a, D: Driver> {
    driver: &'a D,
    config: &'a CommentsConfig,
    avatars: Option<&'a dyn AvatarStore>,
}

impl<'a, D: Driver> Extractor<'a, D> {
    pub fn new(
        driver: &'a D,
        config: &'a CommentsConfig,
        avatars: Option<&'a dyn AvatarStore>,
    ) -> Self {
        Self {
            driver,
            config,
            avatars,
        }
    }

    /// Map one item to a comment. Never fails: anything that goes wrong
    /// either rejects the item or empties an avatar field.
    pub async fn extract(&self, item: &D::Node) -> Result<Comment, Rejection> {
        let user = self
            .text_at(item, &self.config.author)
            .await
            .ok_or(Rejection::MissingAuthor)?;
        let text = self
            .text_at(item, &self.config.text)
            .await
            .ok_or(Rejection::MissingText)?;

        let mut comment = Comment {
            user,
            text,
            ..Comment::default()
        };

        if let Some(url) = self.avatar_url(item).await {
            if let Some(store) = self.avatars {
                match store.store(&comment.user, &url).await {
                    Ok(path) => comment.profile_picture_path = path,
                    Err(e) => debug!("avatar download for {} failed: {}", comment.user, e),
                }
            }
            comment.profile_picture_url = url;
        }

        Ok(comment)
    }

    /// Trimmed text of the first `locator` match under `item`, if non-empty.
    async fn text_at(&self, item: &D::Node, locator: &str) -> Option<String> {
        let node = match self.driver.find_one_in(item, locator).await {
            Ok(Some(node)) => node,
            Ok(None) => return None,
            Err(e) => {
                debug!("lookup of {} failed: {}", locator, e);
                return None;
            }
        };
        match self.driver.read_text(&node).await {
            Ok(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                debug!("reading {} failed: {}", locator, e);
                None
            }
        }
    }

    async fn avatar_url(&self, item: &D::Node) -> Option<String> {
        let image = self
            .driver
            .find_one_in(item, &self.config.avatar)
            .await
            .ok()
            .flatten()?;
        let src = self.driver.attribute(&image, "src").await.ok().flatten()?;
        let src = src.trim();
        (!src.is_empty()).then(|| src.to_string())
    }
}
