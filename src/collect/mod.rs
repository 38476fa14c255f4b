//! Comment collection: open a post, load the whole list, extract it.

mod extract;
mod stabilize;

pub use extract::{Extractor, Rejection};
pub use stabilize::{
    Stabilization, StabilizationCounter, Stabilizer, SCROLL_TO_BOTTOM_JS,
};

use crate::avatar::AvatarStore;
use crate::comment::Comment;
use crate::config::CommentsConfig;
use crate::driver::Driver;
use crate::{wait, Error, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Comments of one post plus what it took to get them.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Accepted comments in document order.
    pub comments: Vec<Comment>,
    /// Items found after the list settled.
    pub scanned: usize,
    /// Items that produced no comment.
    pub rejected: usize,
    /// Scroll rounds spent loading the list.
    pub rounds: u32,
    /// Loading stopped at the time cap rather than by settling.
    pub capped: bool,
}

pub struct Collector<'a, D: Driver> {
    driver: &'a D,
    config: &'a CommentsConfig,
    avatars: Option<&'a dyn AvatarStore>,
}

impl<'a, D: Driver> Collector<'a, D> {
    pub fn new(driver: &'a D, config: &'a CommentsConfig) -> Self {
        Self {
            driver,
            config,
            avatars: None,
        }
    }

    /// Download avatars through `store` while extracting.
    pub fn with_avatars(mut self, store: &'a dyn AvatarStore) -> Self {
        self.avatars = Some(store);
        self
    }

    pub async fn collect(&self, url: &str) -> Result<Collection> {
        self.driver.navigate(url).await?;

        let poll = self.config.container_poll();
        let container = match wait::node(self.driver, &self.config.container, poll).await {
            Ok(node) => node,
            Err(Error::Timeout { elapsed, .. }) => {
                return Err(Error::CommentsSectionNotFound { waited: elapsed })
            }
            Err(e) => return Err(e),
        };
        debug!("comments section found");

        let stabilization = Stabilizer::new(
            Duration::from_millis(self.config.settle_ms),
            self.config.stable_rounds,
        )
        .with_max_duration(self.config.max_duration_ms.map(Duration::from_millis))
        .run(self.driver, &container, &self.config.items)
        .await?;

        let items = self.driver.find_many(&self.config.items).await?;
        let extractor = Extractor::new(self.driver, self.config, self.avatars);

        let mut comments = Vec::with_capacity(items.len());
        let mut rejected = 0;
        for (index, item) in items.iter().enumerate() {
            match extractor.extract(item).await {
                Ok(comment) => comments.push(comment),
                Err(reason) => {
                    debug!("skipping item {}: {}", index, reason);
                    rejected += 1;
                }
            }
        }

        info!(
            "extracted {} comments from {} items ({} skipped)",
            comments.len(),
            items.len(),
            rejected
        );

        Ok(Collection {
            comments,
            scanned: items.len(),
            rejected,
            rounds: stabilization.rounds,
            capped: stabilization.capped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::{FakeDriver, FakeElement};
    use async_trait::async_trait;

    const POST: &str = "https://www.instagram.com/p/abc123/";

    struct DiskStore;

    #[async_trait(?Send)]
    impl AvatarStore for DiskStore {
        async fn store(&self, user: &str, _url: &str) -> Result<String> {
            Ok(format!("pictures/{}.jpg", crate::avatar::sanitize_username(user)))
        }
    }

    fn add_item(driver: &FakeDriver, config: &CommentsConfig, n: usize, text: &str, image: bool) {
        let node = driver.add_root(&config.items, FakeElement::default());
        driver.add_child(node, &config.author, FakeElement::text(&format!("user{}", n)));
        driver.add_child(node, &config.text, FakeElement::text(text));
        if image {
            let src = format!("https://cdn.example.com/{}.jpg", n);
            driver.add_child(node, &config.avatar, FakeElement::default().attr("src", &src));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn collects_accepted_comments_in_document_order() {
        let driver = FakeDriver::new();
        let config = CommentsConfig::default();
        driver.add_root(&config.container, FakeElement::default());
        add_item(&driver, &config, 1, "first", true);
        add_item(&driver, &config, 2, "second", true);
        add_item(&driver, &config, 3, "", true);
        add_item(&driver, &config, 4, "fourth", true);
        add_item(&driver, &config, 5, "fifth", false);
        driver.grow(&config.items, &[2, 5, 5, 5]);

        let collection = Collector::new(&driver, &config)
            .with_avatars(&DiskStore)
            .collect(POST)
            .await
            .unwrap();

        let users: Vec<_> = collection.comments.iter().map(|c| c.user.as_str()).collect();
        assert_eq!(users, ["user1", "user2", "user4", "user5"]);
        assert_eq!(collection.scanned, 5);
        assert_eq!(collection.rejected, 1);
        assert_eq!(collection.rounds, 4);
        assert!(!collection.capped);

        assert_eq!(collection.comments[0].profile_picture_path, "pictures/user1.jpg");
        let last = &collection.comments[3];
        assert_eq!(last.profile_picture_url, "");
        assert_eq!(last.profile_picture_path, "");

        assert_eq!(driver.log()[0], format!("navigate {}", POST));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_section_reports_wait() {
        let driver = FakeDriver::new();
        let config = CommentsConfig {
            container_timeout_ms: 3_000,
            ..CommentsConfig::default()
        };

        let err = Collector::new(&driver, &config)
            .collect(POST)
            .await
            .unwrap_err();

        match err {
            Error::CommentsSectionNotFound { waited } => {
                assert_eq!(waited, Duration::from_millis(3_000))
            }
            other => panic!("expected CommentsSectionNotFound, got {other:?}"),
        }
        assert_eq!(driver.scripts_run(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_post_yields_empty_collection() {
        let driver = FakeDriver::new();
        let config = CommentsConfig::default();
        driver.add_root(&config.container, FakeElement::default());

        let collection = Collector::new(&driver, &config).collect(POST).await.unwrap();

        assert!(collection.comments.is_empty());
        assert_eq!(collection.scanned, 0);
        assert_eq!(collection.rounds, 3);
    }
}
