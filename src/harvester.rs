use crate::auth::{Authenticator, CodePrompt};
use crate::avatar::{AvatarStore, HttpAvatarStore};
use crate::collect::{Collection, Collector};
use crate::comment::Comment;
use crate::config::{BrowserConfig, Config};
use crate::driver::{BrowserDriver, Driver};
use crate::Result;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Result of one harvest run.
#[derive(Debug)]
pub struct HarvestResult {
    /// Whether login and collection both succeeded.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Accepted comments in document order.
    pub comments: Vec<Comment>,
    /// List items seen after loading settled.
    pub scanned: usize,
    /// Items skipped for a missing author or text.
    pub rejected: usize,
    /// Scrolling hit the time cap.
    pub capped: bool,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

/// Log in, then collect the target post's comments, on any [`Driver`].
pub async fn harvest<D: Driver>(
    driver: &D,
    config: &Config,
    prompt: &dyn CodePrompt,
    avatars: Option<&dyn AvatarStore>,
) -> Result<Collection> {
    Authenticator::new(driver, &config.login, prompt)
        .login(&config.credentials)
        .await?;

    info!("Collecting comments of {}", config.target.url);
    let collector = Collector::new(driver, &config.comments);
    let collector = match avatars {
        Some(store) => collector.with_avatars(store),
        None => collector,
    };
    collector.collect(&config.target.url).await
}

/// Runs harvests in a real browser.
pub struct Harvester {
    driver: BrowserDriver,
}

impl Harvester {
    /// Launch a browser with the given config.
    pub async fn new(config: &BrowserConfig) -> Result<Self> {
        Ok(Self {
            driver: BrowserDriver::launch(config).await?,
        })
    }

    pub fn driver(&self) -> &BrowserDriver {
        &self.driver
    }

    /// Run a full harvest. Flow failures are reported in the result, not
    /// as `Err`; setup failures (the avatar HTTP client) are returned.
    pub async fn run(&self, config: &Config, prompt: &dyn CodePrompt) -> Result<HarvestResult> {
        let start = Instant::now();
        let store = if config.avatars.enabled {
            Some(HttpAvatarStore::new(&config.avatars)?)
        } else {
            None
        };
        let avatars = store.as_ref().map(|s| s as &dyn AvatarStore);

        match harvest(&self.driver, config, prompt, avatars).await {
            Ok(collection) => Ok(HarvestResult {
                success: true,
                error: None,
                comments: collection.comments,
                scanned: collection.scanned,
                rejected: collection.rejected,
                capped: collection.capped,
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                warn!("Harvest failed: {}", e);
                self.handle_failure(config).await;
                Ok(HarvestResult {
                    success: false,
                    error: Some(e.to_string()),
                    comments: Vec::new(),
                    scanned: 0,
                    rejected: 0,
                    capped: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
        }
    }

    async fn handle_failure(&self, config: &Config) {
        let Some(path) = config
            .on_failure
            .as_ref()
            .and_then(|f| f.screenshot.as_ref())
        else {
            return;
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = path.replace("{timestamp}", &timestamp.to_string());
        info!("Saving failure screenshot to: {}", path);
        match self.driver.screenshot().await {
            Ok(data) => {
                if let Err(e) = std::fs::write(&path, data) {
                    warn!("Failed to save screenshot: {}", e);
                }
            }
            Err(e) => warn!("Failed to take screenshot: {}", e),
        }
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        self.driver.close().await
    }
}
