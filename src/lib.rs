//! # eoka-harvest
//!
//! Log into a social site, open a post and harvest every comment of it, even
//! when the list only grows as you scroll.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_harvest::{Config, ConsolePrompt, Harvester};
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_harvest::Result<()> {
//! let config = Config::load("harvest.yaml")?;
//! let harvester = Harvester::new(&config.browser).await?;
//! let result = harvester.run(&config, &ConsolePrompt).await?;
//! println!("{} comments", result.comments.len());
//! harvester.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The pieces are usable on their own against any [`Driver`]:
//! [`Authenticator`] runs the login flow, [`Collector`] scrolls a post until
//! its comment list stops growing and extracts [`Comment`]s from it.

pub mod auth;
pub mod avatar;
pub mod collect;
mod comment;
mod config;
pub mod driver;
mod harvester;
pub mod output;
pub mod wait;

pub use auth::{Authenticator, CodePrompt, ConsolePrompt, SessionState};
pub use avatar::{sanitize_username, AvatarStore, HttpAvatarStore};
pub use collect::{Collection, Collector};
pub use comment::Comment;
pub use config::{
    AvatarConfig, BrowserConfig, CommentsConfig, Config, Credentials, LoginConfig, OnFailure,
    OutputConfig, Params, TargetUrl, Viewport,
};
pub use driver::{BrowserDriver, Driver};
pub use harvester::{harvest, HarvestResult, Harvester};

use std::time::Duration;

/// Result type for eoka-harvest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading config, logging in or collecting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    #[error("{field} field not found after {waited:?}")]
    FieldNotFound { field: String, waited: Duration },

    #[error("comments section not found after {waited:?}")]
    CommentsSectionNotFound { waited: Duration },

    #[error("login not confirmed: expected location starting with '{expected}', still at '{last_location}'")]
    LoginNotConfirmed {
        expected: String,
        last_location: String,
    },

    #[error("login failed: {0}")]
    LoginFailed(String),
}
