//! The browser capability the login flow and the collector drive.
//!
//! Everything above this module talks to a [`Driver`]; [`BrowserDriver`]
//! is the real one, backed by an eoka page. Locators are XPath
//! expressions. Locators passed to the `*_in` lookups are evaluated with the
//! parent node as context, so they are written relative (`.//span`).

mod browser;
#[cfg(test)]
pub(crate) mod fake;

pub use browser::{BrowserDriver, ElementHandle};

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

/// Navigation, lookup, scripting and input on one browser page.
///
/// Single-page, single-flow: implementations are used from one task at a
/// time and need not be `Send`.
#[async_trait(?Send)]
pub trait Driver {
    /// Handle to a node of the current document.
    type Node: Clone + Debug;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_location(&self) -> Result<String>;

    /// First node matching `locator`, `None` when nothing matches.
    async fn find_one(&self, locator: &str) -> Result<Option<Self::Node>>;

    /// All nodes matching `locator`, in document order.
    async fn find_many(&self, locator: &str) -> Result<Vec<Self::Node>>;

    async fn find_one_in(&self, parent: &Self::Node, locator: &str)
        -> Result<Option<Self::Node>>;

    async fn find_many_in(&self, parent: &Self::Node, locator: &str) -> Result<Vec<Self::Node>>;

    /// Run a script body; `args[i]` is visible to it as `arguments[i]`.
    async fn run_script(&self, code: &str, args: &[&Self::Node]) -> Result<Value>;

    /// Rendered text of the node, trimmed.
    async fn read_text(&self, node: &Self::Node) -> Result<String>;

    async fn attribute(&self, node: &Self::Node, name: &str) -> Result<Option<String>>;

    /// Empty an input field.
    async fn clear(&self, node: &Self::Node) -> Result<()>;

    /// Type `text` into the node.
    async fn send_input(&self, node: &Self::Node, text: &str) -> Result<()>;

    /// Press Enter on the node.
    async fn submit_key(&self, node: &Self::Node) -> Result<()>;
}

/// Replace the content of an input field.
pub async fn fill<D: Driver>(driver: &D, node: &D::Node, text: &str) -> Result<()> {
    driver.clear(node).await?;
    driver.send_input(node, text).await
}
