use super::Driver;
use crate::config::BrowserConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use eoka::{Browser, Page};
use serde_json::Value;
use tracing::debug;

/// Attribute carrying the identity a node was given when it was found.
const STAMP_ATTR: &str = "data-harvest-id";

/// Page-side helpers. `__stamp` gives an element a per-document unique id
/// (kept if it already has one); `__resolve` maps an id back to its element,
/// `null` meaning the document itself.
const HELPERS_JS: &str = r#"const __attr = 'data-harvest-id';
const __stamp = (el) => {
    if (!el.hasAttribute(__attr)) {
        window.__harvestPrefix = window.__harvestPrefix || Math.random().toString(36).slice(2);
        window.__harvestSeq = (window.__harvestSeq || 0) + 1;
        el.setAttribute(__attr, window.__harvestPrefix + '-' + window.__harvestSeq);
    }
    return el.getAttribute(__attr);
};
const __resolve = (id) => id === null
    ? document
    : document.querySelector('[' + __attr + '="' + CSS.escape(id) + '"]');"#;

/// A page element, pinned by the id stamped on it when it was found.
///
/// Every operation looks the element up by that id, so inserting or
/// removing siblings never shifts a handle onto another element. An element
/// that was removed, or re-rendered into a fresh node, reports as stale.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementHandle {
    /// `None` is the document.
    id: Option<String>,
}

impl ElementHandle {
    fn document() -> Self {
        Self::default()
    }

    fn to_js(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.id)?)
    }
}

/// [`Driver`] over a single eoka page.
pub struct BrowserDriver {
    browser: Browser,
    page: Page,
}

impl BrowserDriver {
    /// Launch a browser with one blank page.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self { browser, page })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.page.screenshot().await?)
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }

    /// Stamp every element matching `expr` under `parent`, in document
    /// order, and return their ids.
    async fn stamp_matches(
        &self,
        parent: &ElementHandle,
        expr: &str,
    ) -> Result<Vec<ElementHandle>> {
        let js = format!(
            r#"(() => {{
                {helpers}
                const ctx = __resolve({parent});
                if (!ctx) return null;
                const snap = document.evaluate({expr}, ctx, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const ids = [];
                for (let i = 0; i < snap.snapshotLength; i++) {{
                    const el = snap.snapshotItem(i);
                    if (el.nodeType === Node.ELEMENT_NODE) ids.push(__stamp(el));
                }}
                return ids;
            }})()"#,
            helpers = HELPERS_JS,
            parent = parent.to_js()?,
            expr = serde_json::to_string(expr)?,
        );
        let ids: Option<Vec<String>> = self.page.evaluate(&js).await?;
        let ids = ids.ok_or_else(|| stale(parent))?;
        Ok(ids
            .into_iter()
            .map(|id| ElementHandle { id: Some(id) })
            .collect())
    }

    /// Evaluate `body` with the resolved node bound to `node`. `body` must
    /// return `null` only when it means "node is gone".
    async fn on_node<T: serde::de::DeserializeOwned>(
        &self,
        node: &ElementHandle,
        body: &str,
    ) -> Result<Option<T>> {
        let js = format!(
            r#"(() => {{
                {helpers}
                const node = __resolve({id});
                if (!node) return null;
                {body}
            }})()"#,
            helpers = HELPERS_JS,
            id = node.to_js()?,
            body = body,
        );
        Ok(self.page.evaluate(&js).await?)
    }

    async fn focus(&self, node: &ElementHandle) -> Result<()> {
        self.on_node::<bool>(node, "node.focus(); return true;")
            .await?
            .ok_or_else(|| stale(node))?;
        Ok(())
    }
}

fn stale(node: &ElementHandle) -> Error {
    let id = node.id.as_deref().unwrap_or("document");
    Error::Driver(format!(
        "node no longer in document: [{}=\"{}\"]",
        STAMP_ATTR, id
    ))
}

#[async_trait(?Send)]
impl Driver for BrowserDriver {
    type Node = ElementHandle;

    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("goto: {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn current_location(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }

    async fn find_one(&self, locator: &str) -> Result<Option<ElementHandle>> {
        self.find_one_in(&ElementHandle::document(), locator).await
    }

    async fn find_many(&self, locator: &str) -> Result<Vec<ElementHandle>> {
        self.find_many_in(&ElementHandle::document(), locator).await
    }

    async fn find_one_in(
        &self,
        parent: &ElementHandle,
        locator: &str,
    ) -> Result<Option<ElementHandle>> {
        Ok(self.stamp_matches(parent, locator).await?.into_iter().next())
    }

    async fn find_many_in(
        &self,
        parent: &ElementHandle,
        locator: &str,
    ) -> Result<Vec<ElementHandle>> {
        self.stamp_matches(parent, locator).await
    }

    async fn run_script(&self, code: &str, args: &[&ElementHandle]) -> Result<Value> {
        let args = args
            .iter()
            .map(|n| n.to_js())
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let js = format!(
            r#"(() => {{
                {helpers}
                const args = [{args}].map((id) => __resolve(id));
                const result = (function() {{ {code} }}).apply(null, args);
                return result === undefined ? null : result;
            }})()"#,
            helpers = HELPERS_JS,
            args = args,
            code = code,
        );
        Ok(self.page.evaluate(&js).await?)
    }

    async fn read_text(&self, node: &ElementHandle) -> Result<String> {
        self.on_node(node, "return (node.innerText ?? node.textContent ?? '').trim();")
            .await?
            .ok_or_else(|| stale(node))
    }

    async fn attribute(&self, node: &ElementHandle, name: &str) -> Result<Option<String>> {
        // wrapped so a missing attribute is told apart from a missing node
        let body = format!(
            "return {{ value: node.getAttribute({}) }};",
            serde_json::to_string(name)?
        );
        let wrapped: Value = self.on_node(node, &body).await?.ok_or_else(|| stale(node))?;
        Ok(wrapped["value"].as_str().map(str::to_string))
    }

    async fn clear(&self, node: &ElementHandle) -> Result<()> {
        // native setter so framework-controlled inputs see the change
        const CLEAR: &str = r#"
            node.focus();
            const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(node), 'value')?.set;
            if (setter) setter.call(node, ''); else node.value = '';
            node.dispatchEvent(new Event('input', { bubbles: true }));
            return true;"#;
        self.on_node::<bool>(node, CLEAR)
            .await?
            .ok_or_else(|| stale(node))?;
        Ok(())
    }

    async fn send_input(&self, node: &ElementHandle, text: &str) -> Result<()> {
        self.focus(node).await?;
        self.page.type_text(text).await?;
        Ok(())
    }

    async fn submit_key(&self, node: &ElementHandle) -> Result<()> {
        self.focus(node).await?;
        self.page.human().press_key("Enter").await?;
        Ok(())
    }
}
