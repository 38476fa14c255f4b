//! In-memory driver for unit tests.

use super::Driver;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeNode(usize);

impl FakeNode {
    /// Stand-in returned for counts past the registered nodes.
    const PADDING: FakeNode = FakeNode(usize::MAX);
}

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    text: String,
    attrs: HashMap<String, String>,
    value: String,
    children: HashMap<String, Vec<usize>>,
}

impl FakeElement {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn input() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Default)]
pub struct FakeDriver {
    elements: RefCell<Vec<FakeElement>>,
    roots: RefCell<HashMap<String, Vec<usize>>>,
    hidden: RefCell<HashMap<String, usize>>,
    growth: RefCell<HashMap<String, VecDeque<usize>>>,
    failing_scripts: Cell<bool>,
    failing_counts: Cell<bool>,
    location: RefCell<String>,
    redirect: RefCell<Option<(usize, String)>>,
    submits: Cell<usize>,
    log: RefCell<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, element: FakeElement) -> usize {
        let mut elements = self.elements.borrow_mut();
        elements.push(element);
        elements.len() - 1
    }

    /// Register a node matched by the absolute `locator`.
    pub fn add_root(&self, locator: &str, element: FakeElement) -> FakeNode {
        let id = self.push(element);
        self.roots
            .borrow_mut()
            .entry(locator.to_string())
            .or_default()
            .push(id);
        FakeNode(id)
    }

    /// Register a node matched by `locator` relative to `parent`.
    pub fn add_child(&self, parent: FakeNode, locator: &str, element: FakeElement) -> FakeNode {
        let id = self.push(element);
        self.elements.borrow_mut()[parent.0]
            .children
            .entry(locator.to_string())
            .or_default()
            .push(id);
        FakeNode(id)
    }

    /// Make the next `lookups` single-node lookups of `locator` miss.
    pub fn hide_for(&self, locator: &str, lookups: usize) {
        self.hidden.borrow_mut().insert(locator.to_string(), lookups);
    }

    /// Script the sizes `find_many(locator)` reports before it settles on
    /// the registered nodes.
    pub fn grow(&self, locator: &str, counts: &[usize]) {
        self.growth
            .borrow_mut()
            .insert(locator.to_string(), counts.iter().copied().collect());
    }

    pub fn fail_scripts(&self) {
        self.failing_scripts.set(true);
    }

    /// Make every `find_many` fail.
    pub fn fail_counts(&self) {
        self.failing_counts.set(true);
    }

    pub fn set_location(&self, location: &str) {
        *self.location.borrow_mut() = location.to_string();
    }

    /// Move to `location` on the `submits`-th Enter key.
    pub fn redirect_after_submits(&self, submits: usize, location: &str) {
        *self.redirect.borrow_mut() = Some((submits, location.to_string()));
    }

    pub fn value_of(&self, node: FakeNode) -> String {
        self.elements.borrow()[node.0].value.clone()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn scripts_run(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|l| l.starts_with("script"))
            .count()
    }

    fn record(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }

    fn with_element<T>(&self, node: &FakeNode, f: impl FnOnce(&mut FakeElement) -> T) -> Result<T> {
        let mut elements = self.elements.borrow_mut();
        let element = elements
            .get_mut(node.0)
            .ok_or_else(|| Error::Driver(format!("no such node {:?}", node)))?;
        Ok(f(element))
    }
}

#[async_trait(?Send)]
impl Driver for FakeDriver {
    type Node = FakeNode;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(format!("navigate {}", url));
        self.set_location(url);
        Ok(())
    }

    async fn current_location(&self) -> Result<String> {
        Ok(self.location.borrow().clone())
    }

    async fn find_one(&self, locator: &str) -> Result<Option<FakeNode>> {
        if let Some(left) = self.hidden.borrow_mut().get_mut(locator) {
            if *left > 0 {
                *left -= 1;
                return Ok(None);
            }
        }
        Ok(self
            .roots
            .borrow()
            .get(locator)
            .and_then(|ids| ids.first())
            .map(|&id| FakeNode(id)))
    }

    async fn find_many(&self, locator: &str) -> Result<Vec<FakeNode>> {
        if self.failing_counts.get() {
            return Err(Error::Driver(format!("lookup of {} failed", locator)));
        }
        let registered: Vec<FakeNode> = self
            .roots
            .borrow()
            .get(locator)
            .map(|ids| ids.iter().map(|&id| FakeNode(id)).collect())
            .unwrap_or_default();
        let scripted = self
            .growth
            .borrow_mut()
            .get_mut(locator)
            .and_then(|counts| counts.pop_front());
        Ok(match scripted {
            Some(count) => (0..count)
                .map(|i| registered.get(i).copied().unwrap_or(FakeNode::PADDING))
                .collect(),
            None => registered,
        })
    }

    async fn find_one_in(&self, parent: &FakeNode, locator: &str) -> Result<Option<FakeNode>> {
        Ok(self.find_many_in(parent, locator).await?.into_iter().next())
    }

    async fn find_many_in(&self, parent: &FakeNode, locator: &str) -> Result<Vec<FakeNode>> {
        self.with_element(parent, |el| {
            el.children
                .get(locator)
                .map(|ids| ids.iter().map(|&id| FakeNode(id)).collect())
                .unwrap_or_default()
        })
    }

    async fn run_script(&self, code: &str, args: &[&FakeNode]) -> Result<Value> {
        self.record(format!("script {} {:?}", code, args));
        if self.failing_scripts.get() {
            return Err(Error::Driver("script failed".into()));
        }
        Ok(Value::Null)
    }

    async fn read_text(&self, node: &FakeNode) -> Result<String> {
        self.with_element(node, |el| el.text.trim().to_string())
    }

    async fn attribute(&self, node: &FakeNode, name: &str) -> Result<Option<String>> {
        self.with_element(node, |el| el.attrs.get(name).cloned())
    }

    async fn clear(&self, node: &FakeNode) -> Result<()> {
        self.with_element(node, |el| el.value.clear())
    }

    async fn send_input(&self, node: &FakeNode, text: &str) -> Result<()> {
        self.with_element(node, |el| el.value.push_str(text))
    }

    async fn submit_key(&self, node: &FakeNode) -> Result<()> {
        self.record(format!("submit {:?}", node));
        let submits = self.submits.get() + 1;
        self.submits.set(submits);
        let redirect = self.redirect.borrow().clone();
        if let Some((after, location)) = redirect {
            if submits == after {
                self.set_location(&location);
            }
        }
        Ok(())
    }
}
