// src/browser/scripted.rs
//! In-memory browser over scripted pages. Drives adapters without a network
//! or a Chromium binary: each page is a map from selector to nodes, and
//! clicks move between pages or open popups as scripted.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{BrowserError, ElementRef, Session};

/// What happens when a node is clicked.
#[derive(Debug, Clone)]
pub enum Click {
    /// The session moves to another scripted page (link, postback, "next").
    Goto(String),
    /// A new tab opens on the given page; only meaningful via `open_from_click`.
    Popup(String),
    /// Like `Popup`, but the new tab reports `url` as its address whatever
    /// page it shows, the way form posts land on the action URL.
    PostPopup { page: String, url: String },
    Fail(String),
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub text: String,
    pub value: Option<String>,
    pub attrs: HashMap<String, String>,
    pub children: HashMap<String, Vec<Node>>,
    pub on_click: Option<Click>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn value(mut self, v: impl Into<String>) -> Self {
        self.value = Some(v.into());
        self
    }

    pub fn attr(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.attrs.insert(k.into(), v.into());
        self
    }

    pub fn child(mut self, selector: impl Into<String>, nodes: Vec<Node>) -> Self {
        self.children.insert(selector.into(), nodes);
        self
    }

    pub fn on_click(mut self, c: Click) -> Self {
        self.on_click = Some(c);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    nodes: HashMap<String, Vec<Node>>,
    failing: HashSet<String>,
    content: String,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: impl Into<String>, nodes: Vec<Node>) -> Self {
        self.nodes.insert(selector.into(), nodes);
        self
    }

    /// Queries for `selector` on this page fail instead of matching.
    pub fn failing(mut self, selector: impl Into<String>) -> Self {
        self.failing.insert(selector.into());
        self
    }

    fn check(&self, selector: &str) -> Result<(), BrowserError> {
        if self.failing.contains(selector) {
            Err(BrowserError::Other(format!("query failed: {selector}")))
        } else {
            Ok(())
        }
    }

    pub fn content(mut self, html: impl Into<String>) -> Self {
        self.content = html.into();
        self
    }
}

/// Scripted page set plus an activity log for assertions.
#[derive(Debug, Default)]
pub struct ScriptedBrowser {
    pages: HashMap<String, ScriptedPage>,
    unreachable: HashSet<String>,
    log: Mutex<Vec<String>>,
    open_tabs: AtomicUsize,
    peak_tabs: AtomicUsize,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Navigation to `url` fails.
    pub fn unreachable(mut self, url: impl Into<String>) -> Self {
        self.unreachable.insert(url.into());
        self
    }

    /// Opens the first tab, positioned on `about:blank`.
    pub fn session(self: &Arc<Self>) -> ScriptedSession {
        ScriptedSession::open(Arc::clone(self), None)
    }

    /// Every navigation, click, script and close, in order.
    pub fn log(&self) -> Vec<String> {
        lock(&self.log).clone()
    }

    /// Most tabs that were open at the same time.
    pub fn peak_tabs(&self) -> usize {
        self.peak_tabs.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        lock(&self.log).push(entry);
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ScriptedSession {
    browser: Arc<ScriptedBrowser>,
    current: Mutex<Option<String>>,
    address: Option<String>,
    closed: AtomicBool,
}

impl ScriptedSession {
    fn open(browser: Arc<ScriptedBrowser>, url: Option<String>) -> Self {
        let open = browser.open_tabs.fetch_add(1, Ordering::SeqCst) + 1;
        browser.peak_tabs.fetch_max(open, Ordering::SeqCst);
        Self {
            browser,
            current: Mutex::new(url),
            address: None,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    fn page(&self) -> Result<&ScriptedPage, BrowserError> {
        self.ensure_open()?;
        let url = lock(&self.current).clone();
        let url = url.ok_or_else(|| BrowserError::NotFound("no page loaded".into()))?;
        self.browser
            .pages
            .get(&url)
            .ok_or_else(|| BrowserError::NotFound(format!("page {url}")))
    }

    fn resolve(&self, el: &ElementRef) -> Result<&Node, BrowserError> {
        let page = self.page()?;
        let mut node: Option<&Node> = None;
        for link in el.chain() {
            let pool = match node {
                None => page.nodes.get(&link.selector),
                Some(n) => n.children.get(&link.selector),
            };
            node = pool.and_then(|v| v.get(link.index));
            if node.is_none() {
                return Err(BrowserError::NotFound(el.to_string()));
            }
        }
        node.ok_or_else(|| BrowserError::NotFound(el.to_string()))
    }

    fn goto(&self, url: &str) -> Result<(), BrowserError> {
        if self.browser.unreachable.contains(url) || !self.browser.pages.contains_key(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "unreachable".into(),
            });
        }
        *lock(&self.current) = Some(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.browser.record(format!("navigate {url}"));
        self.goto(url)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let page = self.page()?;
        match page.nodes.get(selector) {
            Some(v) if !v.is_empty() => Ok(()),
            _ => Err(BrowserError::Timeout(timeout, selector.to_string())),
        }
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError> {
        let page = self.page()?;
        page.check(selector)?;
        let n = page.nodes.get(selector).map_or(0, Vec::len);
        Ok((0..n).map(|i| ElementRef::root(selector, i)).collect())
    }

    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, BrowserError> {
        self.page()?.check(selector)?;
        let n = self.resolve(parent)?.children.get(selector).map_or(0, Vec::len);
        Ok((0..n).map(|i| parent.child(selector, i)).collect())
    }

    async fn click(&self, el: &ElementRef) -> Result<(), BrowserError> {
        let action = self.resolve(el)?.on_click.clone();
        self.browser.record(format!("click {el}"));
        match action {
            Some(Click::Goto(url)) => self.goto(&url),
            Some(Click::Fail(msg)) => Err(BrowserError::Other(msg)),
            Some(Click::Popup(_)) | Some(Click::PostPopup { .. }) | None => Ok(()),
        }
    }

    async fn read_text(&self, el: &ElementRef) -> Result<String, BrowserError> {
        Ok(self.resolve(el)?.text.clone())
    }

    async fn read_value(&self, el: &ElementRef) -> Result<String, BrowserError> {
        Ok(self.resolve(el)?.value.clone().unwrap_or_default())
    }

    async fn attribute(&self, el: &ElementRef, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.resolve(el)?.attrs.get(name).cloned())
    }

    async fn evaluate(&self, script: &str) -> Result<(), BrowserError> {
        self.ensure_open()?;
        self.browser.record(format!("eval {script}"));
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.page()?.content.clone())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.ensure_open()?;
        if let Some(addr) = &self.address {
            return Ok(addr.clone());
        }
        Ok(lock(&self.current)
            .clone()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn open_ephemeral_context(&self) -> Result<Box<dyn Session>, BrowserError> {
        self.ensure_open()?;
        self.browser.record("open tab".to_string());
        Ok(Box::new(ScriptedSession::open(Arc::clone(&self.browser), None)))
    }

    async fn open_from_click(
        &self,
        el: &ElementRef,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, BrowserError> {
        let action = self.resolve(el)?.on_click.clone();
        self.browser.record(format!("click {el}"));
        let (page, address) = match action {
            Some(Click::Popup(url)) => (url, None),
            Some(Click::PostPopup { page, url }) => (page, Some(url)),
            Some(Click::Fail(msg)) => return Err(BrowserError::Other(msg)),
            _ => return Err(BrowserError::Timeout(timeout, format!("popup from {el}"))),
        };
        if !self.browser.pages.contains_key(&page) {
            return Err(BrowserError::Navigation {
                url: page,
                reason: "popup failed to load".into(),
            });
        }
        self.browser.record(format!("popup {page}"));
        let mut tab = ScriptedSession::open(Arc::clone(&self.browser), Some(page));
        tab.address = address;
        Ok(Box::new(tab))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.browser.open_tabs.fetch_sub(1, Ordering::SeqCst);
            self.browser.record("close".to_string());
        }
        Ok(())
    }
}
