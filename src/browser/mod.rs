// src/browser/mod.rs
//! The browser-automation capability the adapters drive.
//!
//! Adapters only see [`Session`]; which engine sits behind it (headless
//! Chromium, a scripted in-memory page set) is decided by the caller.

#[cfg(feature = "chromium")]
pub mod chromium;
pub mod scripted;

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),
    #[error("element not found: {0}")]
    NotFound(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("script failed: {0}")]
    Script(String),
    #[error("session closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Runs `fut` for at most `limit`. An expired timer becomes
/// [`BrowserError::Timeout`] naming `what`.
pub async fn bounded<T, F>(limit: Duration, what: impl Into<String>, fut: F) -> Result<T, BrowserError>
where
    F: Future<Output = Result<T, BrowserError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(BrowserError::Timeout(limit, what.into())),
    }
}

/// Re-resolvable element locator: the `index`-th match of `selector`,
/// optionally scoped under a parent locator.
///
/// Each use re-queries the live page, so a locator survives postbacks that
/// would invalidate a raw node handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
    pub parent: Option<Box<ElementRef>>,
}

impl ElementRef {
    pub fn root(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
            parent: None,
        }
    }

    pub fn child(&self, selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Locator chain from the outermost ancestor down to `self`.
    pub fn chain(&self) -> Vec<&ElementRef> {
        let mut out = vec![self];
        let mut cur = self;
        while let Some(p) = cur.parent.as_deref() {
            out.push(p);
            cur = p;
        }
        out.reverse();
        out
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.parent {
            write!(f, "{p} >> ")?;
        }
        write!(f, "{}[{}]", self.selector, self.index)
    }
}

/// One logical user session (a tab). Operations are sequential; a session is
/// never driven from two tasks at once.
#[async_trait]
pub trait Session: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Waits until `selector` matches at least one element.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn query(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError>;

    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, BrowserError>;

    async fn click(&self, el: &ElementRef) -> Result<(), BrowserError>;

    async fn read_text(&self, el: &ElementRef) -> Result<String, BrowserError>;

    /// Current `value` of a form control.
    async fn read_value(&self, el: &ElementRef) -> Result<String, BrowserError>;

    async fn attribute(&self, el: &ElementRef, name: &str) -> Result<Option<String>, BrowserError>;

    async fn evaluate(&self, script: &str) -> Result<(), BrowserError>;

    /// Serialized document, for text probes.
    async fn content(&self) -> Result<String, BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Fresh tab in the same browser context, for full-navigation detail pages.
    async fn open_ephemeral_context(&self) -> Result<Box<dyn Session>, BrowserError>;

    /// Clicks `el` and returns the tab it opens, once loaded.
    async fn open_from_click(
        &self,
        el: &ElementRef,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

/// First match of `selector`, if any.
pub async fn first(session: &dyn Session, selector: &str) -> Result<Option<ElementRef>, BrowserError> {
    Ok(session.query(selector).await?.into_iter().next())
}

/// Trimmed text of the first match, or `None` when absent.
pub async fn first_text(session: &dyn Session, selector: &str) -> Result<Option<String>, BrowserError> {
    match first(session, selector).await? {
        Some(el) => Ok(Some(session.read_text(&el).await?.trim().to_string())),
        None => Ok(None),
    }
}
