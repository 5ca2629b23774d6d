// src/browser/chromium.rs
//! Headless Chromium sessions via chromiumoxide.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{bounded, BrowserError, ElementRef, Session};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const POLL: Duration = Duration::from_millis(250);

fn other<E: Display>(e: E) -> BrowserError {
    BrowserError::Other(e.to_string())
}

/// A launched (or connected) Chromium plus its CDP event pump.
pub struct ChromiumBrowser {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Connects to `CHROMIUM_REMOTE_DEBUGGING_URL` when set, otherwise
    /// launches a local headless instance.
    pub async fn launch() -> Result<Self, BrowserError> {
        let (browser, mut handler) = match std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL") {
            Ok(url) => {
                tracing::info!(%url, "connecting to remote Chrome");
                Browser::connect(url).await.map_err(other)?
            }
            Err(_) => {
                let config = BrowserConfig::builder()
                    .no_sandbox()
                    .request_timeout(Duration::from_secs(60))
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg("--ignore-certificate-errors")
                    .arg(format!("--user-agent={USER_AGENT}"))
                    .build()
                    .map_err(other)?;
                Browser::launch(config).await.map_err(other)?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            handler,
        })
    }

    pub async fn new_session(&self) -> Result<ChromiumSession, BrowserError> {
        let page = self.browser.new_page("about:blank").await.map_err(other)?;
        Ok(ChromiumSession {
            browser: Arc::clone(&self.browser),
            page,
        })
    }
}

impl Drop for ChromiumBrowser {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

pub struct ChromiumSession {
    browser: Arc<Browser>,
    page: Page,
}

impl ChromiumSession {
    async fn resolve(&self, el: &ElementRef) -> Result<Element, BrowserError> {
        let mut current: Option<Element> = None;
        for link in el.chain() {
            let found = match &current {
                None => self.page.find_elements(link.selector.as_str()).await,
                Some(parent) => parent.find_elements(link.selector.as_str()).await,
            }
            .map_err(|e| BrowserError::NotFound(format!("{el}: {e}")))?;
            current = Some(
                found
                    .into_iter()
                    .nth(link.index)
                    .ok_or_else(|| BrowserError::NotFound(el.to_string()))?,
            );
        }
        current.ok_or_else(|| BrowserError::NotFound(el.to_string()))
    }

    async fn target_ids(&self) -> Result<HashSet<TargetId>, BrowserError> {
        let pages = self.browser.pages().await.map_err(other)?;
        Ok(pages.iter().map(|p| p.target_id().clone()).collect())
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        bounded(timeout, url, async {
            self.page.goto(url).await.map(drop).map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })
        .await
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(found) = self.page.find_elements(selector).await {
                if !found.is_empty() {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(timeout, selector.to_string()));
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementRef>, BrowserError> {
        // No match is `Ok(vec![])`; an error is a broken session, not an empty page.
        let n = self.page.find_elements(selector).await.map_err(other)?.len();
        Ok((0..n).map(|i| ElementRef::root(selector, i)).collect())
    }

    async fn query_within(
        &self,
        parent: &ElementRef,
        selector: &str,
    ) -> Result<Vec<ElementRef>, BrowserError> {
        let n = self
            .resolve(parent)
            .await?
            .find_elements(selector)
            .await
            .map_err(other)?
            .len();
        Ok((0..n).map(|i| parent.child(selector, i)).collect())
    }

    async fn click(&self, el: &ElementRef) -> Result<(), BrowserError> {
        self.resolve(el).await?.click().await.map_err(other)?;
        Ok(())
    }

    async fn read_text(&self, el: &ElementRef) -> Result<String, BrowserError> {
        let text = self.resolve(el).await?.inner_text().await.map_err(other)?;
        Ok(text.unwrap_or_default())
    }

    async fn read_value(&self, el: &ElementRef) -> Result<String, BrowserError> {
        let value = self.resolve(el).await?.property("value").await.map_err(other)?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    async fn attribute(&self, el: &ElementRef, name: &str) -> Result<Option<String>, BrowserError> {
        self.resolve(el).await?.attribute(name).await.map_err(other)
    }

    async fn evaluate(&self, script: &str) -> Result<(), BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(other)
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(other)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn open_ephemeral_context(&self) -> Result<Box<dyn Session>, BrowserError> {
        let page = self.browser.new_page("about:blank").await.map_err(other)?;
        Ok(Box::new(ChromiumSession {
            browser: Arc::clone(&self.browser),
            page,
        }))
    }

    async fn open_from_click(
        &self,
        el: &ElementRef,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, BrowserError> {
        let before = self.target_ids().await?;
        self.click(el).await?;

        let deadline = Instant::now() + timeout;
        loop {
            let pages = self.browser.pages().await.map_err(other)?;
            if let Some(page) = pages.into_iter().find(|p| !before.contains(p.target_id())) {
                let left = deadline.saturating_duration_since(Instant::now());
                bounded(left, format!("popup from {el}"), async {
                    page.wait_for_navigation().await.map(drop).map_err(other)
                })
                .await?;
                return Ok(Box::new(ChromiumSession {
                    browser: Arc::clone(&self.browser),
                    page,
                }));
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(timeout, format!("popup from {el}")));
            }
            tokio::time::sleep(POLL).await;
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.clone().close().await.map_err(other)
    }
}
