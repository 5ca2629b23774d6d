// src/adapters/postback_grid.rs
//! Server-postback grid with popup detail views (Western Cape style).
//!
//! Detail buttons submit the page's form. To keep the listing in place the
//! form is retargeted to a new tab for the click and restored right after.
//! Pages are reached through numbered pager links.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{read_detail, AdapterError, PageBatch, SiteAdapter};
use crate::browser::{self, BrowserError, ElementRef, Session};
use crate::config::source::PostbackGridSelectors;
use crate::config::SourceConfig;
use crate::record::VacancyRecord;

pub struct PostbackGridAdapter {
    cfg: SourceConfig,
    sel: PostbackGridSelectors,
    session: Box<dyn Session>,
    page: usize,
    done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grid {
    Present,
    /// The portal says there is nothing listed.
    Empty,
}

impl PostbackGridAdapter {
    pub fn new(cfg: SourceConfig, sel: PostbackGridSelectors, session: Box<dyn Session>) -> Self {
        Self {
            cfg,
            sel,
            session,
            page: 0,
            done: false,
        }
    }

    /// One probe: grid rendered, explicit empty-state message, or neither yet.
    async fn probe_grid(&self) -> Result<Grid, BrowserError> {
        if !self.session.query(&self.sel.grid).await?.is_empty() {
            return Ok(Grid::Present);
        }
        if self.session.content().await?.contains(&self.sel.empty_message) {
            return Ok(Grid::Empty);
        }
        Err(BrowserError::NotFound(self.sel.grid.clone()))
    }

    /// Bounded wait for the grid. Absence without the empty-state message
    /// after all attempts is a load failure, not an empty listing.
    async fn confirm_grid(&self) -> Result<Grid, AdapterError> {
        let page = self.page;
        self.cfg
            .retry
            .run(|attempt| async move {
                let r = self.probe_grid().await;
                if let Err(e) = &r {
                    debug!(source = %self.cfg.id, page, attempt, error = %e, "grid not ready");
                }
                r
            })
            .await
            .map_err(|_| AdapterError::GridUnavailable {
                page,
                attempts: self.cfg.retry.attempts(),
            })
    }

    fn pager_selector(&self, page: usize) -> String {
        self.sel.pager_link.replace("{page}", &page.to_string())
    }

    /// Follows the pager link to the next page; `false` when there is none.
    async fn advance(&self) -> Result<bool, AdapterError> {
        let next = self.page + 1;
        let Some(link) = browser::first(self.session.as_ref(), &self.pager_selector(next)).await?
        else {
            info!(source = %self.cfg.id, page = self.page, "no further pager link; finished");
            return Ok(false);
        };
        info!(source = %self.cfg.id, page = next, "navigating to page");
        self.session
            .click(&link)
            .await
            .map_err(|e| AdapterError::PaginationAmbiguous {
                page: self.page,
                reason: e.to_string(),
            })?;
        if !self.cfg.timeouts.settle.is_zero() {
            tokio::time::sleep(self.cfg.timeouts.settle).await;
        }
        Ok(true)
    }

    async fn read_popup(&self, button: &ElementRef) -> Result<VacancyRecord, BrowserError> {
        let tab = self
            .session
            .open_from_click(button, self.cfg.timeouts.popup)
            .await?;
        let result = async {
            let mut rec =
                read_detail(tab.as_ref(), &self.cfg.id, &self.sel.detail_fields, &self.sel.full_text)
                    .await?;
            // Postback popups all share the form's action URL.
            rec.view_url = Some(tab.current_url().await?);
            Ok::<_, BrowserError>(rec)
        }
        .await;
        if let Err(e) = tab.close().await {
            warn!(source = %self.cfg.id, error = %e, "closing detail tab");
        }
        result
    }

    async fn read_row(&self, index: usize) -> Result<VacancyRecord, BrowserError> {
        // Re-located on every use: postbacks replace the DOM.
        let button = ElementRef::root(self.sel.detail_button.as_str(), index);
        if let Err(e) = self.session.evaluate(&self.sel.open_in_new_tab).await {
            warn!(source = %self.cfg.id, error = %e, "could not retarget form");
        }
        let result = self.read_popup(&button).await;
        if let Err(e) = self.session.evaluate(&self.sel.restore_target).await {
            warn!(source = %self.cfg.id, error = %e, "could not restore form target");
        }
        result
    }
}

#[async_trait]
impl SiteAdapter for PostbackGridAdapter {
    fn config(&self) -> &SourceConfig {
        &self.cfg
    }

    async fn open(&mut self) -> Result<(), AdapterError> {
        info!(source = %self.cfg.id, url = %self.cfg.base_url, "navigating to listing");
        self.session
            .navigate(&self.cfg.base_url, self.cfg.timeouts.navigation)
            .await
            .map_err(|source| AdapterError::RootUnreachable {
                url: self.cfg.base_url.clone(),
                source,
            })
    }

    async fn next_page(&mut self) -> Result<Option<PageBatch>, AdapterError> {
        if self.done {
            return Ok(None);
        }
        if self.page > 0 {
            match self.advance().await {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
        self.page += 1;
        info!(source = %self.cfg.id, page = self.page, "processing page");

        match self.confirm_grid().await {
            Ok(Grid::Present) => {}
            Ok(Grid::Empty) => {
                info!(source = %self.cfg.id, "no vacancies available");
                self.done = true;
                return Ok(None);
            }
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        }

        let count = self.session.query(&self.sel.detail_button).await?.len();
        info!(source = %self.cfg.id, page = self.page, rows = count, "found rows");
        if count == 0 {
            self.done = true;
            return Ok(None);
        }

        let mut batch = PageBatch {
            page: self.page,
            ..PageBatch::default()
        };
        for i in 0..count {
            info!(source = %self.cfg.id, page = self.page, row = i + 1, of = count, "reading details");
            match self.read_row(i).await {
                Ok(mut rec) => {
                    if rec.title.is_empty() {
                        rec.title = format!("Vacancy {}.{}", self.page, i + 1);
                    }
                    rec.province = Some(self.cfg.province.clone());
                    batch.records.push(rec);
                }
                Err(e) => {
                    warn!(source = %self.cfg.id, page = self.page, row = i + 1, error = %e, "detail extraction failed");
                    let mut rec =
                        VacancyRecord::new(&self.cfg.id, format!("Vacancy {}.{}", self.page, i + 1));
                    rec.province = Some(self.cfg.province.clone());
                    rec.extraction_error = Some(e.to_string());
                    batch.records.push(rec);
                    batch.detail_errors += 1;
                }
            }
        }
        Ok(Some(batch))
    }

    async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            warn!(source = %self.cfg.id, error = %e, "closing session");
        }
    }
}
