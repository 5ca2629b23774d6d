// src/adapters/ajax_table.rs
//! Client-rendered table paged by a "next" control (Gauteng style).
//!
//! Each page: read every row's summary cells first, then visit the detail
//! links one at a time in a separate tab so the listing tab is never touched
//! mid-page. Paging clicks "next" until it is missing or disabled.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{read_detail, AdapterError, PageBatch, SiteAdapter};
use crate::browser::{self, BrowserError, ElementRef, Session};
use crate::config::source::AjaxTableSelectors;
use crate::config::SourceConfig;
use crate::record::{non_empty, VacancyRecord};

pub struct AjaxTableAdapter {
    cfg: SourceConfig,
    sel: AjaxTableSelectors,
    session: Box<dyn Session>,
    page: usize,
    done: bool,
}

enum Advance {
    Moved,
    End,
}

impl AjaxTableAdapter {
    pub fn new(cfg: SourceConfig, sel: AjaxTableSelectors, session: Box<dyn Session>) -> Self {
        Self {
            cfg,
            sel,
            session,
            page: 0,
            done: false,
        }
    }

    async fn wait_rows(&self, selector: &str) -> Result<(), BrowserError> {
        let timeout = self.cfg.timeouts.element;
        self.cfg
            .retry
            .run(|attempt| async move {
                let r = self.session.wait_for(selector, timeout).await;
                if let Err(e) = &r {
                    debug!(source = %self.cfg.id, attempt, error = %e, "waiting for rows");
                }
                r
            })
            .await
    }

    /// Activates "next" unless it is absent or disabled.
    async fn advance(&self) -> Result<Advance, AdapterError> {
        let sel = &self.sel;
        let Some(next) = browser::first(self.session.as_ref(), &sel.next).await? else {
            info!(source = %self.cfg.id, page = self.page, "no next control; last page");
            return Ok(Advance::End);
        };
        let class = self.session.attribute(&next, "class").await?.unwrap_or_default();
        if class.split_whitespace().any(|c| c == sel.disabled_class) {
            info!(source = %self.cfg.id, page = self.page, "next control disabled; last page");
            return Ok(Advance::End);
        }

        info!(source = %self.cfg.id, page = self.page + 1, "clicking next");
        self.session.click(&next).await?;
        if !self.cfg.timeouts.settle.is_zero() {
            tokio::time::sleep(self.cfg.timeouts.settle).await;
        }
        self.wait_rows(&sel.rows)
            .await
            .map_err(|e| AdapterError::PaginationAmbiguous {
                page: self.page,
                reason: e.to_string(),
            })?;
        Ok(Advance::Moved)
    }

    async fn read_row(&self, row: &ElementRef) -> Result<Option<VacancyRecord>, BrowserError> {
        let sel = &self.sel;
        let cells = self.session.query_within(row, &sel.cells).await?;
        if cells.len() < sel.min_cells {
            return Ok(None);
        }
        // position, location, package, closing date
        let mut text = Vec::with_capacity(4);
        for cell in cells.iter().take(4) {
            text.push(non_empty(&self.session.read_text(cell).await?));
        }
        text.resize(4, None);

        let mut rec = VacancyRecord::new(&self.cfg.id, text[0].take().unwrap_or_default());
        rec.location = text[1].take();
        rec.package = text[2].take();
        rec.closing_date = text[3].take();
        rec.province = Some(self.cfg.province.clone());

        if let Some(link) = self
            .session
            .query_within(row, &sel.detail_link)
            .await?
            .into_iter()
            .next()
        {
            if let Some(href) = self.session.attribute(&link, "href").await? {
                rec.detail_url = Some(join_url(&sel.link_base, href.trim()));
            }
        }
        Ok(Some(rec))
    }

    async fn read_detail_tab(&self, url: &str) -> Result<VacancyRecord, BrowserError> {
        let sel = &self.sel;
        let tab = self.session.open_ephemeral_context().await?;
        let result = async {
            tab.navigate(url, self.cfg.timeouts.detail).await?;
            read_detail(tab.as_ref(), &self.cfg.id, &sel.detail_fields, &sel.full_text).await
        }
        .await;
        if let Err(e) = tab.close().await {
            warn!(source = %self.cfg.id, error = %e, "closing detail tab");
        }
        result
    }
}

fn join_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}{}", base, href.trim_start_matches('/'))
    }
}

#[async_trait]
impl SiteAdapter for AjaxTableAdapter {
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
            })?;
        self.wait_rows(&self.sel.table)
            .await
            .map_err(|_| AdapterError::GridUnavailable {
                page: 1,
                attempts: self.cfg.retry.attempts(),
            })
    }

    async fn next_page(&mut self) -> Result<Option<PageBatch>, AdapterError> {
        if self.done {
            return Ok(None);
        }
        if self.page > 0 {
            match self.advance().await {
                Ok(Advance::Moved) => {}
                Ok(Advance::End) => {
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

        let rows = self.session.query(&self.sel.rows).await?;
        info!(source = %self.cfg.id, page = self.page, rows = rows.len(), "processing page");
        if rows.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let mut batch = PageBatch {
            page: self.page,
            ..PageBatch::default()
        };

        // Summaries first, so the listing tab is idle while details load.
        let mut summaries = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match self.read_row(row).await {
                Ok(Some(rec)) => summaries.push(rec),
                Ok(None) => debug!(source = %self.cfg.id, row = i, "skipping layout row"),
                Err(e) => {
                    warn!(source = %self.cfg.id, page = self.page, row = i, error = %e, "row extraction failed");
                    batch.skipped_rows += 1;
                }
            }
        }

        for mut rec in summaries {
            if let Some(url) = rec.detail_url.clone() {
                info!(source = %self.cfg.id, title = %rec.title, "reading details");
                match self.read_detail_tab(&url).await {
                    Ok(detail) => rec.merge_detail(detail),
                    Err(e) => {
                        warn!(source = %self.cfg.id, %url, error = %e, "detail extraction failed");
                        rec.extraction_error = Some(e.to_string());
                        batch.detail_errors += 1;
                    }
                }
            }
            batch.records.push(rec);
        }
        Ok(Some(batch))
    }

    async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            warn!(source = %self.cfg.id, error = %e, "closing session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_links_join_onto_base() {
        let base = "https://jobs.gauteng.gov.za/Public/";
        assert_eq!(
            join_url(base, "ViewJob.aspx?id=7"),
            "https://jobs.gauteng.gov.za/Public/ViewJob.aspx?id=7"
        );
        assert_eq!(join_url(base, "https://x.test/a"), "https://x.test/a");
    }
}
