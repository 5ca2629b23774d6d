// src/adapters/status_page.rs
//! Single status page with no listing (Mpumalanga style).
//!
//! The portal shows a read-only field saying nothing is advertised. Anything
//! other than that text, or links that look like vacancy actions, produces a
//! sentinel record so a human can look at the site.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{AdapterError, PageBatch, SiteAdapter};
use crate::browser::{self, BrowserError, Session};
use crate::config::source::StatusPageSelectors;
use crate::config::SourceConfig;
use crate::record::VacancyRecord;

pub struct StatusPageAdapter {
    cfg: SourceConfig,
    sel: StatusPageSelectors,
    session: Box<dyn Session>,
    done: bool,
}

/// What the status field said.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    NoVacancies,
    Changed(String),
    Missing,
}

impl StatusPageAdapter {
    pub fn new(cfg: SourceConfig, sel: StatusPageSelectors, session: Box<dyn Session>) -> Self {
        Self {
            cfg,
            sel,
            session,
            done: false,
        }
    }

    async fn read_status(&self) -> Result<Status, BrowserError> {
        let Some(field) = browser::first(self.session.as_ref(), &self.sel.status_field).await?
        else {
            return Ok(Status::Missing);
        };
        let mut text = self.session.read_value(&field).await?;
        if text.trim().is_empty() {
            text = self.session.read_text(&field).await?;
        }
        let text = text.trim().to_string();
        info!(source = %self.cfg.id, status = %text, "status text");
        if text.contains(&self.sel.no_vacancies_text) {
            Ok(Status::NoVacancies)
        } else {
            Ok(Status::Changed(text))
        }
    }

    async fn count_candidate_links(&self) -> Result<usize, BrowserError> {
        let wanted: Vec<String> = self
            .sel
            .candidate_texts
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        let mut n = 0;
        for link in self.session.query(&self.sel.candidate_links).await? {
            let text = self.session.read_text(&link).await?.to_lowercase();
            if wanted.iter().any(|w| text.contains(w.as_str())) {
                n += 1;
            }
        }
        Ok(n)
    }

    fn sentinel(&self, suffix: &str, title: &str, notes: String) -> VacancyRecord {
        let mut rec = VacancyRecord::new(&self.cfg.id, title);
        rec.reference_number = Some(format!("{}-{}", self.sel.sentinel_prefix, suffix));
        rec.location = Some(format!("{} Online Portal", self.cfg.province));
        rec.province = Some(self.cfg.province.clone());
        rec.detail_url = Some(self.cfg.base_url.clone());
        rec.notes = Some(notes);
        rec.sentinel = true;
        rec
    }
}

#[async_trait]
impl SiteAdapter for StatusPageAdapter {
    fn config(&self) -> &SourceConfig {
        &self.cfg
    }

    async fn open(&mut self) -> Result<(), AdapterError> {
        info!(source = %self.cfg.id, url = %self.cfg.base_url, "navigating to status page");
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
        self.done = true;

        let mut batch = PageBatch {
            page: 1,
            ..PageBatch::default()
        };

        match self.read_status().await {
            Ok(Status::NoVacancies) => {
                info!(source = %self.cfg.id, "confirmed: no vacancies advertised");
                return Ok(None);
            }
            Ok(Status::Changed(text)) => batch.records.push(self.sentinel(
                "STATUS-CHANGE",
                &format!("{} Site Status Change", self.cfg.province),
                format!("The 'No Vacancies' text has changed to: {text}"),
            )),
            Ok(Status::Missing) => batch.records.push(self.sentinel(
                "STATUS-CHANGE",
                &format!("{} Site Status Change", self.cfg.province),
                "The 'No Vacancies' status field is no longer on the page.".to_string(),
            )),
            Err(e) => {
                warn!(source = %self.cfg.id, error = %e, "status probe failed");
                batch.skipped_rows += 1;
            }
        }

        match self.count_candidate_links().await {
            Ok(0) => {}
            Ok(n) => batch.records.push(self.sentinel(
                "POSSIBLE-JOBS",
                "Possible Jobs Detected (Links Found)",
                format!("Found {n} buttons/links that might be job listings."),
            )),
            Err(e) => {
                warn!(source = %self.cfg.id, error = %e, "link probe failed");
                batch.skipped_rows += 1;
            }
        }

        info!(source = %self.cfg.id, sentinels = batch.records.len(), "status probe done");
        Ok(Some(batch))
    }

    async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            warn!(source = %self.cfg.id, error = %e, "closing session");
        }
    }
}
