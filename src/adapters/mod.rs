// src/adapters/mod.rs
//! Site adapters: one per portal layout, each a small traversal state machine
//! over a [`Session`].
//!
//! New portals are added as new variants here; shared code never branches on
//! which portal it is talking to.

pub mod ajax_table;
pub mod postback_grid;
pub mod status_page;

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::{self, BrowserError, Session};
use crate::config::source::DetailField;
use crate::config::{Layout, SourceConfig};
use crate::record::{non_empty, VacancyRecord};

pub use ajax_table::AjaxTableAdapter;
pub use postback_grid::PostbackGridAdapter;
pub use status_page::StatusPageAdapter;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The listing root could not be loaded at all. Fatal for the run.
    #[error("cannot reach listing {url}: {source}")]
    RootUnreachable {
        url: String,
        #[source]
        source: BrowserError,
    },
    #[error("listing did not render on page {page} after {attempts} attempt(s)")]
    GridUnavailable { page: usize, attempts: u32 },
    #[error("lost track of pagination after page {page}: {reason}")]
    PaginationAmbiguous { page: usize, reason: String },
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl AdapterError {
    /// Only an unreachable root aborts a run; everything else ends the
    /// traversal early with what has been collected.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AdapterError::RootUnreachable { .. })
    }
}

/// Records from one listing page, in listing order.
#[derive(Debug, Clone, Default)]
pub struct PageBatch {
    pub page: usize,
    pub records: Vec<VacancyRecord>,
    /// Rows that could not be read at all and were dropped.
    pub skipped_rows: usize,
    /// Records kept with `extraction_error` set.
    pub detail_errors: usize,
}

#[async_trait]
pub trait SiteAdapter: Send {
    fn config(&self) -> &SourceConfig;

    /// Loads the listing root.
    async fn open(&mut self) -> Result<(), AdapterError>;

    /// Processes the next listing page. `Ok(None)` once the listing is exhausted.
    async fn next_page(&mut self) -> Result<Option<PageBatch>, AdapterError>;

    /// Releases the session.
    async fn close(&mut self);

    /// Whole listing in one go. Non-fatal traversal errors end the listing
    /// early and keep what was collected.
    async fn list_vacancies(&mut self) -> Result<Vec<VacancyRecord>, AdapterError> {
        self.open().await?;
        let mut out = Vec::new();
        loop {
            match self.next_page().await {
                Ok(Some(batch)) => out.extend(batch.records),
                Ok(None) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(source = %self.config().id, error = %e, "listing ended early");
                    break;
                }
            }
        }
        Ok(out)
    }
}

/// Adapter matching the source's layout.
pub fn build(cfg: SourceConfig, session: Box<dyn Session>) -> Box<dyn SiteAdapter> {
    match &cfg.layout {
        Layout::AjaxTable(sel) => {
            let sel = sel.clone();
            Box::new(AjaxTableAdapter::new(cfg, sel, session))
        }
        Layout::PostbackGrid(sel) => {
            let sel = sel.clone();
            Box::new(PostbackGridAdapter::new(cfg, sel, session))
        }
        Layout::StatusPage(sel) => {
            let sel = sel.clone();
            Box::new(StatusPageAdapter::new(cfg, sel, session))
        }
    }
}

fn set_field(rec: &mut VacancyRecord, field: DetailField, value: Option<String>) {
    match field {
        DetailField::Title => rec.title = value.unwrap_or_default(),
        DetailField::ReferenceNumber => rec.reference_number = value,
        DetailField::Directorate => rec.directorate = value,
        DetailField::Location => rec.location = value,
        DetailField::Package => rec.package = value,
        DetailField::ClosingDate => rec.closing_date = value,
        DetailField::Enquiries => rec.enquiries = value,
        DetailField::Requirements => rec.requirements = value,
        DetailField::Duties => rec.duties = value,
        DetailField::Notes => rec.notes = value,
    }
}

/// Reads labeled fields off a loaded detail view. A missing label leaves the
/// field empty; the first matching `full_text` container is captured verbatim
/// so nothing is lost when labels drift.
pub(crate) async fn read_detail(
    session: &dyn Session,
    source_id: &str,
    fields: &[(DetailField, String)],
    full_text: &[String],
) -> Result<VacancyRecord, BrowserError> {
    let mut rec = VacancyRecord::new(source_id, "");
    for (field, selector) in fields {
        let value = browser::first_text(session, selector)
            .await?
            .and_then(|t| non_empty(&t));
        set_field(&mut rec, *field, value);
    }
    for selector in full_text {
        if let Some(text) = browser::first_text(session, selector).await? {
            rec.raw_detail_text = Some(text);
            break;
        }
    }
    Ok(rec)
}
