// src/pipeline.rs
//! Drives one site adapter through its whole listing and checkpoints the
//! accumulated records after every page.

use anyhow::{Context, Result};
use chrono::Local;
use metrics::counter;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::adapters::{AdapterError, SiteAdapter};
use crate::record::VacancyRecord;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        metrics::describe_counter!("vacancy_pages_total", "Listing pages processed.");
        metrics::describe_counter!("vacancy_rows_total", "Vacancy records extracted.");
        metrics::describe_counter!(
            "vacancy_row_errors_total",
            "Rows dropped or kept with an extraction error."
        );
        metrics::describe_counter!("vacancy_run_failures_total", "Runs whose listing root failed.");
    });
}

/// Scratch copy of a run's records, rewritten whole after each page. Only for
/// inspecting a crashed run; nothing reads it back.
#[derive(Debug, Clone)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/<YYYY-MM-DD_HH-MM-SS>/<source_id>_jobs.json`
    pub fn timestamped(data_dir: &Path, source_id: &str) -> Self {
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        Self::new(data_dir.join(stamp).join(format!("{source_id}_jobs.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, records: &[VacancyRecord]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(records).context("serializing records")?;
        fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

/// Result of one traversal.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Listing order. Empty when `failure` is set.
    pub records: Vec<VacancyRecord>,
    pub pages: usize,
    pub skipped_rows: usize,
    pub detail_errors: usize,
    /// The listing root could not be reached.
    pub failure: Option<AdapterError>,
    /// Traversal stopped before the listing said it was done.
    pub truncated: Option<String>,
}

impl Extraction {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.truncated.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionPipeline {
    scratch: Option<ScratchFile>,
}

impl ExtractionPipeline {
    pub fn new(scratch: Option<ScratchFile>) -> Self {
        Self { scratch }
    }

    async fn checkpoint(&self, records: &[VacancyRecord]) {
        let Some(scratch) = &self.scratch else {
            return;
        };
        match scratch.write(records).await {
            Ok(()) => info!(path = %scratch.path().display(), total = records.len(), "progress saved"),
            Err(e) => warn!(error = ?e, "checkpoint failed"),
        }
    }

    /// Runs `adapter` to exhaustion. Never returns an error: a root failure is
    /// reported in `failure` with no records, anything later ends the listing
    /// early and is reported in `truncated`.
    pub async fn run(&self, adapter: &mut dyn SiteAdapter) -> Extraction {
        ensure_metrics_described();
        let source = adapter.config().id.clone();
        let mut out = Extraction::default();

        if let Err(e) = adapter.open().await {
            adapter.close().await;
            if e.is_fatal() {
                warn!(%source, error = %e, "listing root failed");
                counter!("vacancy_run_failures_total", "source" => source.clone()).increment(1);
                out.failure = Some(e);
            } else {
                warn!(%source, error = %e, "listing did not load; treating as end of listing");
                out.truncated = Some(e.to_string());
            }
            return out;
        }

        loop {
            match adapter.next_page().await {
                Ok(Some(batch)) => {
                    out.pages += 1;
                    out.skipped_rows += batch.skipped_rows;
                    out.detail_errors += batch.detail_errors;
                    counter!("vacancy_pages_total", "source" => source.clone()).increment(1);
                    counter!("vacancy_rows_total", "source" => source.clone())
                        .increment(batch.records.len() as u64);
                    counter!("vacancy_row_errors_total", "source" => source.clone())
                        .increment((batch.skipped_rows + batch.detail_errors) as u64);
                    info!(%source, page = batch.page, rows = batch.records.len(), "page done");
                    out.records.extend(batch.records);
                    self.checkpoint(&out.records).await;
                }
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    warn!(%source, error = %e, "listing root failed mid-run");
                    counter!("vacancy_run_failures_total", "source" => source.clone()).increment(1);
                    out.records.clear();
                    out.failure = Some(e);
                    break;
                }
                Err(e) => {
                    warn!(%source, error = %e, pages = out.pages, "traversal ended early; results may be incomplete");
                    out.truncated = Some(e.to_string());
                    break;
                }
            }
        }
        adapter.close().await;

        info!(
            %source,
            pages = out.pages,
            records = out.records.len(),
            skipped = out.skipped_rows,
            detail_errors = out.detail_errors,
            complete = out.is_complete(),
            "extraction finished"
        );
        out
    }
}
