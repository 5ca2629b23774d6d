// src/runner.rs
//! One source, end to end: extract, diff, persist, notify.

use anyhow::Result;
use tracing::{info, warn};

use crate::adapters;
use crate::browser::Session;
use crate::change_detector::ChangeDetector;
use crate::config::{AppConfig, SourceConfig};
use crate::notify::discord::DiscordNotifier;
use crate::notify::{Digest, LogNotifier, Notifier, StatusReport};
use crate::pipeline::{ExtractionPipeline, ScratchFile};
use crate::seen::SeenStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub source_id: String,
    /// Records extracted this run, including error-marked ones.
    pub listed: usize,
    pub new: usize,
    /// The listing root could not be reached.
    pub failure: Option<String>,
    /// Traversal ended before the listing was exhausted.
    pub truncated: Option<String>,
    /// The digest was delivered.
    pub notified: bool,
}

impl RunReport {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Webhook notifier when one is configured, log-only otherwise.
pub fn notifier_from_config(app: &AppConfig) -> Box<dyn Notifier> {
    match &app.webhook_url {
        Some(url) => Box::new(DiscordNotifier::new(url.clone()).with_timeout(app.notify_timeout)),
        None => {
            warn!("DISCORD_WEBHOOK_URL not set; notifications will only be logged");
            Box::new(LogNotifier)
        }
    }
}

/// Runs one source. The seen-set is written before the digest goes out, so a
/// failed delivery is not retried on the next run.
///
/// Errors are limited to seen-set I/O; extraction and delivery problems are
/// reported in the returned [`RunReport`].
pub async fn run_source(
    cfg: SourceConfig,
    session: Box<dyn Session>,
    app: &AppConfig,
    notifier: &dyn Notifier,
) -> Result<RunReport> {
    let source_id = cfg.id.clone();
    let source_name = cfg.name.clone();
    let color = cfg.color;
    info!(source = %source_id, name = %source_name, pagination = cfg.layout.pagination(), "starting run");

    let detector = ChangeDetector::new(SeenStore::for_source(&app.state_dir, &source_id));
    // Fail on an unreadable seen-set before spending time on the portal.
    detector.store().load().await?;

    let scratch = ScratchFile::timestamped(&app.data_dir, &source_id);
    let pipeline = ExtractionPipeline::new(Some(scratch));
    let mut adapter = adapters::build(cfg, session);
    let extraction = pipeline.run(adapter.as_mut()).await;

    let mut report = RunReport {
        source_id: source_id.clone(),
        listed: extraction.records.len(),
        failure: extraction.failure.as_ref().map(|e| e.to_string()),
        truncated: extraction.truncated.clone(),
        ..RunReport::default()
    };

    if let Some(e) = &extraction.failure {
        warn!(source = %source_id, error = %e, "run failed; seen-set untouched");
        return Ok(report);
    }

    let detection = detector.apply(&extraction.records).await?;
    report.new = detection.added();

    if !detection.new_records.is_empty() {
        let digest = Digest {
            source_id: source_id.clone(),
            source_name: source_name.clone(),
            color,
            records: detection.new_records,
        };
        match notifier.send_digest(&digest).await {
            Ok(()) => report.notified = true,
            Err(e) => warn!(source = %source_id, error = ?e, "digest delivery failed; vacancies stay marked seen"),
        }
    }

    if app.daily_summary {
        let status = StatusReport {
            source_id: source_id.clone(),
            source_name,
            color,
            listed: report.listed,
            truncated: report.truncated.clone(),
        };
        if let Err(e) = notifier.send_status(&status).await {
            warn!(source = %source_id, error = ?e, "daily status delivery failed");
        }
    }

    info!(
        source = %source_id,
        listed = report.listed,
        new = report.new,
        notified = report.notified,
        truncated = report.truncated.is_some(),
        "run finished"
    );
    Ok(report)
}
