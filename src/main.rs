//! vacancy-watch binary entrypoint.
//! Runs each selected source in turn against a headless Chromium and reports
//! new vacancies. Source ids are positional arguments; none means all.

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vacancy_watch::browser::chromium::ChromiumBrowser;
use vacancy_watch::config::source::{load_sources_default, select_sources};
use vacancy_watch::config::AppConfig;
use vacancy_watch::runner::{notifier_from_config, run_source, RunReport};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vacancy_watch=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let app = AppConfig::from_env();
    let wanted: Vec<String> = std::env::args().skip(1).collect();
    let sources = select_sources(load_sources_default()?, &wanted)?;
    let notifier = notifier_from_config(&app);

    let browser = ChromiumBrowser::launch()
        .await
        .context("starting Chromium")?;

    let mut reports: Vec<RunReport> = Vec::new();
    for cfg in sources {
        let id = cfg.id.clone();
        let session = match browser.new_session().await {
            Ok(s) => s,
            Err(e) => {
                error!(source = %id, error = %e, "could not open a browser page");
                reports.push(RunReport {
                    source_id: id,
                    failure: Some(e.to_string()),
                    ..RunReport::default()
                });
                continue;
            }
        };
        match run_source(cfg, Box::new(session), &app, notifier.as_ref()).await {
            Ok(r) => reports.push(r),
            Err(e) => {
                error!(source = %id, error = ?e, "run aborted");
                reports.push(RunReport {
                    source_id: id,
                    failure: Some(format!("{e:#}")),
                    ..RunReport::default()
                });
            }
        }
    }

    for r in &reports {
        info!(
            source = %r.source_id,
            listed = r.listed,
            new = r.new,
            notified = r.notified,
            failure = r.failure.as_deref().unwrap_or("-"),
            truncated = r.truncated.as_deref().unwrap_or("-"),
            "summary"
        );
    }
    if reports.iter().any(|r| !r.is_ok()) {
        anyhow::bail!("one or more sources failed");
    }
    Ok(())
}
