// tests/runner_e2e.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vacancy_watch::browser::scripted::{Click, Node, ScriptedBrowser, ScriptedPage};
use vacancy_watch::config::source::Timeouts;
use vacancy_watch::config::{AppConfig, SourceConfig};
use vacancy_watch::notify::{Digest, Notifier, StatusReport};
use vacancy_watch::retry::RetryPolicy;
use vacancy_watch::runner::run_source;
use vacancy_watch::seen::SeenStore;

const LIST: &str = "https://g.test/list";
const DETAIL_BASE: &str = "https://jobs.gauteng.gov.za/Public/ViewJob.aspx?id=";

#[derive(Default)]
struct MockSink {
    fail: bool,
    digests: Mutex<Vec<Digest>>,
    statuses: Mutex<Vec<StatusReport>>,
}

#[async_trait]
impl Notifier for MockSink {
    async fn send_digest(&self, digest: &Digest) -> Result<()> {
        self.digests.lock().unwrap().push(digest.clone());
        if self.fail {
            return Err(anyhow!("webhook down"));
        }
        Ok(())
    }

    async fn send_status(&self, status: &StatusReport) -> Result<()> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

fn cfg(base: &str) -> SourceConfig {
    let mut c = SourceConfig::gauteng();
    c.base_url = base.into();
    c.timeouts = Timeouts::immediate();
    c.retry = RetryPolicy::new(1, Duration::ZERO);
    c
}

fn app(dir: &Path, daily: bool) -> AppConfig {
    AppConfig {
        daily_summary: daily,
        state_dir: dir.join("state"),
        data_dir: dir.join("data"),
        ..AppConfig::default()
    }
}

fn row(id: u32) -> Node {
    Node::text("")
        .child(
            "td",
            (0..5).map(|i| Node::text(format!("cell {id}.{i}"))).collect(),
        )
        .child(
            "a[href^='ViewJob.aspx']",
            vec![Node::text("View").attr("href", format!("ViewJob.aspx?id={id}"))],
        )
}

fn portal(ids: &[u32]) -> Arc<ScriptedBrowser> {
    let mut b = ScriptedBrowser::new().page(
        LIST,
        ScriptedPage::new()
            .with("table#tblJobs", vec![Node::text("")])
            .with("table#tblJobs tbody tr", ids.iter().map(|i| row(*i)).collect())
            .with(
                "#tblJobs_next",
                vec![Node::text("Next")
                    .attr("class", "next disabled")
                    .on_click(Click::Fail("should not be clicked".into()))],
            ),
    );
    for id in ids {
        b = b.page(
            format!("{DETAIL_BASE}{id}"),
            ScriptedPage::new().with("#body_lblRefNo", vec![Node::text(format!("GDH/{id}"))]),
        );
    }
    Arc::new(b)
}

#[tokio::test]
async fn first_run_notifies_second_run_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), false);
    let sink = MockSink::default();

    let b = portal(&[1, 2, 3]);
    let r1 = run_source(cfg(LIST), Box::new(b.session()), &app, &sink).await.unwrap();
    assert_eq!((r1.listed, r1.new), (3, 3));
    assert!(r1.notified);
    assert!(r1.is_ok());

    let stored = SeenStore::for_source(&app.state_dir, "gauteng").load().await.unwrap();
    assert_eq!(stored.iter().collect::<Vec<_>>(), vec!["GDH/1", "GDH/2", "GDH/3"]);

    let b = portal(&[1, 2, 3, 4]);
    let r2 = run_source(cfg(LIST), Box::new(b.session()), &app, &sink).await.unwrap();
    assert_eq!((r2.listed, r2.new), (4, 1));

    let digests = sink.digests.lock().unwrap();
    assert_eq!(digests.len(), 2);
    assert_eq!(digests[1].records[0].identifier(), "GDH/4");
    assert_eq!(digests[1].title(), "1 new vacancy — Gauteng Health");

    // A scratch file was written for each run.
    assert!(std::fs::read_dir(app.data_dir.clone()).unwrap().count() >= 1);
}

#[tokio::test]
async fn empty_listing_sends_nothing_and_writes_no_state() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), false);
    let sink = MockSink::default();

    let b = portal(&[]);
    let r = run_source(cfg(LIST), Box::new(b.session()), &app, &sink).await.unwrap();
    assert_eq!((r.listed, r.new, r.notified), (0, 0, false));
    assert!(sink.digests.lock().unwrap().is_empty());
    assert!(!SeenStore::for_source(&app.state_dir, "gauteng").path().exists());
}

#[tokio::test]
async fn failed_delivery_still_marks_vacancies_seen() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), false);
    let sink = MockSink {
        fail: true,
        ..MockSink::default()
    };

    let r1 = run_source(cfg(LIST), Box::new(portal(&[7]).session()), &app, &sink)
        .await
        .unwrap();
    assert_eq!(r1.new, 1);
    assert!(!r1.notified);

    let r2 = run_source(cfg(LIST), Box::new(portal(&[7]).session()), &app, &sink)
        .await
        .unwrap();
    assert_eq!(r2.new, 0);
    assert_eq!(sink.digests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_root_reports_failure_and_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), true);
    let sink = MockSink::default();
    let store = SeenStore::for_source(&app.state_dir, "gauteng");
    store.save(&["GDH/1"].into_iter().collect()).await.unwrap();

    let b = Arc::new(ScriptedBrowser::new().unreachable(LIST));
    let r = run_source(cfg(LIST), Box::new(b.session()), &app, &sink).await.unwrap();

    assert!(r.failure.is_some());
    assert_eq!(r.new, 0);
    assert_eq!(store.load().await.unwrap().len(), 1);
    assert!(sink.digests.lock().unwrap().is_empty());
    assert!(sink.statuses.lock().unwrap().is_empty());
}

#[tokio::test]
async fn daily_status_reports_listing_size() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), true);
    let sink = MockSink::default();

    run_source(cfg(LIST), Box::new(portal(&[1, 2]).session()), &app, &sink)
        .await
        .unwrap();
    run_source(cfg(LIST), Box::new(portal(&[1, 2]).session()), &app, &sink)
        .await
        .unwrap();

    let statuses = sink.statuses.lock().unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[1].listed, 2);
    assert_eq!(
        statuses[1].description(),
        "There are currently **2** vacancies listed."
    );
}

#[tokio::test]
async fn corrupt_seen_set_aborts_before_touching_the_portal() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), false);
    let store = SeenStore::for_source(&app.state_dir, "gauteng");
    std::fs::create_dir_all(&app.state_dir).unwrap();
    std::fs::write(store.path(), "[oops").unwrap();

    let b = portal(&[1]);
    let sink = MockSink::default();
    assert!(run_source(cfg(LIST), Box::new(b.session()), &app, &sink).await.is_err());
    assert!(b.log().is_empty());
}
