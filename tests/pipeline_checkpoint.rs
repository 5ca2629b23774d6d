// tests/pipeline_checkpoint.rs
use std::sync::Arc;
use std::time::Duration;

use vacancy_watch::adapters;
use vacancy_watch::browser::scripted::{Click, Node, ScriptedBrowser, ScriptedPage};
use vacancy_watch::config::source::Timeouts;
use vacancy_watch::config::SourceConfig;
use vacancy_watch::pipeline::{ExtractionPipeline, ScratchFile};
use vacancy_watch::record::VacancyRecord;
use vacancy_watch::retry::RetryPolicy;

const LIST: &str = "https://wc.test/list";
const LIST_P2: &str = "https://wc.test/list#2";
const LIST_P3: &str = "https://wc.test/list#3";
const GRID: &str = "table#vacancyListingView";
const BUTTON: &str = "input[value='Vacancy Details']";

fn cfg() -> SourceConfig {
    let mut c = SourceConfig::western_cape();
    c.base_url = LIST.into();
    c.timeouts = Timeouts::immediate();
    c.retry = RetryPolicy::new(2, Duration::ZERO);
    c
}

fn page(popup: &str, next: Option<(u32, &str)>) -> ScriptedPage {
    let mut p = ScriptedPage::new()
        .with(GRID, vec![Node::text("")])
        .with(BUTTON, vec![Node::text("").on_click(Click::Popup(popup.into()))]);
    if let Some((n, url)) = next {
        p = p.with(
            format!("tr.GridPager a[href*='Page${n}']"),
            vec![Node::text(n.to_string()).on_click(Click::Goto(url.into()))],
        );
    }
    p
}

fn detail(reference: &str) -> ScriptedPage {
    ScriptedPage::new()
        .with("span[id*='lblReferenceNumber']", vec![Node::text(reference)])
        .with("span[id*='lblPost']", vec![Node::text(format!("Post {reference}"))])
}

fn read_scratch(path: &std::path::Path) -> Vec<VacancyRecord> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn scratch_holds_everything_after_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = ScratchFile::new(dir.path().join("run").join("western_cape_jobs.json"));
    let b = Arc::new(
        ScriptedBrowser::new()
            .page(LIST, page("https://wc.test/d/1", Some((2, LIST_P2))))
            .page(LIST_P2, page("https://wc.test/d/2", None))
            .page("https://wc.test/d/1", detail("R1"))
            .page("https://wc.test/d/2", detail("R2")),
    );

    let mut adapter = adapters::build(cfg(), Box::new(b.session()));
    let out = ExtractionPipeline::new(Some(scratch.clone()))
        .run(adapter.as_mut())
        .await;

    assert_eq!(out.pages, 2);
    assert_eq!(read_scratch(scratch.path()), out.records);
}

#[tokio::test]
async fn pages_before_a_broken_page_survive_in_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = ScratchFile::new(dir.path().join("western_cape_jobs.json"));
    // Page 3 never renders its grid.
    let b = Arc::new(
        ScriptedBrowser::new()
            .page(LIST, page("https://wc.test/d/1", Some((2, LIST_P2))))
            .page(LIST_P2, page("https://wc.test/d/2", Some((3, LIST_P3))))
            .page(LIST_P3, ScriptedPage::new())
            .page("https://wc.test/d/1", detail("R1"))
            .page("https://wc.test/d/2", detail("R2")),
    );

    let mut adapter = adapters::build(cfg(), Box::new(b.session()));
    let out = ExtractionPipeline::new(Some(scratch.clone()))
        .run(adapter.as_mut())
        .await;

    assert!(out.failure.is_none());
    assert!(out.truncated.is_some());
    assert_eq!(out.pages, 2);
    let saved: Vec<_> = read_scratch(scratch.path()).iter().map(|r| r.identifier()).collect();
    assert_eq!(saved, vec!["R1", "R2"]);
}

#[tokio::test]
async fn root_failure_yields_no_records_and_no_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = ScratchFile::new(dir.path().join("x.json"));
    let b = Arc::new(ScriptedBrowser::new().unreachable(LIST));

    let mut adapter = adapters::build(cfg(), Box::new(b.session()));
    let out = ExtractionPipeline::new(Some(scratch.clone()))
        .run(adapter.as_mut())
        .await;

    assert!(out.records.is_empty());
    assert!(out.failure.as_ref().is_some_and(|e| e.is_fatal()));
    assert!(!scratch.path().exists());
    // Session is released even on failure.
    assert_eq!(b.log().last().map(String::as_str), Some("close"));
}

#[test]
fn timestamped_scratch_path_layout() {
    let s = ScratchFile::timestamped(std::path::Path::new("data"), "gauteng");
    let p = s.path();
    assert_eq!(p.file_name().unwrap(), "gauteng_jobs.json");
    let stamp = p.parent().unwrap().file_name().unwrap().to_str().unwrap();
    assert_eq!(stamp.len(), "2025-01-31_23-59-59".len());
    assert!(p.starts_with("data"));
}
