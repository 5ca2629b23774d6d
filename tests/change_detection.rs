// tests/change_detection.rs
use vacancy_watch::change_detector::{detect, ChangeDetector};
use vacancy_watch::record::VacancyRecord;
use vacancy_watch::seen::{SeenSet, SeenStore};

fn with_ref(r: &str) -> VacancyRecord {
    let mut v = VacancyRecord::new("gauteng", format!("Post {r}"));
    v.reference_number = Some(r.to_string());
    v
}

#[test]
fn scenario_a_empty_listing_is_a_no_op() {
    let d = detect(&[], SeenSet::new());
    assert!(d.new_records.is_empty());
    assert!(d.seen.is_empty());
}

#[test]
fn scenario_b_only_unseen_in_listing_order() {
    let records = vec![with_ref("A1"), with_ref("A2"), with_ref("A3")];
    let seen: SeenSet = ["A1"].into_iter().collect();

    let d = detect(&records, seen);
    let ids: Vec<_> = d.new_records.iter().map(|r| r.identifier()).collect();
    assert_eq!(ids, vec!["A2", "A3"]);
    assert_eq!(d.seen.iter().collect::<Vec<_>>(), vec!["A1", "A2", "A3"]);
}

#[test]
fn scenario_c_composite_identifier() {
    let mut r = VacancyRecord::new("gauteng", "Nurse");
    r.location = Some("Soweto".into());
    assert_eq!(r.identifier(), "Nurse-Soweto");
    let d = detect(&[r], SeenSet::new());
    assert!(d.seen.contains("Nurse-Soweto"));
}

#[test]
fn second_pass_finds_nothing_and_set_is_stable() {
    let records: Vec<_> = (0..10).map(|i| with_ref(&format!("R{i}"))).collect();
    let first = detect(&records, ["R3", "R7"].into_iter().collect());
    assert_eq!(first.added(), 8);

    let second = detect(&records, first.seen.clone());
    assert!(second.new_records.is_empty());
    assert_eq!(second.seen, first.seen);
}

#[test]
fn seen_set_never_shrinks() {
    let seen: SeenSet = ["OLD1", "OLD2"].into_iter().collect();
    // Listing no longer shows OLD1/OLD2.
    let d = detect(&[with_ref("NEW")], seen);
    assert_eq!(d.seen.len(), 3);
    assert!(d.seen.contains("OLD1"));
    assert!(d.seen.contains("OLD2"));
}

#[tokio::test]
async fn detector_persists_only_when_something_was_added() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeenStore::for_source(dir.path(), "gauteng");
    let detector = ChangeDetector::new(store.clone());

    let d = detector.apply(&[]).await.unwrap();
    assert_eq!(d.added(), 0);
    assert!(!store.path().exists());

    let d = detector.apply(&[with_ref("A1"), with_ref("A2")]).await.unwrap();
    assert_eq!(d.added(), 2);
    let on_disk = store.load().await.unwrap();
    assert_eq!(on_disk.iter().collect::<Vec<_>>(), vec!["A1", "A2"]);

    let d = detector.apply(&[with_ref("A2"), with_ref("A1")]).await.unwrap();
    assert_eq!(d.added(), 0);
}
