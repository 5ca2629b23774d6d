// src/change_detector.rs
//! Novelty detection against the persisted seen-set.

use anyhow::Result;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::record::VacancyRecord;
use crate::seen::{SeenSet, SeenStore};

#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Records not seen before, in listing order.
    pub new_records: Vec<VacancyRecord>,
    /// Input seen-set plus the identifiers of `new_records`.
    pub seen: SeenSet,
    /// Provisional records held back until a later run reads them properly.
    pub deferred: usize,
}

impl Detection {
    pub fn added(&self) -> usize {
        self.new_records.len()
    }
}

/// Splits `records` into new and already-seen, growing `seen` with the new
/// identifiers. Never removes identifiers. Duplicates within `records` count
/// once. Running it again with the returned set yields nothing new.
pub fn detect(records: &[VacancyRecord], mut seen: SeenSet) -> Detection {
    let mut new_records = Vec::new();
    let mut deferred = 0;
    for rec in records {
        if rec.is_provisional() {
            debug!(title = %rec.title, "holding back record without a stable identity");
            deferred += 1;
            continue;
        }
        let id = rec.identifier();
        if seen.insert(id.clone()) {
            info!(source = %rec.source_id, %id, "new vacancy");
            new_records.push(rec.clone());
        }
    }
    Detection {
        new_records,
        seen,
        deferred,
    }
}

/// Seen-set bound to its store: load, diff, persist.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    store: SeenStore,
}

impl ChangeDetector {
    pub fn new(store: SeenStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SeenStore {
        &self.store
    }

    /// Diffs `records` against the stored set and writes it back if, and only
    /// if, something was added.
    pub async fn apply(&self, records: &[VacancyRecord]) -> Result<Detection> {
        let seen = self.store.load().await?;
        info!(path = %self.store.path().display(), known = seen.len(), "loaded seen-set");

        let detection = detect(records, seen);
        if detection.deferred > 0 {
            warn!(deferred = detection.deferred, "records without a stable identity were not marked seen");
        }
        if detection.added() > 0 {
            self.store.save(&detection.seen).await?;
            counter!("vacancy_new_total").increment(detection.added() as u64);
            info!(added = detection.added(), total = detection.seen.len(), "seen-set updated");
        } else {
            info!("no new vacancies");
        }
        Ok(detection)
    }
}
