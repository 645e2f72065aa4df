//! In-memory mirror of the remote call collection.
//!
//! The store is the only state Callboard owns. It holds at most one record
//! per id and keeps records ordered by `created_at`, newest first, after
//! every mutation.

use callboard_rs_protocol::CallRecord;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

/// Receives the full ordered snapshot after every store mutation.
///
/// Observers run synchronously, in registration order, while the store is
/// being mutated. They must not call back into the store.
pub trait StoreObserver: Send + Sync {
    /// Called with the new snapshot after a mutation.
    fn records_changed(&self, records: &[CallRecord]);
}

/// Result of an [`RecordStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The id was new; the store grew by one.
    Inserted,
    /// An entry with the same id was replaced.
    Replaced,
}

/// Deduplicated, newest-first list of call records.
#[derive(Default)]
pub struct RecordStore {
    records: Vec<CallRecord>,
    observers: Vec<Arc<dyn StoreObserver>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; it is notified after each later mutation.
    pub fn add_observer(&mut self, observer: Arc<dyn StoreObserver>) {
        self.observers.push(observer);
    }

    /// Current ordered records.
    pub fn snapshot(&self) -> &[CallRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CallRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Insert a record or replace the entry with the same id, keeping order.
    pub fn upsert(&mut self, record: CallRecord) -> UpsertOutcome {
        let outcome = match self.position(&record.id) {
            Some(idx) if self.records[idx].created_at == record.created_at => {
                self.records[idx] = record;
                UpsertOutcome::Replaced
            }
            Some(idx) => {
                self.records.remove(idx);
                self.insert_sorted(record);
                UpsertOutcome::Replaced
            }
            None => {
                self.insert_sorted(record);
                UpsertOutcome::Inserted
            }
        };
        debug!("store upsert (outcome={:?}, len={})", outcome, self.len());
        self.notify();
        outcome
    }

    /// Remove the record with the given id, if present.
    pub fn remove(&mut self, id: &str) -> Option<CallRecord> {
        let idx = self.position(id)?;
        let removed = self.records.remove(idx);
        debug!("store remove (id={}, len={})", id, self.len());
        self.notify();
        Some(removed)
    }

    /// Replace the whole contents. Duplicate ids keep their first occurrence.
    pub fn replace_all(&mut self, records: Vec<CallRecord>) {
        let mut seen = HashSet::with_capacity(records.len());
        let mut records: Vec<CallRecord> = records
            .into_iter()
            .filter(|record| seen.insert(record.id.clone()))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.records = records;
        debug!("store replaced (len={})", self.len());
        self.notify();
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    // Ties on `created_at` place the newcomer first.
    fn insert_sorted(&mut self, record: CallRecord) {
        let idx = self
            .records
            .partition_point(|existing| existing.created_at > record.created_at);
        self.records.insert(idx, record);
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer.records_changed(&self.records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn record(id: &str, created_at: DateTime<Utc>) -> CallRecord {
        CallRecord {
            id: id.to_string(),
            call_id: format!("call-{id}"),
            agent_id: None,
            status: "completed".to_string(),
            duration: 0,
            transcript: None,
            recording_url: None,
            love_the_call: false,
            meeting_requested: false,
            metadata: None,
            created_at,
        }
    }

    fn ids(store: &RecordStore) -> Vec<&str> {
        store.snapshot().iter().map(|r| r.id.as_str()).collect()
    }

    fn is_sorted_desc(records: &[CallRecord]) -> bool {
        records.windows(2).all(|w| w[0].created_at >= w[1].created_at)
    }

    #[derive(Default)]
    struct Recorder {
        lens: Mutex<Vec<usize>>,
    }

    impl StoreObserver for Recorder {
        fn records_changed(&self, records: &[CallRecord]) {
            self.lens.lock().push(records.len());
        }
    }

    #[test]
    fn upsert_keeps_newest_first() {
        let mut store = RecordStore::new();
        store.upsert(record("b", at(2, 0)));
        store.upsert(record("a", at(1, 0)));
        store.upsert(record("c", at(3, 0)));
        store.upsert(record("m", at(2, 12)));
        assert_eq!(ids(&store), vec!["c", "m", "b", "a"]);
        assert!(is_sorted_desc(store.snapshot()));
    }

    #[test]
    fn upsert_existing_id_replaces_without_growing() {
        let mut store = RecordStore::new();
        assert_eq!(store.upsert(record("a", at(1, 0))), UpsertOutcome::Inserted);
        assert_eq!(store.upsert(record("b", at(2, 0))), UpsertOutcome::Inserted);

        let mut updated = record("a", at(1, 0));
        updated.status = "failed".to_string();
        assert_eq!(store.upsert(updated), UpsertOutcome::Replaced);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").map(|r| r.status.as_str()), Some("failed"));
        assert_eq!(ids(&store), vec!["b", "a"]);
    }

    #[test]
    fn upsert_with_new_timestamp_moves_record() {
        let mut store = RecordStore::new();
        store.upsert(record("a", at(1, 0)));
        store.upsert(record("b", at(2, 0)));
        store.upsert(record("c", at(3, 0)));
        store.upsert(record("a", at(4, 0)));
        assert_eq!(ids(&store), vec!["a", "c", "b"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn remove_drops_only_matching_id() {
        let mut store = RecordStore::new();
        store.upsert(record("a", at(1, 0)));
        store.upsert(record("b", at(2, 0)));
        assert_eq!(store.remove("a").map(|r| r.id), Some("a".to_string()));
        assert_eq!(store.remove("missing"), None);
        assert_eq!(ids(&store), vec!["b"]);
    }

    #[test]
    fn replace_all_sorts_and_dedupes() {
        let mut store = RecordStore::new();
        store.upsert(record("stale", at(9, 0)));
        store.replace_all(vec![
            record("a", at(1, 0)),
            record("c", at(3, 0)),
            record("a", at(5, 0)),
            record("b", at(2, 0)),
        ]);
        assert_eq!(ids(&store), vec!["c", "b", "a"]);
        assert_eq!(store.get("a").map(|r| r.created_at), Some(at(1, 0)));
    }

    #[test]
    fn observers_see_every_mutation_in_order() {
        let mut store = RecordStore::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        store.add_observer(first.clone());
        store.add_observer(second.clone());

        store.upsert(record("a", at(1, 0)));
        store.upsert(record("b", at(2, 0)));
        store.remove("a");
        store.remove("missing");
        store.replace_all(Vec::new());

        assert_eq!(*first.lens.lock(), vec![1, 2, 1, 0]);
        assert_eq!(*second.lens.lock(), vec![1, 2, 1, 0]);
    }
}
