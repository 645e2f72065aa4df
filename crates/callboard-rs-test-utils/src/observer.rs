use callboard_rs_core::StoreObserver;
use callboard_rs_protocol::CallRecord;
use parking_lot::Mutex;
use std::sync::Arc;

/// Observer that records the ids of every snapshot it receives.
///
/// Observers sharing a `log` append `(tag, ids)` pairs to it, which lets a
/// test assert on notification order across observers.
#[derive(Clone)]
pub struct RecordingObserver {
    tag: &'static str,
    log: Arc<Mutex<Vec<(&'static str, Vec<String>)>>>,
}

impl RecordingObserver {
    pub fn new(tag: &'static str) -> Self {
        Self::with_log(tag, Arc::default())
    }

    pub fn with_log(tag: &'static str, log: Arc<Mutex<Vec<(&'static str, Vec<String>)>>>) -> Self {
        Self { tag, log }
    }

    pub fn log(&self) -> Arc<Mutex<Vec<(&'static str, Vec<String>)>>> {
        self.log.clone()
    }

    /// Snapshots seen by this observer, oldest notification first.
    pub fn snapshots(&self) -> Vec<Vec<String>> {
        self.log
            .lock()
            .iter()
            .filter(|(tag, _)| *tag == self.tag)
            .map(|(_, ids)| ids.clone())
            .collect()
    }
}

impl StoreObserver for RecordingObserver {
    fn records_changed(&self, records: &[CallRecord]) {
        let ids = records.iter().map(|record| record.id.clone()).collect();
        self.log.lock().push((self.tag, ids));
    }
}
