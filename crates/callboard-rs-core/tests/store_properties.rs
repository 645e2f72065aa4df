//! Property tests for `RecordStore` mutations and the projections over it.
//!
//! Sequences of upserts and removes over a small id space, so ids collide
//! often, with timestamps drawn from a narrow window, so ties are common.
//! After every step:
//! - ids are unique and records are newest first.
//! - an upsert grows the store only for an unseen id.
//! - stats totals and route filters agree with the snapshot.

use callboard_rs_core::{HOME_LIMIT, RecordStore, Route, UpsertOutcome, compute_stats, filter_for};
use callboard_rs_protocol::CallRecord;
use callboard_rs_test_utils::call;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Upsert {
        id: u8,
        minute: i64,
        duration: u64,
        loved: bool,
        meeting: bool,
    },
    Remove(u8),
}

fn record(id: u8, minute: i64, duration: u64, loved: bool, meeting: bool) -> CallRecord {
    let mut record = call(&id.to_string()).duration(duration).build();
    record.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        + chrono::Duration::minutes(minute);
    record.love_the_call = loved;
    record.meeting_requested = meeting;
    record
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..12, 0i64..20, any::<u64>(), any::<bool>(), any::<bool>()).prop_map(
            |(id, minute, duration, loved, meeting)| Op::Upsert {
                id,
                minute,
                duration,
                loved,
                meeting,
            }
        ),
        1 => (0u8..12).prop_map(Op::Remove),
    ]
}

fn assert_store_invariants(records: &[CallRecord]) -> Result<(), TestCaseError> {
    let ids: HashSet<&str> = records.iter().map(|record| record.id.as_str()).collect();
    prop_assert_eq!(ids.len(), records.len());
    for pair in records.windows(2) {
        prop_assert!(pair[0].created_at >= pair[1].created_at);
    }

    let stats = compute_stats(records);
    prop_assert_eq!(stats.total, records.len());
    prop_assert_eq!(
        stats.meeting_count,
        records.iter().filter(|record| record.meeting_requested).count()
    );

    let home = filter_for(Route::Home, records);
    prop_assert_eq!(home.len(), records.len().min(HOME_LIMIT));
    let all = filter_for(Route::Calls, records);
    prop_assert_eq!(all.len(), records.len());
    for route in [Route::Meetings, Route::Leads] {
        let visible = filter_for(route, records);
        let positions: Vec<usize> = visible
            .iter()
            .filter_map(|shown| records.iter().position(|record| record.id == shown.id))
            .collect();
        prop_assert_eq!(positions.len(), visible.len());
        prop_assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }
    Ok(())
}

proptest! {
    #[test]
    fn mutations_keep_store_ordered_and_unique(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut store = RecordStore::new();
        for op in ops {
            match op {
                Op::Upsert { id, minute, duration, loved, meeting } => {
                    let key = id.to_string();
                    let existed = store.get(&key).is_some();
                    let before = store.len();
                    let outcome = store.upsert(record(id, minute, duration, loved, meeting));
                    if existed {
                        prop_assert_eq!(outcome, UpsertOutcome::Replaced);
                        prop_assert_eq!(store.len(), before);
                    } else {
                        prop_assert_eq!(outcome, UpsertOutcome::Inserted);
                        prop_assert_eq!(store.len(), before + 1);
                    }
                    prop_assert_eq!(store.get(&key).map(|record| record.duration), Some(duration));
                }
                Op::Remove(id) => {
                    let key = id.to_string();
                    let existed = store.get(&key).is_some();
                    let before = store.len();
                    let removed = store.remove(&key);
                    prop_assert_eq!(removed.is_some(), existed);
                    prop_assert_eq!(store.len(), before - usize::from(existed));
                    prop_assert!(store.get(&key).is_none());
                }
            }
            assert_store_invariants(store.snapshot())?;
        }
    }

    #[test]
    fn replace_all_matches_incremental_contents(
        rows in prop::collection::vec((0u8..12, 0i64..20, 0u64..10_000), 0..40)
    ) {
        let records: Vec<CallRecord> = rows
            .iter()
            .map(|&(id, minute, duration)| record(id, minute, duration, false, false))
            .collect();
        let mut bulk = RecordStore::new();
        bulk.replace_all(records.clone());
        assert_store_invariants(bulk.snapshot())?;

        let mut first_seen: Vec<&CallRecord> = Vec::new();
        for candidate in &records {
            if !first_seen.iter().any(|kept| kept.id == candidate.id) {
                first_seen.push(candidate);
            }
        }
        prop_assert_eq!(bulk.len(), first_seen.len());
        for kept in first_seen {
            prop_assert_eq!(bulk.get(&kept.id), Some(kept));
        }
    }
}
