//! Summary statistics derived from a store snapshot.

use callboard_rs_protocol::CallRecord;

/// Aggregates shown on the dashboard tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    /// Mean duration in whole seconds, truncated; `0` for an empty set.
    pub average_duration_seconds: u64,
    pub meeting_count: usize,
    pub positive_count: usize,
}

/// Compute [`Stats`] over the full record set.
pub fn compute_stats(records: &[CallRecord]) -> Stats {
    let total = records.len();
    // u128 so that summing u64 durations cannot overflow.
    let total_duration: u128 = records.iter().map(|record| u128::from(record.duration)).sum();
    let average_duration_seconds = if total == 0 {
        0
    } else {
        u64::try_from(total_duration / total as u128).unwrap_or(u64::MAX)
    };
    Stats {
        total,
        average_duration_seconds,
        meeting_count: records.iter().filter(|r| r.meeting_requested).count(),
        positive_count: records.iter().filter(|r| r.love_the_call).count(),
    }
}
