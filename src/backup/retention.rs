// pgs3/src/backup/retention.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::storage::RemoteObjectRecord;

/// Cutoff for a retention window of `keep_days`, or `None` when pruning is
/// disabled (`keep_days <= 0`).
pub fn retention_cutoff(now: DateTime<Utc>, keep_days: i64) -> Option<DateTime<Utc>> {
    if keep_days <= 0 {
        return None;
    }
    ChronoDuration::try_days(keep_days).and_then(|window| now.checked_sub_signed(window))
}

/// Records modified strictly before `cutoff`, in listing order. A record
/// stamped exactly at the cutoff is kept.
pub fn filter_older_than(
    records: &[RemoteObjectRecord],
    cutoff: DateTime<Utc>,
) -> Vec<RemoteObjectRecord> {
    records
        .iter()
        .filter(|record| record.last_modified < cutoff)
        .cloned()
        .collect()
}
