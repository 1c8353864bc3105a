// pgs3/src/restore/latest.rs
use crate::errors::{AppError, Result};
use crate::storage::RemoteObjectRecord;

/// Key of the most recently modified record.
///
/// On a timestamp tie the record listed first wins. Listing order depends
/// on the store backend, so ties are only deterministic for a given listing.
pub fn latest_key(bucket: &str, records: &[RemoteObjectRecord]) -> Result<String> {
    let mut iter = records.iter();
    let mut latest = iter.next().ok_or_else(|| AppError::NotFound {
        bucket: bucket.to_string(),
    })?;
    for record in iter {
        if record.last_modified > latest.last_modified {
            latest = record;
        }
    }
    Ok(latest.key.clone())
}
