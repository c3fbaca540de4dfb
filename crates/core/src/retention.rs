//! Ledger archival and retention rules.

use chrono::Months;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Archived entries older than this many months may be purged.
pub const RETENTION_MONTHS: u32 = 6;

/// Entries created before the returned instant are past retention.
pub fn purge_horizon(now: Timestamp) -> Timestamp {
    now.checked_sub_months(Months::new(RETENTION_MONTHS))
        .unwrap_or(now)
}

/// Archive ranges are inclusive on both ends and must not reach the future.
pub fn validate_archive_range(start: Timestamp, end: Timestamp, now: Timestamp) -> Result<(), CoreError> {
    if start > end {
        return Err(CoreError::Validation(
            "Archive range start must not be after its end".into(),
        ));
    }
    if end > now {
        return Err(CoreError::Validation(
            "Archive range must not extend into the future".into(),
        ));
    }
    Ok(())
}
