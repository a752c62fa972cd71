//! Completion status resolution.
//!
//! A completion record always wins over an in-progress marker, even when a
//! stale marker survived a failed cleanup.

use crate::error::FlowError;
use crate::model::ScreenStatus;
use crate::records::FlowRecords;
use crate::store::RecordStore;

/// Classify one screen from its stored records.
///
/// # Errors
///
/// Store failures only.
pub fn resolve<S: RecordStore>(
    records: &FlowRecords<'_, S>,
    screen_id: &str,
) -> Result<ScreenStatus, FlowError> {
    if let Some(completion) = records.completion(screen_id)? {
        return Ok(if completion.was_skipped {
            ScreenStatus::Skipped
        } else {
            ScreenStatus::Completed
        });
    }

    if records.has_in_progress(screen_id)? {
        Ok(ScreenStatus::InProgress)
    } else {
        Ok(ScreenStatus::Pending)
    }
}
