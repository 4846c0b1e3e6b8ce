//! Turns raw live and schedule records into tagged [`FeedEntry`] values.
//!
//! Each function answers one of three ways: `Err(InvalidRecord)` when the
//! record cannot be identified or placed in time, `Ok(None)` when the record
//! is valid but does not belong in the feed (not-yet-started fixtures,
//! live records that are not actually in play), and `Ok(Some(entry))`.

use tracing::debug;

use super::models::{
    FeedEntry, FeedKind, LiveRecord, MatchRecord, ScheduleRecord, ScheduleStatus,
};
use crate::error::FeedError;

/// Status label a live record carries while in play.
pub const LIVE_STATUS: &str = "LIVE";

pub fn normalize_live(record: &LiveRecord) -> Result<Option<FeedEntry>, FeedError> {
    let match_id = record
        .resolved_id()
        .ok_or_else(|| FeedError::invalid_record("live record has neither match_id nor id"))?
        .to_string();

    // Live feeds do not always carry a start time; the last update is the
    // closest comparable instant.
    let start_time = record.start_time.or(record.last_updated).ok_or_else(|| {
        FeedError::invalid_record(format!("live record {} has no start or update time", match_id))
    })?;

    if record.match_status != LIVE_STATUS {
        return Ok(None);
    }

    Ok(Some(FeedEntry {
        match_id,
        kind: FeedKind::Live,
        start_time,
        record: MatchRecord::Live(record.clone()),
    }))
}

pub fn normalize_schedule(record: &ScheduleRecord) -> Result<Option<FeedEntry>, FeedError> {
    let match_id = record
        .resolved_id()
        .ok_or_else(|| FeedError::invalid_record("schedule record has neither match_id nor id"))?
        .to_string();

    if record.status != ScheduleStatus::Finished {
        return Ok(None);
    }

    Ok(Some(FeedEntry {
        match_id,
        kind: FeedKind::Finished,
        start_time: record.start_time,
        record: MatchRecord::Finished(record.clone()),
    }))
}

/// Normalize both record sets, live first, in input order. Invalid records
/// are logged and skipped.
pub fn normalize_all<'a>(
    live: &'a [LiveRecord],
    schedule: &'a [ScheduleRecord],
) -> impl Iterator<Item = FeedEntry> + 'a {
    let live_entries = live.iter().map(normalize_live);
    let finished_entries = schedule.iter().map(normalize_schedule);

    live_entries
        .chain(finished_entries)
        .filter_map(|res| match res {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Dropping record from feed: {}", e);
                None
            }
        })
}
