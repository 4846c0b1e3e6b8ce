use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::models::{ScheduleRecord, ScheduleStatus};

/// Fixtures that start on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub matches: Vec<ScheduleRecord>,
}

/// Not-yet-started fixtures, earliest first, grouped by start date.
///
/// In-progress and finished matches are left to the feed. Records without
/// a resolvable identifier are dropped.
pub fn upcoming(schedule: &[ScheduleRecord]) -> Vec<ScheduleDay> {
    let mut visible: Vec<&ScheduleRecord> = schedule
        .iter()
        .filter(|r| {
            if r.resolved_id().is_none() {
                debug!("Dropping schedule record without identifier");
                return false;
            }
            r.status == ScheduleStatus::NotStarted
        })
        .collect();
    visible.sort_by_key(|r| r.start_time);

    let mut days: Vec<ScheduleDay> = Vec::new();
    for record in visible {
        let date = record.start_time.date_naive();
        match days.last_mut() {
            Some(day) if day.date == date => day.matches.push(record.clone()),
            _ => days.push(ScheduleDay {
                date,
                matches: vec![record.clone()],
            }),
        }
    }
    days
}
