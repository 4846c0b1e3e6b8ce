use std::fmt;

use super::models::LiveRecord;

/// Something that happened between two refreshes of the same live match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    Wicket { fallen: u32 },
    Four,
    Six,
    /// `over` is the number of the over that just finished (1-based).
    OverEnd { over: u32 },
}

impl fmt::Display for MatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchEvent::Wicket { fallen } => write!(f, "{} wicket(s) fallen", fallen),
            MatchEvent::Four => write!(f, "FOUR"),
            MatchEvent::Six => write!(f, "SIX"),
            MatchEvent::OverEnd { over } => write!(f, "end of over {}", over),
        }
    }
}

/// Compare two snapshots of one live match and list what changed.
/// Returns an empty list when nothing notable happened.
pub fn detect_changes(prev: &LiveRecord, curr: &LiveRecord) -> Vec<MatchEvent> {
    let mut events = Vec::new();
    let (old, new) = (&prev.score, &curr.score);

    if new.wickets > old.wickets {
        events.push(MatchEvent::Wicket {
            fallen: new.wickets - old.wickets,
        });
    }

    match new.runs.checked_sub(old.runs) {
        Some(4) => events.push(MatchEvent::Four),
        Some(6) => events.push(MatchEvent::Six),
        _ => {}
    }

    if new.completed_overs() > old.completed_overs() {
        events.push(MatchEvent::OverEnd {
            over: old.completed_overs() + 1,
        });
    }

    events
}
