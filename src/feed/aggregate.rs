use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::models::{FeedEntry, FeedKind, LiveRecord, ScheduleRecord};
use super::normalize::normalize_all;
use crate::error::ParseLabelError;

/// Status filter of the feed view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedFilter {
    #[default]
    All,
    Live,
    Completed,
}

impl FeedFilter {
    pub fn admits(self, kind: FeedKind) -> bool {
        match self {
            FeedFilter::All => true,
            FeedFilter::Live => kind == FeedKind::Live,
            FeedFilter::Completed => kind == FeedKind::Finished,
        }
    }
}

impl FromStr for FeedFilter {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "ALL" => Ok(FeedFilter::All),
            "LIVE" => Ok(FeedFilter::Live),
            "COMPLETED" | "FINISHED" => Ok(FeedFilter::Completed),
            _ => Err(ParseLabelError::new("filter", s)),
        }
    }
}

/// Merge live and schedule records into the ordered feed.
///
/// Pure function of its inputs; recomputed from scratch on every change.
/// Live entries come first, then each kind runs newest start time first.
/// The sort is stable, so equal entries keep their input order.
pub fn aggregate(
    live: &[LiveRecord],
    schedule: &[ScheduleRecord],
    filter: FeedFilter,
    query: &str,
) -> Vec<FeedEntry> {
    let needle = query.trim().to_lowercase();

    let mut entries: Vec<FeedEntry> = normalize_all(live, schedule)
        .filter(|e| filter.admits(e.kind))
        .filter(|e| needle.is_empty() || e.matches(&needle))
        .collect();

    entries.sort_by(feed_order);
    entries
}

/// Live entries in the merged feed, ignoring filter and search.
pub fn live_count(live: &[LiveRecord], schedule: &[ScheduleRecord]) -> usize {
    normalize_all(live, schedule)
        .filter(|e| e.kind == FeedKind::Live)
        .count()
}

fn feed_order(a: &FeedEntry, b: &FeedEntry) -> Ordering {
    a.kind
        .rank()
        .cmp(&b.kind.rank())
        .then_with(|| b.start_time.cmp(&a.start_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::{
        League, LiveTeams, MatchRecord, Score, ScheduleStatus, Team, Venue,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()
    }

    fn team(name: &str) -> Team {
        Team {
            id: None,
            name: name.to_string(),
            short_name: None,
        }
    }

    fn live(id: &str, first: &str, second: &str, city: &str, at: DateTime<Utc>) -> LiveRecord {
        LiveRecord {
            match_id: None,
            id: Some(id.to_string()),
            teams: LiveTeams {
                batting_first: team(first),
                batting_second: team(second),
            },
            score: Score {
                runs: 142,
                wickets: 4,
                overs: 16.3,
            },
            venue: Venue {
                name: "Ground".into(),
                city: city.into(),
            },
            match_status: "LIVE".into(),
            start_time: Some(at),
            last_updated: Some(now()),
        }
    }

    fn fixture(id: &str, home: &str, away: &str, status: ScheduleStatus, at: DateTime<Utc>) -> ScheduleRecord {
        ScheduleRecord {
            match_id: None,
            id: Some(id.to_string()),
            home_team: team(home),
            away_team: team(away),
            league: League {
                id: None,
                name: "Big Bash League".into(),
            },
            venue: Venue {
                name: "Optus Stadium".into(),
                city: "Perth".into(),
            },
            start_time: at,
            status,
            result: Some("A won by 5 wickets".into()),
        }
    }

    fn ids(entries: &[FeedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.match_id.as_str()).collect()
    }

    #[test]
    fn test_empty_inputs_give_empty_feed() {
        assert!(aggregate(&[], &[], FeedFilter::All, "").is_empty());
    }

    #[test]
    fn test_live_then_finished_scenario() {
        let lives = vec![live("66709", "Sydney Thunder", "Perth Scorchers", "Sydney", now())];
        let fixtures = vec![fixture("1", "A", "B", ScheduleStatus::Finished, now() - Duration::days(1))];

        let all = aggregate(&lives, &fixtures, FeedFilter::All, "");
        assert_eq!(ids(&all), vec!["66709", "1"]);
        assert_eq!(all[0].kind, FeedKind::Live);
        assert_eq!(all[1].kind, FeedKind::Finished);

        let completed = aggregate(&lives, &fixtures, FeedFilter::Completed, "");
        assert_eq!(ids(&completed), vec!["1"]);

        let live_only = aggregate(&lives, &fixtures, FeedFilter::Live, "");
        assert_eq!(ids(&live_only), vec!["66709"]);
    }

    #[test]
    fn test_live_precedes_finished_even_when_older() {
        let lives = vec![live("10", "X", "Y", "Hobart", now() - Duration::days(3))];
        let fixtures = vec![fixture("20", "A", "B", ScheduleStatus::Finished, now())];
        assert_eq!(ids(&aggregate(&lives, &fixtures, FeedFilter::All, "")), vec!["10", "20"]);
    }

    #[test]
    fn test_not_started_fixtures_never_appear() {
        let fixtures = vec![
            fixture("1", "A", "B", ScheduleStatus::NotStarted, now() + Duration::days(1)),
            fixture("2", "C", "D", ScheduleStatus::Live, now()),
            fixture("3", "E", "F", ScheduleStatus::Abandoned, now()),
            fixture("4", "G", "H", ScheduleStatus::Finished, now()),
        ];
        let out = aggregate(&[], &fixtures, FeedFilter::All, "");
        assert_eq!(ids(&out), vec!["4"]);
        assert!(out.iter().all(|e| matches!(e.record, MatchRecord::Finished(_))));
    }

    #[test]
    fn test_same_kind_sorted_newest_first_and_stable() {
        let t = now();
        let fixtures = vec![
            fixture("old", "A", "B", ScheduleStatus::Finished, t - Duration::days(2)),
            fixture("tie-a", "A", "B", ScheduleStatus::Finished, t),
            fixture("mid", "A", "B", ScheduleStatus::Finished, t - Duration::days(1)),
            fixture("tie-b", "A", "B", ScheduleStatus::Finished, t),
        ];
        let out = aggregate(&[], &fixtures, FeedFilter::All, "");
        assert_eq!(ids(&out), vec!["tie-a", "tie-b", "mid", "old"]);
        assert!(out.windows(2).all(|w| w[0].start_time >= w[1].start_time));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let lives = vec![
            live("1", "Sydney Thunder", "Perth Scorchers", "Sydney", now()),
            live("2", "Hobart Hurricanes", "Adelaide Strikers", "Hobart", now()),
        ];
        let out = aggregate(&lives, &[], FeedFilter::All, "perth");
        assert_eq!(ids(&out), vec!["1"]);

        let out = aggregate(&lives, &[], FeedFilter::All, "  HOBART ");
        assert_eq!(ids(&out), vec!["2"]);
    }

    #[test]
    fn test_search_covers_league_for_finished_only() {
        let lives = vec![live("1", "Sydney Thunder", "Perth Scorchers", "Sydney", now())];
        let fixtures = vec![fixture("2", "A", "B", ScheduleStatus::Finished, now())];
        // league name is a search field of finished entries only
        assert_eq!(ids(&aggregate(&lives, &fixtures, FeedFilter::All, "bash")), vec!["2"]);
        // venue city matches both kinds
        assert_eq!(ids(&aggregate(&lives, &fixtures, FeedFilter::All, "perth")), vec!["1", "2"]);
    }

    #[test]
    fn test_blank_query_keeps_everything() {
        let lives = vec![live("1", "Sydney Thunder", "Perth Scorchers", "Sydney", now())];
        assert_eq!(aggregate(&lives, &[], FeedFilter::All, "   ").len(), 1);
    }

    #[test]
    fn test_live_count_ignores_filter() {
        let lives = vec![
            live("1", "A", "B", "X", now()),
            live("2", "C", "D", "Y", now()),
        ];
        let fixtures = vec![fixture("3", "A", "B", ScheduleStatus::Finished, now())];
        assert_eq!(live_count(&lives, &fixtures), 2);
    }

    #[test]
    fn test_filter_labels() {
        assert_eq!("ALL".parse::<FeedFilter>().unwrap(), FeedFilter::All);
        assert_eq!("live".parse::<FeedFilter>().unwrap(), FeedFilter::Live);
        assert_eq!("COMPLETED".parse::<FeedFilter>().unwrap(), FeedFilter::Completed);
        assert!("UPCOMING".parse::<FeedFilter>().is_err());
    }
}
