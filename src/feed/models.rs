use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::FeedError;

/// A team reference as carried by both live and schedule records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct League {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

/// Innings score. `overs` uses cricket notation: 12.3 is 12 overs and 3 balls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub runs: u32,
    #[serde(default)]
    pub wickets: u32,
    #[serde(default, deserialize_with = "de_overs")]
    pub overs: f64,
}

impl Score {
    /// Number of fully bowled overs.
    pub fn completed_overs(&self) -> u32 {
        self.overs.max(0.0).trunc() as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveTeams {
    pub batting_first: Team,
    pub batting_second: Team,
}

/// A match in progress as returned by the live-scores source.
///
/// Score, status and `last_updated` change on every refresh; the match
/// identifier never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRecord {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub teams: LiveTeams,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub venue: Venue,
    /// Raw upstream status, "LIVE" while in play
    pub match_status: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl LiveRecord {
    /// `match_id` wins over `id` when both are present.
    pub fn resolved_id(&self) -> Option<&str> {
        self.match_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ScheduleStatus {
    NotStarted,
    Live,
    Finished,
    Abandoned,
}

impl ScheduleStatus {
    /// Unknown labels fall back to `NotStarted`, which keeps them out of the
    /// feed.
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "live" | "in progress" | "inprogress" => ScheduleStatus::Live,
            "finished" | "ft" | "completed" | "result" => ScheduleStatus::Finished,
            "abandoned" | "aban" | "no result" | "cancelled" => ScheduleStatus::Abandoned,
            _ => ScheduleStatus::NotStarted,
        }
    }
}

impl From<String> for ScheduleStatus {
    fn from(s: String) -> Self {
        ScheduleStatus::from_label(&s)
    }
}

/// A fixture with a calendar slot, in any lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub home_team: Team,
    pub away_team: Team,
    pub league: League,
    #[serde(default)]
    pub venue: Venue,
    pub start_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ScheduleRecord {
    pub fn resolved_id(&self) -> Option<&str> {
        self.match_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Live,
    Finished,
}

impl FeedKind {
    /// Sort rank: live before finished.
    pub fn rank(self) -> u8 {
        match self {
            FeedKind::Live => 0,
            FeedKind::Finished => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MatchRecord {
    Live(LiveRecord),
    Finished(ScheduleRecord),
}

/// Normalized, tagged projection of a live or schedule record.
///
/// Only built by the normalizer, so `kind` always agrees with `record` and
/// `match_id` is always resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub match_id: String,
    pub kind: FeedKind,
    pub start_time: DateTime<Utc>,
    pub record: MatchRecord,
}

impl FeedEntry {
    /// Fields the free-text search looks at.
    pub fn search_fields(&self) -> Vec<&str> {
        match &self.record {
            MatchRecord::Live(r) => vec![
                r.teams.batting_first.name.as_str(),
                r.teams.batting_second.name.as_str(),
                r.venue.city.as_str(),
            ],
            MatchRecord::Finished(r) => vec![
                r.home_team.name.as_str(),
                r.away_team.name.as_str(),
                r.league.name.as_str(),
                r.venue.city.as_str(),
            ],
        }
    }

    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.search_fields()
            .into_iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Numeric match identifier used by the per-match secondary sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MatchId(u64);

impl MatchId {
    /// The whole trimmed string must be a non-negative integer.
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        raw.trim()
            .parse::<u64>()
            .map(MatchId)
            .map_err(|_| FeedError::unresolved(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Secondary resources ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentaryBall {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    /// e.g. "15.2"
    pub over: String,
    #[serde(default)]
    pub ball: u32,
    #[serde(default)]
    pub runs: u32,
    #[serde(default)]
    pub is_wicket: bool,
    #[serde(default)]
    pub is_boundary: bool,
    #[serde(default)]
    pub is_six: bool,
    pub description: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattingRow {
    pub name: String,
    #[serde(default)]
    pub dismissal: Option<String>,
    #[serde(default)]
    pub runs: u32,
    #[serde(default)]
    pub balls: u32,
    #[serde(default)]
    pub fours: u32,
    #[serde(default)]
    pub sixes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowlingRow {
    pub name: String,
    #[serde(default, deserialize_with = "de_overs")]
    pub overs: f64,
    #[serde(default)]
    pub maidens: u32,
    #[serde(default)]
    pub runs: u32,
    #[serde(default)]
    pub wickets: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub team: Team,
    #[serde(default)]
    pub batting: Vec<BattingRow>,
    #[serde(default)]
    pub bowling: Vec<BowlingRow>,
    #[serde(default)]
    pub extras: u32,
    #[serde(default)]
    pub total: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionPost {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id", skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    pub author: Author,
    pub content: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub replies: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload of one secondary resource, as cached per (match, tab).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "lowercase")]
pub enum ResourcePayload {
    Commentary(Vec<CommentaryBall>),
    Scorecard(Scorecard),
    Discussion(Vec<DiscussionPost>),
}

// ── Lenient field decoding ───────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Num(i64),
}

/// Identifiers arrive as JSON strings or numbers; blank strings count as absent.
fn de_opt_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawId>::deserialize(d)? {
        Some(RawId::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(RawId::Num(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn de_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_id(d)?.ok_or_else(|| serde::de::Error::custom("empty identifier"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOvers {
    Num(f64),
    Text(String),
}

fn de_overs<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawOvers::deserialize(d)? {
        RawOvers::Num(v) => Ok(v),
        RawOvers::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid overs '{}'", s))),
    }
}
