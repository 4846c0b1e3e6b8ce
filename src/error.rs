use thiserror::Error;

/// Failures the feed and detail views surface or recover from.
///
/// Every variant is scoped to the smallest affected region: an invalid
/// record is dropped from the feed, a failed fetch marks one source or one
/// tab, and an unresolved match turns the detail view into "not found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Malformed source record; filtered out before aggregation.
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// Network or source failure; retryable, previous data is kept.
    #[error("{resource} fetch failed: {message}")]
    FetchFailed { resource: String, message: String },

    /// Match identifier missing or non-numeric; terminal.
    #[error("match '{raw}' not found")]
    UnresolvedMatch { raw: String },

    /// Match header loaded, but the match is not in play.
    #[error("match {match_id} is not live")]
    NotLive { match_id: u64 },
}

impl FeedError {
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Flatten a collaborator error (including its context chain) into a
    /// `FetchFailed` for the given resource.
    pub fn fetch_failed(resource: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::FetchFailed {
            resource: resource.into(),
            message: format!("{:#}", err),
        }
    }

    pub fn unresolved(raw: impl Into<String>) -> Self {
        Self::UnresolvedMatch { raw: raw.into() }
    }

    pub fn not_live(match_id: u64) -> Self {
        Self::NotLive { match_id }
    }

    /// Fetch failures and not-live headers offer a retry action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::NotLive { .. })
    }
}

/// A query-string label (filter, tab) that names no known value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} '{value}'")]
pub struct ParseLabelError {
    pub what: &'static str,
    pub value: String,
}

impl ParseLabelError {
    pub fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}
