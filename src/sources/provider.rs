use anyhow::Result;
use async_trait::async_trait;

use crate::feed::models::{
    CommentaryBall, DiscussionPost, LiveRecord, MatchId, ResourcePayload, ScheduleRecord,
    Scorecard,
};
use crate::tabs::Tab;

/// Source of the two feed inputs.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Snapshot of every match the upstream currently reports as live.
    async fn fetch_live_records(&self) -> Result<Vec<LiveRecord>>;

    /// Every scheduled fixture, regardless of status.
    async fn fetch_schedule_records(&self) -> Result<Vec<ScheduleRecord>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Per-match secondary resources behind the detail tabs.
#[async_trait]
pub trait SecondarySource: Send + Sync {
    /// The match itself, shown as the detail page header.
    async fn fetch_match(&self, match_id: MatchId) -> Result<LiveRecord>;

    async fn fetch_commentary(&self, match_id: MatchId) -> Result<Vec<CommentaryBall>>;

    async fn fetch_scorecard(&self, match_id: MatchId) -> Result<Scorecard>;

    async fn fetch_discussion(&self, match_id: MatchId) -> Result<Vec<DiscussionPost>>;

    /// Fetch whatever resource backs `tab`.
    async fn fetch(&self, tab: Tab, match_id: MatchId) -> Result<ResourcePayload> {
        Ok(match tab {
            Tab::Commentary => ResourcePayload::Commentary(self.fetch_commentary(match_id).await?),
            Tab::Scorecard => ResourcePayload::Scorecard(self.fetch_scorecard(match_id).await?),
            Tab::Discussion => ResourcePayload::Discussion(self.fetch_discussion(match_id).await?),
        })
    }
}
