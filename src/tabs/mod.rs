//! Tab-scoped fetch controller for the match detail view.
//!
//! Each tab owns exactly one secondary resource. Per (match, tab) the
//! resource moves through
//!
//! ```text
//!   Idle ──activate──▶ Loading ──ok──▶ Ready
//!    ▲                   │
//!    │                   └──err──▶ Failed ──activate/retry──▶ Loading
//!    └──── a new match resets every tab
//! ```
//!
//! The controller never performs I/O. It hands out [`FetchRequest`]s and
//! takes results back through [`TabController::complete`], which drops any
//! result whose ticket is no longer the latest for its slot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{FeedError, ParseLabelError};
use crate::feed::models::{MatchId, ResourcePayload};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Commentary,
    Scorecard,
    Discussion,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Commentary, Tab::Scorecard, Tab::Discussion];

    fn slot(self) -> usize {
        match self {
            Tab::Commentary => 0,
            Tab::Scorecard => 1,
            Tab::Discussion => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Commentary => "commentary",
            Tab::Scorecard => "scorecard",
            Tab::Discussion => "discussion",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLabelError::new("tab", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// One request the caller should issue now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub match_id: MatchId,
    pub tab: Tab,
    pub ticket: u64,
}

#[derive(Debug, Clone, Default)]
struct ResourceSlot {
    state: ResourceState,
    payload: Option<ResourcePayload>,
    error: Option<FeedError>,
    ticket: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum Target {
    #[default]
    Unset,
    Resolved(MatchId),
    Unresolved(FeedError),
}

/// What the presentation layer renders for the active tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabView {
    pub match_id: MatchId,
    pub tab: Tab,
    pub state: ResourceState,
    pub is_loading: bool,
    pub data: Option<ResourcePayload>,
    pub error: Option<String>,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum TabProjection {
    /// No match has been opened.
    Closed,
    /// Terminal: the identifier does not resolve, nothing is fetched.
    NotFound { message: String },
    Active(TabView),
}

#[derive(Debug, Default)]
pub struct TabController {
    target: Target,
    active: Tab,
    slots: [ResourceSlot; 3],
    /// Never reset, so tickets from an earlier match can't collide.
    next_ticket: u64,
}

impl TabController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_id(&self) -> Option<MatchId> {
        match self.target {
            Target::Resolved(id) => Some(id),
            _ => None,
        }
    }

    pub fn state(&self, tab: Tab) -> ResourceState {
        self.slots[tab.slot()].state
    }

    /// Show `raw_match_id`. A new match starts over on the default tab with
    /// every resource idle; re-opening the current match keeps its tab and
    /// whatever is already loaded.
    pub fn open(&mut self, raw_match_id: &str) -> Option<FetchRequest> {
        if self.retarget(raw_match_id) {
            self.active = Tab::default();
        }
        self.select_resource()
    }

    /// Follow a route to `raw_match_id` with `tab` active, issuing at most
    /// one request.
    pub fn navigate(&mut self, raw_match_id: &str, tab: Tab) -> Option<FetchRequest> {
        self.retarget(raw_match_id);
        self.set_active_tab(tab)
    }

    pub fn set_active_tab(&mut self, tab: Tab) -> Option<FetchRequest> {
        self.active = tab;
        self.select_resource()
    }

    /// Point at `raw_match_id`. A different target resets all three
    /// resources; returns whether it did.
    fn retarget(&mut self, raw_match_id: &str) -> bool {
        let target = match MatchId::parse(raw_match_id) {
            Ok(id) => Target::Resolved(id),
            Err(e) => Target::Unresolved(e),
        };
        if target == self.target {
            return false;
        }
        debug!("Detail view now targets {:?}", target);
        self.slots = Default::default();
        self.target = target;
        true
    }

    /// Decide whether the active tab's resource must be requested now.
    /// Moves an `Idle` or `Failed` slot to `Loading`; `Loading` and `Ready`
    /// slots are left alone.
    pub fn select_resource(&mut self) -> Option<FetchRequest> {
        let match_id = self.match_id()?;
        let tab = self.active;
        let slot = &mut self.slots[tab.slot()];

        match slot.state {
            ResourceState::Idle | ResourceState::Failed => {
                self.next_ticket += 1;
                slot.state = ResourceState::Loading;
                slot.ticket = Some(self.next_ticket);
                Some(FetchRequest {
                    match_id,
                    tab,
                    ticket: self.next_ticket,
                })
            }
            ResourceState::Loading | ResourceState::Ready => None,
        }
    }

    /// Explicit retry action of a failed tab.
    pub fn retry(&mut self) -> Option<FetchRequest> {
        if self.state(self.active) != ResourceState::Failed {
            return None;
        }
        self.select_resource()
    }

    /// Apply a fetch result. Returns false when the result is stale: the
    /// match changed, or a newer request for the same slot was issued.
    pub fn complete(
        &mut self,
        request: &FetchRequest,
        result: Result<ResourcePayload, FeedError>,
    ) -> bool {
        if self.match_id() != Some(request.match_id) {
            debug!(
                "Ignoring {} result for match {}: view moved on",
                request.tab, request.match_id
            );
            return false;
        }

        let slot = &mut self.slots[request.tab.slot()];
        if slot.state != ResourceState::Loading || slot.ticket != Some(request.ticket) {
            debug!(
                "Ignoring stale {} result for match {} (ticket {})",
                request.tab, request.match_id, request.ticket
            );
            return false;
        }

        match result {
            Ok(payload) => {
                slot.state = ResourceState::Ready;
                slot.payload = Some(payload);
                slot.error = None;
            }
            Err(e) => {
                slot.state = ResourceState::Failed;
                slot.error = Some(e);
            }
        }
        true
    }

    pub fn projection(&self) -> TabProjection {
        match &self.target {
            Target::Unset => TabProjection::Closed,
            Target::Unresolved(e) => TabProjection::NotFound {
                message: e.to_string(),
            },
            Target::Resolved(id) => {
                let slot = &self.slots[self.active.slot()];
                TabProjection::Active(TabView {
                    match_id: *id,
                    tab: self.active,
                    state: slot.state,
                    is_loading: slot.state == ResourceState::Loading,
                    data: slot.payload.clone(),
                    error: slot.error.as_ref().map(|e| e.to_string()),
                    retryable: slot.error.as_ref().is_some_and(|e| e.is_retryable()),
                })
            }
        }
    }
}
