//! Shared state behind one mounted feed view.
//!
//! Both feed sources get a slot holding the last good records plus request
//! bookkeeping. Every request takes a ticket; a response is applied only if
//! its ticket is still the newest one issued for that slot, so an
//! out-of-order response can never overwrite fresher data. Disposing the
//! store invalidates all outstanding tickets.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::FeedError;
use crate::feed::models::{FeedEntry, LiveRecord, ScheduleRecord};
use crate::feed::{aggregate, live_count, upcoming, FeedFilter, ScheduleDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Live,
    Schedule,
}

/// Proof that a request was issued; handed back with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    source: FeedSource,
    seq: u64,
}

/// `{is_loading, error}` projection of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    /// Request outstanding and nothing loaded yet.
    pub is_loading: bool,
    /// Request outstanding, previous data (if any) still shown.
    pub is_refreshing: bool,
    pub error: Option<String>,
    pub retryable: bool,
    pub last_success: Option<DateTime<Utc>>,
}

/// Everything the feed page renders.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub filter: FeedFilter,
    pub query: String,
    pub live_count: usize,
    pub entries: Vec<FeedEntry>,
    pub live: SourceStatus,
    pub schedule: SourceStatus,
}

struct SourceSlot<T> {
    records: Vec<T>,
    loaded: bool,
    in_flight: bool,
    error: Option<FeedError>,
    issued: u64,
    last_success: Option<DateTime<Utc>>,
}

impl<T> Default for SourceSlot<T> {
    fn default() -> Self {
        SourceSlot {
            records: Vec::new(),
            loaded: false,
            in_flight: false,
            error: None,
            issued: 0,
            last_success: None,
        }
    }
}

impl<T> SourceSlot<T> {
    fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight = true;
        self.issued
    }

    fn finish(&mut self, seq: u64, result: Result<Vec<T>, FeedError>) -> bool {
        if seq != self.issued {
            return false;
        }
        self.in_flight = false;
        match result {
            Ok(records) => {
                self.records = records;
                self.loaded = true;
                self.error = None;
                self.last_success = Some(Utc::now());
            }
            // stale-but-available: keep whatever was shown before
            Err(e) => self.error = Some(e),
        }
        true
    }

    fn invalidate(&mut self) {
        self.issued += 1;
        self.in_flight = false;
    }

    fn status(&self) -> SourceStatus {
        SourceStatus {
            is_loading: self.in_flight && !self.loaded,
            is_refreshing: self.in_flight,
            error: self.error.as_ref().map(|e| e.to_string()),
            retryable: self.error.as_ref().is_some_and(|e| e.is_retryable()),
            last_success: self.last_success,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    live: SourceSlot<LiveRecord>,
    schedule: SourceSlot<ScheduleRecord>,
    filter: FeedFilter,
    query: String,
    disposed: bool,
}

/// Cloneable handle; all clones share one state.
#[derive(Clone, Default)]
pub struct FeedStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for a new request, or `None` once disposed.
    pub async fn begin(&self, source: FeedSource) -> Option<Ticket> {
        let mut inner = self.inner.write().await;
        if inner.disposed {
            return None;
        }
        let seq = match source {
            FeedSource::Live => inner.live.begin(),
            FeedSource::Schedule => inner.schedule.begin(),
        };
        Some(Ticket { source, seq })
    }

    /// Returns whether the response was applied.
    pub async fn finish_live(
        &self,
        ticket: Ticket,
        result: Result<Vec<LiveRecord>, FeedError>,
    ) -> bool {
        debug_assert_eq!(ticket.source, FeedSource::Live);
        let mut inner = self.inner.write().await;
        let applied = !inner.disposed && inner.live.finish(ticket.seq, result);
        if !applied {
            debug!("Ignoring stale live-score response (ticket {})", ticket.seq);
        }
        applied
    }

    pub async fn finish_schedule(
        &self,
        ticket: Ticket,
        result: Result<Vec<ScheduleRecord>, FeedError>,
    ) -> bool {
        debug_assert_eq!(ticket.source, FeedSource::Schedule);
        let mut inner = self.inner.write().await;
        let applied = !inner.disposed && inner.schedule.finish(ticket.seq, result);
        if !applied {
            debug!("Ignoring stale schedule response (ticket {})", ticket.seq);
        }
        applied
    }

    /// Accept requests again; anything issued before this point is stale.
    pub async fn activate(&self) {
        let mut inner = self.inner.write().await;
        inner.disposed = false;
        inner.live.invalidate();
        inner.schedule.invalidate();
    }

    /// Turn every in-flight and future response into a no-op.
    pub async fn dispose(&self) {
        let mut inner = self.inner.write().await;
        inner.disposed = true;
        inner.live.invalidate();
        inner.schedule.invalidate();
    }

    pub async fn set_filter(&self, filter: FeedFilter) {
        self.inner.write().await.filter = filter;
    }

    pub async fn set_query(&self, query: &str) {
        self.inner.write().await.query = query.to_string();
    }

    pub async fn live_records(&self) -> Vec<LiveRecord> {
        self.inner.read().await.live.records.clone()
    }

    pub async fn entries(&self) -> Vec<FeedEntry> {
        let inner = self.inner.read().await;
        aggregate(
            &inner.live.records,
            &inner.schedule.records,
            inner.filter,
            &inner.query,
        )
    }

    pub async fn upcoming(&self) -> Vec<ScheduleDay> {
        upcoming(&self.inner.read().await.schedule.records)
    }

    pub async fn status(&self, source: FeedSource) -> SourceStatus {
        let inner = self.inner.read().await;
        match source {
            FeedSource::Live => inner.live.status(),
            FeedSource::Schedule => inner.schedule.status(),
        }
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let inner = self.inner.read().await;
        FeedSnapshot {
            filter: inner.filter,
            query: inner.query.clone(),
            live_count: live_count(&inner.live.records, &inner.schedule.records),
            entries: aggregate(
                &inner.live.records,
                &inner.schedule.records,
                inner.filter,
                &inner.query,
            ),
            live: inner.live.status(),
            schedule: inner.schedule.status(),
        }
    }
}
