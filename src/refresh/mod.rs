use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::error::FeedError;
use crate::feed::detect_changes;
use crate::feed::models::{LiveRecord, MatchId, ScheduleRecord};
use crate::sources::{MatchSource, SecondarySource};
use crate::view::store::{FeedSource, FeedStore};

/// Fixed-cadence live-score refresh, owned by the view that mounted it.
///
/// The first fetch goes out immediately, then one per `period`. Each fetch
/// is bounded by `timeout`, capped at `period`, so the loop never overlaps
/// itself. A failure
/// leaves the last good records in the store and the next tick simply tries
/// again. Dropping the scheduler cancels the loop, including a fetch that is
/// still awaiting its response.
pub struct RefreshScheduler {
    handle: JoinHandle<()>,
    period: Duration,
}

impl RefreshScheduler {
    pub fn start(
        source: Arc<dyn MatchSource>,
        store: FeedStore,
        period: Duration,
        timeout: Duration,
    ) -> Self {
        Self::spawn(period, refresh_loop(source, store, period, timeout.min(period)))
    }

    /// Own an already-built refresh loop ticking every `period`.
    pub fn spawn<F>(period: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        RefreshScheduler {
            handle: tokio::spawn(task),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn refresh_loop(
    source: Arc<dyn MatchSource>,
    store: FeedStore,
    period: Duration,
    timeout: Duration,
) {
    info!(
        "Live refresh started (source={}, interval={:?})",
        source.name(),
        period
    );

    // Previous snapshot: match id -> record
    let mut prev_snapshot: HashMap<String, LiveRecord> = HashMap::new();
    let mut interval = fixed_interval(period);

    loop {
        interval.tick().await;

        let Some(ticket) = store.begin(FeedSource::Live).await else {
            info!("Feed disposed, live refresh exiting");
            return;
        };

        let result = fetch_live(source.as_ref(), timeout).await;
        let fresh = result.as_ref().ok().cloned();

        if store.finish_live(ticket, result).await {
            if let Some(records) = fresh {
                log_changes(&mut prev_snapshot, records);
            }
        }
    }
}

/// First tick fires immediately; ticks missed while a fetch runs long are
/// skipped, not bunched up.
pub fn fixed_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Log in-play events and replace the snapshot with the latest records.
fn log_changes(prev_snapshot: &mut HashMap<String, LiveRecord>, records: Vec<LiveRecord>) {
    let mut next = HashMap::with_capacity(records.len());
    for record in records {
        let Some(id) = record.resolved_id().map(str::to_string) else {
            continue;
        };
        if let Some(prev) = prev_snapshot.get(&id) {
            for event in detect_changes(prev, &record) {
                info!(
                    "Match {}: {} ({}/{} in {} ov)",
                    id, event, record.score.runs, record.score.wickets, record.score.overs
                );
            }
        }
        next.insert(id, record);
    }
    // matches missing from this refresh are no longer live
    *prev_snapshot = next;
}

pub async fn fetch_live(
    source: &dyn MatchSource,
    timeout: Duration,
) -> Result<Vec<LiveRecord>, FeedError> {
    bounded("live scores", source.name(), timeout, source.fetch_live_records()).await
}

pub async fn fetch_schedule(
    source: &dyn MatchSource,
    timeout: Duration,
) -> Result<Vec<ScheduleRecord>, FeedError> {
    bounded("schedule", source.name(), timeout, source.fetch_schedule_records()).await
}

pub async fn fetch_header(
    source: &dyn SecondarySource,
    match_id: MatchId,
    timeout: Duration,
) -> Result<LiveRecord, FeedError> {
    bounded("match header", "detail", timeout, source.fetch_match(match_id)).await
}

async fn bounded<T>(
    resource: &str,
    source_name: &str,
    timeout: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, FeedError> {
    let err = match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => e,
        Err(_) => anyhow::anyhow!("timed out after {:?}", timeout),
    };
    warn!("{} fetch from '{}' failed: {:#}", resource, source_name, err);
    Err(FeedError::fetch_failed(resource, &err))
}
