use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::store::{FeedSnapshot, FeedSource, FeedStore, SourceStatus};
use crate::feed::models::FeedEntry;
use crate::feed::{FeedFilter, ScheduleDay};
use crate::refresh::{fetch_live, fetch_schedule, RefreshScheduler};
use crate::sources::MatchSource;

/// The feed page: live scores merged with finished fixtures.
///
/// While mounted, live scores refresh on a fixed period and the schedule is
/// fetched once. Unmounting stops the refresh and turns every response
/// still in flight into a no-op.
pub struct FeedView {
    source: Arc<dyn MatchSource>,
    store: FeedStore,
    period: Duration,
    timeout: Duration,
    scheduler: Mutex<Option<RefreshScheduler>>,
}

impl FeedView {
    /// Fetches are bounded by `period` unless a shorter timeout is set.
    pub fn new(source: Arc<dyn MatchSource>, period: Duration) -> Self {
        FeedView {
            source,
            store: FeedStore::new(),
            period,
            timeout: period,
            scheduler: Mutex::new(None),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(self.period);
        self
    }

    pub async fn mount(&self) {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_some() {
            return;
        }
        self.store.activate().await;

        let refresh = RefreshScheduler::start(
            self.source.clone(),
            self.store.clone(),
            self.period,
            self.timeout,
        );
        info!("Feed mounted, live refresh every {:?}", refresh.period());
        *scheduler = Some(refresh);

        tokio::spawn(load_schedule(
            self.source.clone(),
            self.store.clone(),
            self.timeout,
        ));
    }

    pub async fn unmount(&self) {
        if let Some(refresh) = self.scheduler.lock().await.take() {
            refresh.stop();
            info!("Feed unmounted");
        }
        self.store.dispose().await;
    }

    /// Mounted and the refresh loop still alive.
    pub async fn is_mounted(&self) -> bool {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| s.is_running())
    }

    pub async fn set_filter(&self, filter: FeedFilter) {
        self.store.set_filter(filter).await;
    }

    pub async fn set_search(&self, query: &str) {
        self.store.set_query(query).await;
    }

    pub async fn entries(&self) -> Vec<FeedEntry> {
        self.store.entries().await
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        self.store.snapshot().await
    }

    /// Live matches in progress, ignoring filter and search.
    pub async fn live_count(&self) -> usize {
        self.store.snapshot().await.live_count
    }

    pub async fn status(&self, source: FeedSource) -> SourceStatus {
        self.store.status(source).await
    }

    /// Upcoming fixtures from the schedule loaded at mount.
    pub async fn schedule(&self) -> Vec<ScheduleDay> {
        self.store.upcoming().await
    }

    /// Retry action of the error state: re-request both sources now and
    /// wait for them. Runs detached, so a caller that goes away does not
    /// leave a request half-finished.
    pub async fn retry(&self) {
        let source = self.source.clone();
        let store = self.store.clone();
        let timeout = self.timeout;

        let task = tokio::spawn(async move {
            futures_util::future::join(
                load_live(source.clone(), store.clone(), timeout),
                load_schedule(source, store, timeout),
            )
            .await;
        });
        if let Err(e) = task.await {
            error!("Feed retry task failed: {}", e);
        }
    }
}

async fn load_live(source: Arc<dyn MatchSource>, store: FeedStore, timeout: Duration) {
    let Some(ticket) = store.begin(FeedSource::Live).await else {
        return;
    };
    let result = fetch_live(source.as_ref(), timeout).await;
    store.finish_live(ticket, result).await;
}

async fn load_schedule(source: Arc<dyn MatchSource>, store: FeedStore, timeout: Duration) {
    let Some(ticket) = store.begin(FeedSource::Schedule).await else {
        return;
    };
    let result = fetch_schedule(source.as_ref(), timeout).await;
    if store.finish_schedule(ticket, result).await {
        info!("Schedule loaded");
    }
}
