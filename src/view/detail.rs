//! Match detail pages, one per open match.
//!
//! Each page pairs a [`TabController`] with a periodically refreshed match
//! header. Pages are keyed by match id, so viewers of different matches
//! never disturb each other's tabs. Every page gets a fresh generation
//! number when it is created; a response is applied only to the page that
//! issued it, so nothing in flight survives `close()` or eviction.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::feed::models::{LiveRecord, MatchId};
use crate::feed::normalize::LIVE_STATUS;
use crate::refresh::{fetch_header, fixed_interval, RefreshScheduler};
use crate::sources::SecondarySource;
use crate::tabs::{FetchRequest, Tab, TabController, TabProjection};

/// Pages kept open at once; opening one more evicts the least recently used.
const MAX_OPEN_MATCHES: usize = 32;

/// `{data, is_loading, error}` of the match header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderView {
    pub is_loading: bool,
    pub record: Option<LiveRecord>,
    pub error: Option<String>,
    pub retryable: bool,
}

/// Everything a match page renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPage {
    /// `None` until the page is open, and for unresolvable ids.
    pub header: Option<HeaderView>,
    pub tab: TabProjection,
}

impl MatchPage {
    fn closed() -> Self {
        MatchPage {
            header: None,
            tab: TabProjection::Closed,
        }
    }

    fn not_found(err: &FeedError) -> Self {
        MatchPage {
            header: None,
            tab: TabProjection::NotFound {
                message: err.to_string(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.tab, TabProjection::NotFound { .. })
    }
}

#[derive(Debug, Default)]
struct HeaderSlot {
    record: Option<LiveRecord>,
    error: Option<FeedError>,
    in_flight: bool,
    issued: u64,
}

impl HeaderSlot {
    fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight = true;
        self.issued
    }

    fn finish(
        &mut self,
        match_id: MatchId,
        ticket: u64,
        result: Result<LiveRecord, FeedError>,
    ) -> bool {
        if ticket != self.issued {
            return false;
        }
        self.in_flight = false;
        match result {
            Ok(record) => {
                self.error = (record.match_status != LIVE_STATUS)
                    .then(|| FeedError::not_live(match_id.get()));
                self.record = Some(record);
            }
            // keep the last good header on screen
            Err(e) => self.error = Some(e),
        }
        true
    }

    fn view(&self) -> HeaderView {
        HeaderView {
            is_loading: self.in_flight && self.record.is_none(),
            record: self.record.clone(),
            error: self.error.as_ref().map(|e| e.to_string()),
            retryable: self.error.as_ref().is_some_and(|e| e.is_retryable()),
        }
    }
}

struct OpenMatch {
    generation: u64,
    controller: TabController,
    header: HeaderSlot,
    touched: Instant,
    /// Dropping the page stops its header refresh.
    _header_refresh: RefreshScheduler,
}

impl OpenMatch {
    fn render(&self) -> MatchPage {
        MatchPage {
            header: Some(self.header.view()),
            tab: self.controller.projection(),
        }
    }
}

#[derive(Default)]
struct DetailInner {
    pages: HashMap<MatchId, OpenMatch>,
    /// Never reset, so a page re-opened after close can't accept responses
    /// meant for its predecessor.
    next_generation: u64,
}

impl DetailInner {
    /// The page for `match_id` if it is still the one with `generation`.
    fn page_mut(&mut self, match_id: MatchId, generation: u64) -> Option<&mut OpenMatch> {
        self.pages
            .get_mut(&match_id)
            .filter(|p| p.generation == generation)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .pages
            .iter()
            .min_by_key(|(_, p)| p.touched)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            debug!("Evicting match page {}", id);
            self.pages.remove(&id);
        }
    }
}

/// Match detail pages with commentary, scorecard and discussion tabs.
///
/// Transitions run under one lock, and each request they hand out is
/// fetched on a detached task whose completion re-takes the lock, so
/// completions are applied one at a time.
#[derive(Clone)]
pub struct MatchDetailView {
    source: Arc<dyn SecondarySource>,
    period: Duration,
    timeout: Duration,
    inner: Arc<Mutex<DetailInner>>,
}

impl MatchDetailView {
    /// The header of every open page refreshes once per `period`.
    pub fn new(source: Arc<dyn SecondarySource>, period: Duration) -> Self {
        MatchDetailView {
            source,
            period,
            timeout: period,
            inner: Arc::new(Mutex::new(DetailInner::default())),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(self.period);
        self
    }

    /// Show `raw_match_id`: a page not yet open starts on the default tab,
    /// an open one is returned as is.
    pub async fn open(&self, raw_match_id: &str) -> MatchPage {
        self.apply(raw_match_id, |c| c.open(raw_match_id)).await.0
    }

    /// Show `raw_match_id` with `tab` active.
    pub async fn navigate(&self, raw_match_id: &str, tab: Tab) -> MatchPage {
        self.apply(raw_match_id, |c| c.navigate(raw_match_id, tab))
            .await
            .0
    }

    /// Retry action of the error state: re-requests a failed active tab and
    /// a failed header.
    pub async fn retry(&self, raw_match_id: &str) -> MatchPage {
        let (page, _) = self.apply(raw_match_id, |c| c.retry()).await;
        let Ok(match_id) = MatchId::parse(raw_match_id) else {
            return page;
        };
        self.retry_header(match_id).await;
        self.snapshot(raw_match_id).await
    }

    /// Current state of a page without touching it.
    pub async fn snapshot(&self, raw_match_id: &str) -> MatchPage {
        let match_id = match MatchId::parse(raw_match_id) {
            Ok(id) => id,
            Err(e) => return MatchPage::not_found(&e),
        };
        self.inner
            .lock()
            .await
            .pages
            .get(&match_id)
            .map_or_else(MatchPage::closed, OpenMatch::render)
    }

    /// Close every page; nothing in flight may touch them afterwards.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        let open = inner.pages.len();
        inner.pages.clear();
        info!("Closed {} match page(s)", open);
    }

    /// Run one controller transition on the page for `raw_match_id`,
    /// opening it if needed, and dispatch the request it yields.
    async fn apply<F>(&self, raw_match_id: &str, transition: F) -> (MatchPage, Option<JoinHandle<()>>)
    where
        F: FnOnce(&mut TabController) -> Option<FetchRequest>,
    {
        let match_id = match MatchId::parse(raw_match_id) {
            Ok(id) => id,
            Err(e) => {
                debug!("Unresolved match id '{}'", raw_match_id);
                return (MatchPage::not_found(&e), None);
            }
        };

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if !inner.pages.contains_key(&match_id) && inner.pages.len() >= MAX_OPEN_MATCHES {
            inner.evict_oldest();
        }
        let next_generation = &mut inner.next_generation;
        let page = inner.pages.entry(match_id).or_insert_with(|| {
            *next_generation += 1;
            self.new_page(match_id, *next_generation)
        });

        page.touched = Instant::now();
        let request = transition(&mut page.controller);
        let generation = page.generation;
        let rendered = page.render();
        drop(guard);

        (rendered, request.map(|req| self.dispatch(generation, req)))
    }

    fn new_page(&self, match_id: MatchId, generation: u64) -> OpenMatch {
        debug!("Opening match page {} (generation {})", match_id, generation);
        let header_refresh = RefreshScheduler::spawn(
            self.period,
            header_loop(
                self.source.clone(),
                Arc::downgrade(&self.inner),
                match_id,
                generation,
                self.period,
                self.timeout,
            ),
        );
        OpenMatch {
            generation,
            controller: TabController::new(),
            header: HeaderSlot::default(),
            touched: Instant::now(),
            _header_refresh: header_refresh,
        }
    }

    fn dispatch(&self, generation: u64, request: FetchRequest) -> JoinHandle<()> {
        let source = self.source.clone();
        let inner = self.inner.clone();

        tokio::spawn(async move {
            debug!("Fetching {} for match {}", request.tab, request.match_id);
            let result = source
                .fetch(request.tab, request.match_id)
                .await
                .map_err(|e| {
                    warn!(
                        "{} fetch for match {} failed: {:#}",
                        request.tab, request.match_id, e
                    );
                    FeedError::fetch_failed(request.tab.as_str(), &e)
                });

            let mut inner = inner.lock().await;
            match inner.page_mut(request.match_id, generation) {
                Some(page) => {
                    page.controller.complete(&request, result);
                }
                None => debug!(
                    "Match page {} closed, dropping {} response",
                    request.match_id, request.tab
                ),
            }
        })
    }

    /// Re-fetch the header now if it is in an error state.
    async fn retry_header(&self, match_id: MatchId) -> Option<JoinHandle<()>> {
        let mut inner = self.inner.lock().await;
        let page = inner.pages.get_mut(&match_id)?;
        if page.header.error.is_none() || page.header.in_flight {
            return None;
        }
        let ticket = page.header.begin();
        let generation = page.generation;
        drop(inner);

        let source = self.source.clone();
        let weak = Arc::downgrade(&self.inner);
        let timeout = self.timeout;
        Some(tokio::spawn(async move {
            let result = fetch_header(source.as_ref(), match_id, timeout).await;
            finish_header(&weak, match_id, generation, ticket, result).await;
        }))
    }
}

/// Refresh one page's header until the page goes away.
async fn header_loop(
    source: Arc<dyn SecondarySource>,
    inner: Weak<Mutex<DetailInner>>,
    match_id: MatchId,
    generation: u64,
    period: Duration,
    timeout: Duration,
) {
    let mut interval = fixed_interval(period);
    loop {
        interval.tick().await;

        let Some(ticket) = begin_header(&inner, match_id, generation).await else {
            debug!("Match page {} gone, header refresh exiting", match_id);
            return;
        };
        let result = fetch_header(source.as_ref(), match_id, timeout).await;
        finish_header(&inner, match_id, generation, ticket, result).await;
    }
}

async fn begin_header(
    inner: &Weak<Mutex<DetailInner>>,
    match_id: MatchId,
    generation: u64,
) -> Option<u64> {
    let inner = inner.upgrade()?;
    let mut inner = inner.lock().await;
    Some(inner.page_mut(match_id, generation)?.header.begin())
}

async fn finish_header(
    inner: &Weak<Mutex<DetailInner>>,
    match_id: MatchId,
    generation: u64,
    ticket: u64,
    result: Result<LiveRecord, FeedError>,
) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = inner.lock().await;
    let applied = inner
        .page_mut(match_id, generation)
        .is_some_and(|page| page.header.finish(match_id, ticket, result));
    if !applied {
        debug!("Ignoring stale header response for match {}", match_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::{
        Author, CommentaryBall, DiscussionPost, LiveTeams, ResourcePayload, Score, Scorecard,
        Team,
    };
    use crate::tabs::{ResourceState, TabView};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    const PERIOD: Duration = Duration::from_secs(30);

    #[derive(Default)]
    struct RecordingSource {
        calls: StdMutex<Vec<(Tab, u64)>>,
        /// Per-call delays for commentary, consumed in order.
        commentary_delays: StdMutex<VecDeque<Duration>>,
        fail_scorecard: bool,
        header_calls: AtomicUsize,
        header_failing: AtomicBool,
        header_status: StdMutex<Option<String>>,
    }

    impl RecordingSource {
        fn calls(&self) -> Vec<(Tab, u64)> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, tab: Tab) -> usize {
            self.calls().iter().filter(|(t, _)| *t == tab).count()
        }

        fn record(&self, tab: Tab, id: MatchId) -> usize {
            let mut calls = self.calls.lock().unwrap();
            calls.push((tab, id.get()));
            calls.len()
        }
    }

    #[async_trait]
    impl SecondarySource for RecordingSource {
        async fn fetch_match(&self, match_id: MatchId) -> anyhow::Result<LiveRecord> {
            self.header_calls.fetch_add(1, Ordering::SeqCst);
            if self.header_failing.load(Ordering::SeqCst) {
                anyhow::bail!("match service unavailable");
            }
            let status = self
                .header_status
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "LIVE".to_string());
            Ok(LiveRecord {
                match_id: Some(match_id.to_string()),
                id: None,
                teams: LiveTeams::default(),
                score: Score {
                    runs: 142,
                    wickets: 4,
                    overs: 16.3,
                },
                venue: Default::default(),
                match_status: status,
                start_time: None,
                last_updated: None,
            })
        }

        async fn fetch_commentary(&self, match_id: MatchId) -> anyhow::Result<Vec<CommentaryBall>> {
            let n = self.record(Tab::Commentary, match_id);
            let delay = self.commentary_delays.lock().unwrap().pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(vec![CommentaryBall {
                id: format!("c{}", n),
                over: "15.2".into(),
                ball: 2,
                runs: 0,
                is_wicket: true,
                is_boundary: false,
                is_six: false,
                description: "OUT! Bowled through the gate.".into(),
                timestamp: None,
            }])
        }

        async fn fetch_scorecard(&self, match_id: MatchId) -> anyhow::Result<Scorecard> {
            self.record(Tab::Scorecard, match_id);
            if self.fail_scorecard {
                anyhow::bail!("scorecard service unavailable");
            }
            Ok(Scorecard {
                team: Team {
                    id: None,
                    name: "Perth Scorchers".into(),
                    short_name: None,
                },
                batting: vec![],
                bowling: vec![],
                extras: 4,
                total: Score::default(),
            })
        }

        async fn fetch_discussion(&self, match_id: MatchId) -> anyhow::Result<Vec<DiscussionPost>> {
            self.record(Tab::Discussion, match_id);
            Ok(vec![DiscussionPost {
                id: "w1".into(),
                match_id: Some(match_id.to_string()),
                author: Author {
                    name: "TacticalScout".into(),
                },
                content: "Huge over coming up.".into(),
                likes: 48,
                replies: 6,
                created_at: None,
            }])
        }
    }

    fn view_of(source: &Arc<RecordingSource>) -> MatchDetailView {
        MatchDetailView::new(source.clone(), PERIOD)
    }

    async fn settle(handle: Option<JoinHandle<()>>) {
        if let Some(h) = handle {
            h.await.unwrap();
        }
    }

    fn active(page: MatchPage) -> TabView {
        match page.tab {
            TabProjection::Active(v) => v,
            other => panic!("expected active tab, got {:?}", other),
        }
    }

    fn commentary_ids(view: &TabView) -> Vec<String> {
        match &view.data {
            Some(ResourcePayload::Commentary(balls)) => balls.iter().map(|b| b.id.clone()).collect(),
            other => panic!("expected commentary, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_fetches_commentary_only() {
        let source = Arc::new(RecordingSource::default());
        let view = view_of(&source);

        let (p, h) = view.apply("66709", |c| c.open("66709")).await;
        assert!(active(p).is_loading);
        settle(h).await;

        assert_eq!(source.calls(), vec![(Tab::Commentary, 66709)]);
        let v = active(view.snapshot("66709").await);
        assert_eq!(v.state, ResourceState::Ready);
        assert_eq!(commentary_ids(&v), vec!["c1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopening_serves_cached_tab() {
        let source = Arc::new(RecordingSource::default());
        let view = view_of(&source);

        settle(view.apply("5", |c| c.open("5")).await.1).await;
        let (p, h) = view.apply("5", |c| c.open("5")).await;
        assert!(h.is_none());

        let v = active(p);
        assert_eq!(v.state, ResourceState::Ready);
        assert!(!v.is_loading);
        assert_eq!(commentary_ids(&v), vec!["c1"]);
        assert_eq!(source.count(Tab::Commentary), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tab_round_trip_uses_cache() {
        let source = Arc::new(RecordingSource::default());
        let view = view_of(&source);

        settle(view.apply("66709", |c| c.open("66709")).await.1).await;
        settle(view.apply("66709", |c| c.set_active_tab(Tab::Scorecard)).await.1).await;
        let (p, h) = view.apply("66709", |c| c.set_active_tab(Tab::Commentary)).await;
        assert!(h.is_none());
        assert_eq!(active(p).state, ResourceState::Ready);

        assert_eq!(
            source.calls(),
            vec![(Tab::Commentary, 66709), (Tab::Scorecard, 66709)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_for_different_matches_are_independent() {
        let source = Arc::new(RecordingSource::default());
        let view = view_of(&source);

        settle(view.apply("1", |c| c.navigate("1", Tab::Scorecard)).await.1).await;
        settle(view.apply("2", |c| c.open("2")).await.1).await;

        // match 1 is untouched by a viewer of match 2
        let v1 = active(view.snapshot("1").await);
        assert_eq!(v1.tab, Tab::Scorecard);
        assert_eq!(v1.state, ResourceState::Ready);
        let v2 = active(view.snapshot("2").await);
        assert_eq!(v2.tab, Tab::Commentary);
        assert_eq!(v2.state, ResourceState::Ready);

        assert_eq!(view.open("1").await.tab, TabProjection::Active(v1));
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tab_surfaces_error_and_retries() {
        let source = Arc::new(RecordingSource {
            fail_scorecard: true,
            ..Default::default()
        });
        let view = view_of(&source);

        settle(view.apply("9", |c| c.navigate("9", Tab::Scorecard)).await.1).await;
        let v = active(view.snapshot("9").await);
        assert_eq!(v.state, ResourceState::Failed);
        assert!(v.retryable);
        assert!(v.error.unwrap().contains("scorecard service unavailable"));

        // other tabs are unaffected
        settle(view.apply("9", |c| c.set_active_tab(Tab::Discussion)).await.1).await;
        assert_eq!(active(view.snapshot("9").await).state, ResourceState::Ready);

        settle(view.apply("9", |c| c.set_active_tab(Tab::Scorecard)).await.1).await;
        settle(view.apply("9", |c| c.retry()).await.1).await;
        assert_eq!(source.count(Tab::Scorecard), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_match_renders_not_found() {
        let source = Arc::new(RecordingSource::default());
        let view = view_of(&source);

        assert!(view.open("abc").await.is_not_found());
        assert!(view.navigate("abc", Tab::Scorecard).await.is_not_found());
        assert!(view.snapshot("abc").await.is_not_found());
        tokio::time::sleep(PERIOD).await;
        assert!(source.calls().is_empty());
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_drops_in_flight_response() {
        let source = Arc::new(RecordingSource::default());
        source
            .commentary_delays
            .lock()
            .unwrap()
            .push_back(Duration::from_secs(2));
        let view = view_of(&source);

        let (_, h) = view.apply("5", |c| c.open("5")).await;
        view.close().await;
        settle(h).await;

        assert_eq!(view.snapshot("5").await, MatchPage::closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_from_closed_page_never_reaches_reopened_page() {
        let source = Arc::new(RecordingSource::default());
        source
            .commentary_delays
            .lock()
            .unwrap()
            .push_back(Duration::from_secs(2));
        let view = view_of(&source);

        let (_, old) = view.apply("5", |c| c.open("5")).await;
        view.close().await;
        let (_, fresh) = view.apply("5", |c| c.open("5")).await;
        settle(fresh).await;
        settle(old).await;

        let v = active(view.snapshot("5").await);
        assert_eq!(v.state, ResourceState::Ready);
        assert_eq!(commentary_ids(&v), vec!["c2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_header_refreshes_while_open_and_stops_on_close() {
        let source = Arc::new(RecordingSource::default());
        let view = view_of(&source);

        view.open("66709").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let header = view.snapshot("66709").await.header.unwrap();
        assert!(header.error.is_none());
        assert_eq!(header.record.unwrap().score.runs, 142);

        tokio::time::sleep(PERIOD * 2).await;
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 3);

        view.close().await;
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_header_not_live_is_retryable_error() {
        let source = Arc::new(RecordingSource::default());
        *source.header_status.lock().unwrap() = Some("Completed".into());
        let view = view_of(&source);

        view.open("7").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let page = view.snapshot("7").await;
        let header = page.header.unwrap();
        assert_eq!(header.error.as_deref(), Some("match 7 is not live"));
        assert!(header.retryable);

        // the tab region is unaffected
        assert_eq!(active(view.snapshot("7").await).state, ResourceState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_header_retry_recovers_without_waiting_for_tick() {
        let source = Arc::new(RecordingSource::default());
        source.header_failing.store(true, Ordering::SeqCst);
        let view = view_of(&source);

        view.open("7").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let header = view.snapshot("7").await.header.unwrap();
        assert!(header.retryable);
        assert!(header.record.is_none());

        source.header_failing.store(false, Ordering::SeqCst);
        let id = MatchId::parse("7").unwrap();
        settle(view.retry_header(id).await).await;

        let header = view.snapshot("7").await.header.unwrap();
        assert!(header.error.is_none());
        assert!(header.record.is_some());
        assert_eq!(source.header_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recently_used_page_is_evicted() {
        let source = Arc::new(RecordingSource::default());
        let view = view_of(&source);

        for id in 1..=MAX_OPEN_MATCHES {
            view.open(&id.to_string()).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // touch match 1 so match 2 becomes the oldest
        view.open("1").await;
        view.open("1000").await;

        assert_eq!(view.inner.lock().await.pages.len(), MAX_OPEN_MATCHES);
        assert_eq!(view.snapshot("2").await, MatchPage::closed());
        assert!(view.snapshot("1").await.header.is_some());
    }
}
