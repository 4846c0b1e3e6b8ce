use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::feed::FeedFilter;
use crate::tabs::Tab;
use crate::view::detail::MatchPage;
use crate::view::{FeedView, MatchDetailView};

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedView>,
    pub detail: MatchDetailView,
}

/// Build the Axum router for the presentation layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/feed", get(feed_handler))
        .route("/api/feed/retry", post(feed_retry_handler))
        .route("/api/schedule", get(schedule_handler))
        .route("/api/matches/:id", get(match_handler))
        .route("/api/matches/:id/retry", post(match_retry_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Deserialize)]
struct FeedParams {
    filter: Option<String>,
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatchParams {
    tab: Option<String>,
}

/// GET /health
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "feed_mounted": state.feed.is_mounted().await,
    }))
}

/// GET /api/feed?filter=ALL|LIVE|COMPLETED&q=perth
async fn feed_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeedParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(raw) = params.filter.as_deref() {
        let filter: FeedFilter = raw
            .parse()
            .map_err(|e: crate::error::ParseLabelError| (StatusCode::BAD_REQUEST, e.to_string()))?;
        state.feed.set_filter(filter).await;
    }
    if let Some(q) = params.q.as_deref() {
        state.feed.set_search(q).await;
    }
    Ok(Json(state.feed.snapshot().await))
}

/// POST /api/feed/retry
async fn feed_retry_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.feed.retry().await;
    Json(state.feed.snapshot().await)
}

/// GET /api/schedule
async fn schedule_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.feed.schedule().await)
}

/// GET /api/matches/:id?tab=scorecard
///
/// Without `tab` an already open page is returned as is, and a new one
/// starts on the default tab.
async fn match_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<MatchParams>,
) -> Result<Response, (StatusCode, String)> {
    let page = match params.tab.as_deref() {
        Some(raw) => {
            let tab: Tab = raw
                .parse()
                .map_err(|e: crate::error::ParseLabelError| (StatusCode::BAD_REQUEST, e.to_string()))?;
            state.detail.navigate(&id, tab).await
        }
        None => state.detail.open(&id).await,
    };
    Ok(page_response(page))
}

/// POST /api/matches/:id/retry
async fn match_retry_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    page_response(state.detail.retry(&id).await)
}

fn page_response(page: MatchPage) -> Response {
    let status = if page.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    (status, Json(page)).into_response()
}
