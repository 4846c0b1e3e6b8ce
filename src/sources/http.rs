use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::provider::{MatchSource, SecondarySource};
use crate::feed::models::{
    CommentaryBall, DiscussionPost, LiveRecord, MatchId, ScheduleRecord, Scorecard,
};

/// Cricket data API over plain HTTP/JSON.
///
/// Endpoints, relative to the base URL:
/// `matches/live`, `schedules`, `matches/{id}`, `matches/{id}/commentary`,
/// `matches/{id}/scorecard`, `matches/{id}/discussions`.
#[derive(Clone)]
pub struct HttpCricketApi {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCricketApi {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpCricketApi {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.endpoint(path);
        debug!("GET {}", url);

        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("request to {} failed", path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} returned {}: {}", path, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse {} response", path))
    }
}

#[async_trait]
impl MatchSource for HttpCricketApi {
    fn name(&self) -> &str {
        "cricket-api"
    }

    async fn fetch_live_records(&self) -> Result<Vec<LiveRecord>> {
        let raw = self.get_json("matches/live").await?;
        Ok(decode_each(&raw, "live record"))
    }

    async fn fetch_schedule_records(&self) -> Result<Vec<ScheduleRecord>> {
        let raw = self.get_json("schedules").await?;
        Ok(decode_each(&raw, "schedule record"))
    }
}

#[async_trait]
impl SecondarySource for HttpCricketApi {
    async fn fetch_match(&self, match_id: MatchId) -> Result<LiveRecord> {
        let raw = self.get_json(&format!("matches/{}", match_id)).await?;
        decode_one(&raw).with_context(|| format!("malformed match record for {}", match_id))
    }

    async fn fetch_commentary(&self, match_id: MatchId) -> Result<Vec<CommentaryBall>> {
        let raw = self.get_json(&format!("matches/{}/commentary", match_id)).await?;
        Ok(decode_each(&raw, "commentary ball"))
    }

    async fn fetch_scorecard(&self, match_id: MatchId) -> Result<Scorecard> {
        let raw = self.get_json(&format!("matches/{}/scorecard", match_id)).await?;
        decode_one(&raw).with_context(|| format!("malformed scorecard for match {}", match_id))
    }

    async fn fetch_discussion(&self, match_id: MatchId) -> Result<Vec<DiscussionPost>> {
        let raw = self.get_json(&format!("matches/{}/discussions", match_id)).await?;
        Ok(decode_each(&raw, "discussion post"))
    }
}

/// Unwrap an optional `{"data": ...}` envelope.
fn payload(raw: &Value) -> &Value {
    match raw.get("data") {
        Some(inner) if raw.is_object() => inner,
        _ => raw,
    }
}

/// Decode every array element on its own so one malformed element costs
/// only itself. A non-array payload decodes to nothing.
fn decode_each<T: DeserializeOwned>(raw: &Value, what: &str) -> Vec<T> {
    let items = match payload(raw).as_array() {
        Some(a) => a,
        None => return vec![],
    };

    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Skipping malformed {}: {}", what, e);
                None
            }
        })
        .collect()
}

fn decode_one<T: DeserializeOwned>(raw: &Value) -> Result<T> {
    Ok(T::deserialize(payload(raw))?)
}
