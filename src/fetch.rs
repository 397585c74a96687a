//! Two-tier fetch: route page first, JSON payload as fallback.
//!
//! The tier ladder is an explicit state machine so the "fallback only after
//! a markup miss" rule is enforced and testable without network I/O; the
//! `Fetcher` drives it with real requests. Each tier fires exactly once per
//! resolution attempt: no retries, no backoff.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use tracing::debug;

use crate::api;
use crate::error::ResolveError;
use crate::extract::{self, ExtractedFields};
use crate::model::ROUTE_BASE_URL;

pub const MARKUP_TIMEOUT: Duration = Duration::from_secs(15);
pub const FALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

const MARKUP_USER_AGENT: &str = "Mozilla/5.0 (compatible; VeloRoutes-SiteBuilder/1.0)";
const FALLBACK_USER_AGENT: &str = "VeloRoutes-SiteBuilder/1.0";
const MARKUP_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

static ROUTE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/routes/(\d+)").unwrap());

/// Numeric route id from a route URL, if it carries one.
pub fn route_id_from_url(url: &str) -> Option<String> {
    ROUTE_ID_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    NotStarted,
    MarkupTried,
    FallbackTried,
    Resolved,
    Failed,
}

/// Outcome of a single tier attempt.
#[derive(Debug)]
pub enum TierOutcome {
    Hit(ExtractedFields),
    Miss(String),
}

/// State machine over the two fetch tiers. Transition order is enforced:
/// markup runs from NotStarted, fallback only after a markup miss.
pub struct TierLadder {
    state: FetchState,
    misses: Vec<String>,
}

impl TierLadder {
    pub fn new() -> Self {
        TierLadder {
            state: FetchState::NotStarted,
            misses: Vec::new(),
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn markup(&mut self, outcome: TierOutcome) -> Option<ExtractedFields> {
        debug_assert_eq!(self.state, FetchState::NotStarted, "markup tier runs first");
        match outcome {
            TierOutcome::Hit(fields) => {
                self.state = FetchState::Resolved;
                Some(fields)
            }
            TierOutcome::Miss(why) => {
                self.state = FetchState::MarkupTried;
                self.misses.push(format!("markup: {why}"));
                None
            }
        }
    }

    pub fn fallback(&mut self, outcome: TierOutcome) -> Option<ExtractedFields> {
        debug_assert_eq!(
            self.state,
            FetchState::MarkupTried,
            "fallback runs only after a markup miss"
        );
        self.state = FetchState::FallbackTried;
        match outcome {
            TierOutcome::Hit(fields) => {
                self.state = FetchState::Resolved;
                Some(fields)
            }
            TierOutcome::Miss(why) => {
                self.state = FetchState::Failed;
                self.misses.push(format!("fallback: {why}"));
                None
            }
        }
    }

    /// Joined miss reasons, for the FetchFailed error.
    pub fn failure(&self) -> String {
        self.misses.join("; ")
    }
}

impl Default for TierLadder {
    fn default() -> Self {
        TierLadder::new()
    }
}

pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Fetcher { client })
    }

    /// Resolve one route URL into extracted fields, or FetchFailed once
    /// both tiers have missed.
    pub async fn fetch(&self, url: &str, route_id: &str) -> Result<ExtractedFields, ResolveError> {
        let mut ladder = TierLadder::new();

        if let Some(fields) = ladder.markup(self.markup_tier(url, route_id).await) {
            return Ok(fields);
        }
        debug!("markup tier missed for route {route_id}, trying fallback");
        if let Some(fields) = ladder.fallback(self.fallback_tier(route_id).await) {
            return Ok(fields);
        }

        Err(ResolveError::FetchFailed {
            id: route_id.to_string(),
            reasons: ladder.failure(),
        })
    }

    async fn markup_tier(&self, url: &str, route_id: &str) -> TierOutcome {
        let response = self
            .client
            .get(url)
            .timeout(MARKUP_TIMEOUT)
            .header(USER_AGENT, MARKUP_USER_AGENT)
            .header(ACCEPT, MARKUP_ACCEPT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == StatusCode::OK => match resp.text().await {
                Ok(html) => match extract::extract(&html, route_id) {
                    Some(fields) => TierOutcome::Hit(fields),
                    None => TierOutcome::Miss("no title in page".to_string()),
                },
                Err(e) => TierOutcome::Miss(format!("body read: {e}")),
            },
            Ok(resp) => TierOutcome::Miss(format!("http {}", resp.status().as_u16())),
            Err(e) => TierOutcome::Miss(format!("transport: {e}")),
        }
    }

    async fn fallback_tier(&self, route_id: &str) -> TierOutcome {
        let api_url = format!("{ROUTE_BASE_URL}/{route_id}.json");
        let response = self
            .client
            .get(&api_url)
            .timeout(FALLBACK_TIMEOUT)
            .header(USER_AGENT, FALLBACK_USER_AGENT)
            .header(ACCEPT, "application/json")
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == StatusCode::OK => match resp.text().await {
                Ok(body) => match serde_json::from_str::<serde_json::Value>(&body) {
                    Ok(payload) => TierOutcome::Hit(api::from_json(&payload, route_id)),
                    Err(e) => TierOutcome::Miss(format!("bad payload: {e}")),
                },
                Err(e) => TierOutcome::Miss(format!("body read: {e}")),
            },
            Ok(resp) => TierOutcome::Miss(format!("http {}", resp.status().as_u16())),
            Err(e) => TierOutcome::Miss(format!("transport: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SurfaceType;

    fn fields(title: &str) -> ExtractedFields {
        ExtractedFields {
            title: title.to_string(),
            description: None,
            surface: SurfaceType::Road,
            distance_km: None,
            elevation_m: None,
            image: String::new(),
            image_large: String::new(),
        }
    }

    #[test]
    fn route_id_parsing() {
        assert_eq!(
            route_id_from_url("https://ridewithgps.com/routes/12345").as_deref(),
            Some("12345")
        );
        assert_eq!(
            route_id_from_url("https://ridewithgps.com/routes/12345?unit=km").as_deref(),
            Some("12345")
        );
        assert_eq!(route_id_from_url("https://ridewithgps.com/trips/12345"), None);
        assert_eq!(route_id_from_url("https://ridewithgps.com/routes/abc"), None);
    }

    #[test]
    fn markup_hit_resolves_without_fallback() {
        let mut ladder = TierLadder::new();
        let out = ladder.markup(TierOutcome::Hit(fields("A")));
        assert!(out.is_some());
        assert_eq!(ladder.state(), FetchState::Resolved);
    }

    #[test]
    fn markup_miss_then_fallback_hit() {
        let mut ladder = TierLadder::new();
        assert!(ladder.markup(TierOutcome::Miss("http 404".into())).is_none());
        assert_eq!(ladder.state(), FetchState::MarkupTried);
        let out = ladder.fallback(TierOutcome::Hit(fields("B")));
        assert!(out.is_some());
        assert_eq!(ladder.state(), FetchState::Resolved);
    }

    #[test]
    fn both_tiers_miss_fails() {
        let mut ladder = TierLadder::new();
        ladder.markup(TierOutcome::Miss("transport: timeout".into()));
        assert!(ladder
            .fallback(TierOutcome::Miss("http 500".into()))
            .is_none());
        assert_eq!(ladder.state(), FetchState::Failed);
        let reasons = ladder.failure();
        assert!(reasons.contains("markup: transport: timeout"));
        assert!(reasons.contains("fallback: http 500"));
    }

    #[test]
    #[should_panic(expected = "fallback runs only after a markup miss")]
    fn fallback_before_markup_panics() {
        let mut ladder = TierLadder::new();
        ladder.fallback(TierOutcome::Hit(fields("C")));
    }

    #[test]
    #[should_panic(expected = "markup tier runs first")]
    fn markup_after_resolution_panics() {
        let mut ladder = TierLadder::new();
        ladder.markup(TierOutcome::Hit(fields("D")));
        ladder.markup(TierOutcome::Hit(fields("E")));
    }
}
