//! REST client for the remote data gateway.
//!
//! Covers: leagues with teams, league/team fixture lists, hot fixtures,
//! single fixtures. All methods are rate-limited and normalize the
//! response envelope once.

use common::config::GatewayConfig;
use common::{Error, Fixture, FixtureFilter, League, LeagueWithTeams};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::envelope::{ApiResponse, FixtureList, Page};
use crate::rate_limit::RateLimiter;
use crate::{format_error_chain, join_url, normalize_base_url};

const PAGE_SIZE: u32 = 100;
const MAX_PAGES: u32 = 50;

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace(['\n', '\r'], " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => format!("{}…", &compact[..cut]),
        None => compact,
    }
}

/// Async REST client for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRestClient {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl GatewayRestClient {
    /// Create a client from gateway settings.
    pub fn new(cfg: &GatewayConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| Error::Http(format_error_chain(&e)))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&cfg.base_url),
            limiter: RateLimiter::per_second(cfg.requests_per_sec),
        })
    }

    /// URL helper. Ids and slugs are encoded as single path segments.
    fn url(&self, segments: &[&str]) -> Result<url::Url, Error> {
        join_url(&self.base_url, segments.iter().copied())
    }

    /// GET a path and decode the body, mapping non-200 responses to `Error::Api`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(segments)?;
        self.limiter.wait().await;

        let resp = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(format_error_chain(&e)))?;

        let status_code = resp.status().as_u16();
        let raw_body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format_error_chain(&e)))?;

        if status_code != 200 {
            return Err(Error::Api {
                status: status_code,
                message: summarize_response_body(&raw_body),
            });
        }

        serde_json::from_str(&raw_body).map_err(|e| {
            warn!(
                "Error decoding {}: {}; body={}",
                url.path(),
                e,
                summarize_response_body(&raw_body)
            );
            Error::Json(e)
        })
    }

    /// Follow page numbers until the gateway reports no more pages.
    async fn collect_fixture_pages(
        &self,
        segments: &[&str],
        filter_pairs: Vec<(&'static str, String)>,
    ) -> Result<Vec<Fixture>, Error> {
        let mut all_fixtures = Vec::new();
        let mut page_no = 1u32;

        loop {
            let mut query = filter_pairs.clone();
            query.push(("page", page_no.to_string()));
            query.push(("limit", PAGE_SIZE.to_string()));

            let page: Page<Fixture> = self
                .get_json::<ApiResponse<FixtureList>>(segments, &query)
                .await?
                .into_page()?;

            let count = page.items.len();
            let more = page.has_more();
            all_fixtures.extend(page.items);

            debug!(
                "Fetched {} fixtures from /{} page {} (total: {})",
                count,
                segments.join("/"),
                page_no,
                all_fixtures.len()
            );

            if !more || count == 0 || page_no >= MAX_PAGES {
                break;
            }
            page_no += 1;
        }

        Ok(all_fixtures)
    }

    // ── Catalog endpoints ─────────────────────────────────────────────

    /// Fetch every league with its teams (navigation payload).
    pub async fn get_leagues_with_teams(&self) -> Result<Vec<LeagueWithTeams>, Error> {
        let (leagues, _) = self
            .get_json::<ApiResponse<Vec<LeagueWithTeams>>>(&["leagues", "with-teams"], &[])
            .await?
            .into_parts()?;
        debug!("Fetched {} leagues with teams", leagues.len());
        Ok(leagues)
    }

    /// Fetch all leagues without teams.
    pub async fn get_leagues(&self) -> Result<Vec<League>, Error> {
        let page = self
            .get_json::<ApiResponse<Vec<League>>>(&["leagues"], &[])
            .await?
            .into_page()?;
        Ok(page.items)
    }

    /// Fetch a single league by id or slug.
    pub async fn get_league(&self, id_or_slug: &str) -> Result<League, Error> {
        let (league, _) = self
            .get_json::<ApiResponse<League>>(&["leagues", id_or_slug], &[])
            .await?
            .into_parts()?;
        Ok(league)
    }

    // ── Fixture endpoints ─────────────────────────────────────────────

    /// Fetch a league's fixtures. Venue is dropped whenever month is set.
    pub async fn get_league_fixtures(
        &self,
        league_id: &str,
        filter: &FixtureFilter,
    ) -> Result<Vec<Fixture>, Error> {
        self.collect_fixture_pages(&["leagues", league_id, "fixtures"], filter.query_pairs())
            .await
    }

    /// Fetch a team's fixtures.
    pub async fn get_team_fixtures(
        &self,
        team_id: &str,
        filter: &FixtureFilter,
    ) -> Result<Vec<Fixture>, Error> {
        self.collect_fixture_pages(&["teams", team_id, "fixtures"], filter.query_pairs())
            .await
    }

    /// Fetch the homepage "hot fixtures" list.
    pub async fn get_hot_fixtures(&self, limit: u32) -> Result<Vec<Fixture>, Error> {
        let page = self
            .get_json::<ApiResponse<FixtureList>>(&["fixtures", "hot"], &[("limit", limit.to_string())])
            .await?
            .into_page()?;
        Ok(page.items)
    }

    /// Fetch a single fixture by id.
    pub async fn get_fixture(&self, fixture_id: &str) -> Result<Fixture, Error> {
        let (fixture, _) = self
            .get_json::<ApiResponse<Fixture>>(&["fixtures", fixture_id], &[])
            .await?
            .into_parts()?;
        Ok(fixture)
    }
}
