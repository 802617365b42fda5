//! ticket-sync: client-side data synchronization for the ticket gateway.
//!
//! Single-binary Tokio application that:
//! 1. Restores durable cache snapshots and injects hydration payloads
//! 2. Reads league, team and hot-fixture lists through the query cache
//! 3. Streams a fixture's ticket offers with live progress

mod config;

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use clap::Parser;
use futures_util::future::join;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use catalog::{resolve_filter_options_at, FilterOptions, NavigationIndex};
use common::{Error, Fixture, FixtureFilter, League, LeagueWithTeams, SyncConfig};
use gateway_client::{GatewayRestClient, OfferStreamClient};
use offer_stream::OfferStreamSynchronizer;
use query_cache::{
    CacheKey, HydrationInjector, HydrationPayloads, PersistenceBridge, QueryCache, QueryState,
    ResourceKind,
};

/// Ticket gateway sync client
#[derive(Parser)]
#[command(name = "ticket-sync", about = "Ticket gateway cache and offer stream client")]
struct Cli {
    /// Stream ticket offers for a fixture id until the feed completes.
    #[arg(long)]
    fixture: Option<String>,

    /// Read a league's fixtures (by slug or id) and print filter options.
    #[arg(long)]
    league: Option<String>,

    /// Narrow league fixtures to a month (YYYY-MM). Takes precedence over --venue.
    #[arg(long, requires = "league")]
    month: Option<String>,

    /// Narrow league fixtures to a venue id.
    #[arg(long, requires = "league")]
    venue: Option<String>,

    /// Read the homepage hot fixtures.
    #[arg(long)]
    hot: bool,

    /// Number of hot fixtures to request.
    #[arg(long, default_value_t = 10)]
    hot_limit: u32,

    /// Inject a server-rendered hydration payload (JSON) before anything else.
    #[arg(long)]
    hydrate: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeagueReport<'a> {
    league_id: &'a str,
    key: &'a str,
    fixtures: usize,
    #[serde(flatten)]
    options: FilterOptions,
}

fn to_json<T: Serialize>(value: T) -> Result<Value, Error> {
    Ok(serde_json::to_value(value)?)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(out) => println!("{out}"),
        Err(e) => error!("Failed to render output: {}", e),
    }
}

/// Subscribe, wait for the fetch to settle, and release the key.
async fn read_through<F, Fut>(cache: &QueryCache, key: CacheKey, fetcher: F) -> QueryState
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Error>> + Send + 'static,
{
    let sub = cache.subscribe(key, fetcher, cache.default_options());
    let state = sub.settled().await;
    if let Some(message) = &state.error {
        warn!("{}: {}", sub.key(), message);
    }
    state
}

fn hydrate_from_file(
    path: &Path,
    cache: &QueryCache,
    injector: &HydrationInjector,
) -> Result<usize, Error> {
    let raw = std::fs::read_to_string(path)?;
    let payloads: HydrationPayloads = serde_json::from_str(&raw)?;
    Ok(injector.inject(cache, &payloads))
}

async fn load_navigation(cache: &QueryCache, rest: &Arc<GatewayRestClient>) -> NavigationIndex {
    let client = rest.clone();
    let state = read_through(
        cache,
        CacheKey::singleton(ResourceKind::LeaguesWithTeams),
        move || {
            let client = client.clone();
            async move { to_json(client.get_leagues_with_teams().await?) }
        },
    )
    .await;

    let payload: Vec<LeagueWithTeams> = state.data_as().unwrap_or_default();
    NavigationIndex::from_payload(payload)
}

fn fixture_fetcher(
    rest: &Arc<GatewayRestClient>,
    league_id: &str,
    filter: FixtureFilter,
) -> impl Fn() -> futures_util::future::BoxFuture<'static, Result<Value, Error>> + Send + Sync + 'static {
    use futures_util::FutureExt;

    let client = rest.clone();
    let league_id = league_id.to_string();
    move || {
        let client = client.clone();
        let league_id = league_id.clone();
        let filter = filter.clone();
        async move { to_json(client.get_league_fixtures(&league_id, &filter).await?) }.boxed()
    }
}

async fn show_league(
    cache: &QueryCache,
    rest: &Arc<GatewayRestClient>,
    nav: &NavigationIndex,
    slug_or_id: &str,
    filter: FixtureFilter,
) {
    let league: League = match nav.league_by_slug(slug_or_id) {
        Some(entry) => entry.league.clone(),
        None => {
            info!("League {} not in navigation index; using it as an id", slug_or_id);
            League {
                id: slug_or_id.to_string(),
                slug: slug_or_id.to_string(),
                name: String::new(),
                country: None,
                months: Vec::new(),
            }
        }
    };

    let filter = filter.normalized();
    let all_key = CacheKey::derive(ResourceKind::League, Some(&league.id), None);
    let filtered_key = CacheKey::derive(ResourceKind::League, Some(&league.id), Some(&filter));

    let (initial, filtered) = join(
        read_through(
            cache,
            all_key,
            fixture_fetcher(rest, &league.id, FixtureFilter::default()),
        ),
        read_through(
            cache,
            filtered_key.clone(),
            fixture_fetcher(rest, &league.id, filter),
        ),
    )
    .await;

    let initial: Vec<Fixture> = initial.data_as().unwrap_or_default();
    let filtered: Vec<Fixture> = filtered.data_as().unwrap_or_default();
    let options = resolve_filter_options_at(
        Some(&league),
        &initial,
        &filtered,
        Utc::now().date_naive(),
    );

    info!(
        "League {}: {} fixtures under {} ({} months, {} venues)",
        league.id,
        filtered.len(),
        filtered_key,
        options.available_months.len(),
        options.available_venues.len()
    );
    print_json(&LeagueReport {
        league_id: &league.id,
        key: filtered_key.as_str(),
        fixtures: filtered.len(),
        options,
    });
}

async fn show_hot(cache: &QueryCache, rest: &Arc<GatewayRestClient>, limit: u32) {
    let client = rest.clone();
    let state = read_through(cache, CacheKey::singleton(ResourceKind::HotFixtures), move || {
        let client = client.clone();
        async move { to_json(client.get_hot_fixtures(limit).await?) }
    })
    .await;

    let hot: Vec<Fixture> = state.data_as().unwrap_or_default();
    info!("Hot fixtures: {} (stale={})", hot.len(), state.is_stale);
    print_json(&hot);
}

async fn stream_offers(cfg: &SyncConfig, fixture_id: &str) -> Result<(), Error> {
    let client = Arc::new(OfferStreamClient::new(&cfg.gateway)?);
    let mut sync = OfferStreamSynchronizer::new(client);
    let mut rx = sync.subscribe();
    sync.set_fixture(Some(fixture_id));

    loop {
        let view = rx.borrow_and_update().clone();
        info!(
            "Fixture {}: {:?} progress={}% offers={} chunks={}/{}",
            fixture_id,
            view.status(),
            view.progress(),
            view.offers.len(),
            view.received_chunks,
            view.total_chunks
        );
        if !view.is_loading() {
            if let Some(message) = &view.error {
                warn!("Offer stream for {} failed: {}", fixture_id, message);
            }
            print_json(&view);
            return Ok(());
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                sync.teardown();
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ticket_sync=info,gateway_client=info,query_cache=info,offer_stream=info,catalog=info"
                    .into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("ticket-sync starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    info!("Gateway: {}", cfg.gateway.base_url);

    // ── Cache and snapshots ──────────────────────────────────────────
    let bridge = Arc::new(PersistenceBridge::from_config(&cfg.persistence));
    let cache = QueryCache::new(&cfg.cache, Some(bridge.clone()));
    bridge.restore(&cache);

    if let Some(path) = &cli.hydrate {
        let injector = HydrationInjector::new();
        match hydrate_from_file(path, &cache, &injector) {
            Ok(n) => info!("Hydrated {} payloads from {}", n, path.display()),
            Err(e) => warn!("Skipping hydration from {}: {}", path.display(), e),
        }
    }

    let rest = match GatewayRestClient::new(&cfg.gateway) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build gateway client: {}", e);
            std::process::exit(1);
        }
    };

    // ── Commands ─────────────────────────────────────────────────────
    let mut ran = false;

    if let Some(slug) = cli.league.as_deref() {
        ran = true;
        let nav = load_navigation(&cache, &rest).await;
        let filter = FixtureFilter {
            month: cli.month.clone(),
            venue: cli.venue.clone(),
        };
        show_league(&cache, &rest, &nav, slug, filter).await;
    }

    if cli.hot {
        ran = true;
        show_hot(&cache, &rest, cli.hot_limit).await;
    }

    if let Some(fixture_id) = cli.fixture.as_deref() {
        ran = true;
        if let Err(e) = stream_offers(&cfg, fixture_id).await {
            error!("Offer stream error: {}", e);
            std::process::exit(1);
        }
    }

    if !ran {
        warn!("Nothing to do: pass --league, --hot or --fixture (see --help)");
    }

    let flushed = bridge.flush().await;
    if flushed > 0 {
        info!("Wrote {} cache snapshots", flushed);
    }

    let pruned = cache.prune_idle();
    info!("Done ({} cached entries, {} pruned)", cache.len(), pruned);
}
