//! Keyed in-memory query cache.
//!
//! Uses `DashMap` so reads from many views never contend. Each entry
//! tracks freshness, subscriber count and at most one in-flight fetch;
//! concurrent subscribers to the same key share that fetch through a
//! `Shared` future over the spawned task.

use common::config::CacheConfig;
use common::Error;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::keys::CacheKey;
use crate::persist::PersistenceBridge;

/// Result shared by every waiter on a fetch: the stored value or a
/// user-facing error message.
pub type FetchOutcome = Result<Arc<Value>, String>;

type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, Error>> + Send + Sync>;

/// Per-subscription options. Defaults come from [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub gc_time: Duration,
    /// Extra attempts after the first failure.
    pub retry: u32,
    /// Delay before the first retry; doubles each attempt.
    pub retry_delay: Duration,
    /// Seed value used when the key has no data yet.
    pub initial_data: Option<Value>,
    /// Never fetch when `initial_data` was supplied.
    pub skip_fetch_with_initial_data: bool,
    /// Disabled subscriptions read the cache but never fetch on mount.
    pub enabled: bool,
}

impl QueryOptions {
    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self {
            stale_time: cfg.stale_time(),
            gc_time: cfg.gc_time(),
            retry: cfg.retries,
            retry_delay: cfg.retry_delay(),
            initial_data: None,
            skip_fetch_with_initial_data: false,
            enabled: true,
        }
    }

    pub fn with_initial_data(mut self, value: Value, skip_fetch: bool) -> Self {
        self.initial_data = Some(value);
        self.skip_fetch_with_initial_data = skip_fetch;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn with_retry(mut self, retry: u32, retry_delay: Duration) -> Self {
        self.retry = retry;
        self.retry_delay = retry_delay;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Snapshot of one key as seen by a consumer.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub data: Option<Arc<Value>>,
    /// No data yet and a fetch is running.
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_stale: bool,
    /// Plain-language message from the last failed fetch.
    pub error: Option<String>,
}

impl QueryState {
    /// Decode the cached JSON into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        let data = self.data.as_deref()?;
        match T::deserialize(data) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Cached value does not match the requested type: {}", e);
                None
            }
        }
    }
}

#[derive(Clone, Copy)]
struct RetryPolicy {
    retries: u32,
    delay: Duration,
}

impl From<&QueryOptions> for RetryPolicy {
    fn from(opts: &QueryOptions) -> Self {
        Self {
            retries: opts.retry,
            delay: opts.retry_delay,
        }
    }
}

struct CacheEntry {
    value: Option<Arc<Value>>,
    updated_at: Option<Instant>,
    stale_after: Duration,
    discard_after: Duration,
    subscribers: usize,
    error: Option<String>,
    in_flight: Option<InFlight>,
    idle_since: Option<Instant>,
    invalidated: bool,
}

impl CacheEntry {
    fn new(stale_after: Duration, discard_after: Duration) -> Self {
        Self {
            value: None,
            updated_at: None,
            stale_after,
            discard_after,
            subscribers: 0,
            error: None,
            in_flight: None,
            idle_since: None,
            invalidated: false,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        !self.invalidated
            && self.value.is_some()
            && self
                .updated_at
                .is_some_and(|t| now.duration_since(t) < self.stale_after)
    }

    fn is_evictable(&self, now: Instant) -> bool {
        self.subscribers == 0
            && self.in_flight.is_none()
            && self
                .idle_since
                .is_some_and(|t| now.duration_since(t) >= self.discard_after)
    }

    fn state(&self, now: Instant) -> QueryState {
        let is_fetching = self.in_flight.is_some();
        QueryState {
            data: self.value.clone(),
            is_loading: self.value.is_none() && is_fetching,
            is_fetching,
            is_stale: self.value.is_some() && !self.is_fresh(now),
            error: self.error.clone(),
        }
    }
}

struct Inner {
    entries: DashMap<CacheKey, CacheEntry>,
    defaults: QueryOptions,
    persistence: Option<Arc<PersistenceBridge>>,
}

/// Process-wide query cache. Cloning is cheap and shares state.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.len())
            .field("persistence", &self.inner.persistence.is_some())
            .finish()
    }
}

impl QueryCache {
    pub fn new(cfg: &CacheConfig, persistence: Option<Arc<PersistenceBridge>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                defaults: QueryOptions::from_config(cfg),
                persistence,
            }),
        }
    }

    /// Options seeded from the cache's config.
    pub fn default_options(&self) -> QueryOptions {
        self.inner.defaults.clone()
    }

    pub fn persistence(&self) -> Option<&Arc<PersistenceBridge>> {
        self.inner.persistence.as_ref()
    }

    /// Cached value for a key, fresh or stale.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Value>> {
        self.inner
            .entries
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    pub fn state(&self, key: &CacheKey) -> QueryState {
        let now = Instant::now();
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.state(now))
            .unwrap_or_default()
    }

    /// Store a value as freshly fetched.
    pub fn set(&self, key: CacheKey, value: Value) {
        self.set_aged(key, value, Duration::ZERO);
    }

    /// Store a value that was fetched `age` ago.
    pub(crate) fn set_aged(&self, key: CacheKey, value: Value, age: Duration) {
        if key.is_absent() {
            return;
        }
        let now = Instant::now();
        let idle_discard = {
            let mut entry = self.inner.entries.entry(key.clone()).or_insert_with(|| {
                CacheEntry::new(self.inner.defaults.stale_time, self.inner.defaults.gc_time)
            });
            entry.value = Some(Arc::new(value));
            entry.error = None;
            match now.checked_sub(age) {
                Some(at) => {
                    entry.updated_at = Some(at);
                    entry.invalidated = false;
                }
                None => {
                    entry.updated_at = Some(now);
                    entry.invalidated = true;
                }
            }
            if entry.subscribers == 0 {
                entry.idle_since = Some(now);
                Some(entry.discard_after)
            } else {
                None
            }
        };
        if let Some(after) = idle_discard {
            self.schedule_eviction(key, after);
        }
    }

    /// Mark a key stale so the next subscriber refetches.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        match self.inner.entries.get_mut(key) {
            Some(mut entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        }
    }

    /// Subscribe to a key, fetching when the entry is missing or stale.
    ///
    /// At most one fetch per key runs at a time; later subscribers join
    /// it. Must be called from within a Tokio runtime.
    pub fn subscribe<F, Fut>(&self, key: CacheKey, fetcher: F, options: QueryOptions) -> QuerySubscription
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || fetcher().boxed());
        let policy = RetryPolicy::from(&options);
        let registered = !key.is_absent() && options.enabled;

        if registered {
            let now = Instant::now();
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(options.stale_time, options.gc_time));
            entry.subscribers += 1;
            entry.idle_since = None;
            entry.stale_after = options.stale_time;
            entry.discard_after = options.gc_time;

            if let Some(initial) = options.initial_data.as_ref() {
                if entry.value.is_none() {
                    entry.value = Some(Arc::new(initial.clone()));
                    entry.updated_at = Some(now);
                    entry.invalidated = false;
                }
            }

            let skip = options.initial_data.is_some() && options.skip_fetch_with_initial_data;
            if !skip && entry.in_flight.is_none() && !entry.is_fresh(now) {
                debug!("Fetching {}", key);
                entry.in_flight = Some(self.spawn_fetch(key.clone(), fetcher.clone(), policy));
            }
        }

        QuerySubscription {
            cache: self.clone(),
            key,
            fetcher,
            policy,
            stale_time: options.stale_time,
            gc_time: options.gc_time,
            registered,
        }
    }

    /// Drop every idle entry past its discard time.
    pub fn prune_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| !entry.is_evictable(now));
        let pruned = before.saturating_sub(self.inner.entries.len());
        if pruned > 0 {
            debug!("Pruned {} idle cache entries", pruned);
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    fn in_flight(&self, key: &CacheKey) -> Option<InFlight> {
        self.inner
            .entries
            .get(key)
            .and_then(|entry| entry.in_flight.clone())
    }

    /// Join the running fetch for a key or start one.
    fn ensure_fetch(
        &self,
        key: &CacheKey,
        fetcher: &Fetcher,
        policy: RetryPolicy,
        stale_time: Duration,
        gc_time: Duration,
    ) -> InFlight {
        let mut entry = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(stale_time, gc_time));
        match entry.in_flight.clone() {
            Some(running) => running,
            None => {
                let started = self.spawn_fetch(key.clone(), fetcher.clone(), policy);
                entry.in_flight = Some(started.clone());
                started
            }
        }
    }

    fn spawn_fetch(&self, key: CacheKey, fetcher: Fetcher, policy: RetryPolicy) -> InFlight {
        let cache = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetch_with_retries(&task_key, &fetcher, policy).await;
            cache.complete_fetch(&task_key, result)
        });

        let weak = Arc::downgrade(&self.inner);
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Fetch task for {} did not finish: {}", key, e);
                    if let Some(inner) = weak.upgrade() {
                        if let Some(mut entry) = inner.entries.get_mut(&key) {
                            entry.in_flight = None;
                        }
                    }
                    Err(Error::Other(e.to_string()).user_message())
                }
            }
        }
        .boxed()
        .shared()
    }

    fn complete_fetch(&self, key: &CacheKey, result: Result<Value, Error>) -> FetchOutcome {
        let now = Instant::now();
        let (outcome, idle_discard) = match self.inner.entries.get_mut(key) {
            Some(mut entry) => {
                entry.in_flight = None;
                let outcome = match result {
                    Ok(value) => {
                        let value = Arc::new(value);
                        entry.value = Some(value.clone());
                        entry.updated_at = Some(now);
                        entry.error = None;
                        entry.invalidated = false;
                        Ok(value)
                    }
                    // Previous value stays visible next to the error.
                    Err(e) => {
                        let message = e.user_message();
                        entry.error = Some(message.clone());
                        Err(message)
                    }
                };
                let idle = (entry.subscribers == 0).then_some(entry.discard_after);
                if idle.is_some() {
                    entry.idle_since = Some(now);
                }
                (outcome, idle)
            }
            None => (result.map(Arc::new).map_err(|e| e.user_message()), None),
        };

        if let (Ok(value), Some(bridge)) = (&outcome, &self.inner.persistence) {
            bridge.persist_in_background(key, value.clone());
        }
        if let Some(after) = idle_discard {
            self.schedule_eviction(key.clone(), after);
        }
        outcome
    }

    fn release(&self, key: &CacheKey) {
        let idle_discard = match self.inner.entries.get_mut(key) {
            Some(mut entry) => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                if entry.subscribers == 0 {
                    entry.idle_since = Some(Instant::now());
                    Some(entry.discard_after)
                } else {
                    None
                }
            }
            None => None,
        };
        if let Some(after) = idle_discard {
            self.schedule_eviction(key.clone(), after);
        }
    }

    fn schedule_eviction(&self, key: CacheKey, after: Duration) {
        // Outside a runtime, prune_idle picks the entry up later.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            sleep(after).await;
            if let Some(inner) = weak.upgrade() {
                QueryCache { inner }.evict_if_idle(&key);
            }
        });
    }

    fn evict_if_idle(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        let removed = self
            .inner
            .entries
            .remove_if(key, |_, entry| entry.is_evictable(now))
            .is_some();
        if removed {
            debug!("Evicted idle cache entry {}", key);
        }
        removed
    }
}

async fn fetch_with_retries(
    key: &CacheKey,
    fetcher: &Fetcher,
    policy: RetryPolicy,
) -> Result<Value, Error> {
    let mut attempt = 0u32;
    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.retries => {
                let backoff = policy.delay.saturating_mul(1u32 << attempt.min(10));
                warn!(
                    "Fetch for {} failed (attempt {}/{}): {}. Retrying in {:?}",
                    key,
                    attempt + 1,
                    policy.retries + 1,
                    e,
                    backoff
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("Fetch for {} failed after {} attempts: {}", key, attempt + 1, e);
                return Err(e);
            }
        }
    }
}

/// A consumer's registration on one key. Dropping it releases the key.
pub struct QuerySubscription {
    cache: QueryCache,
    key: CacheKey,
    fetcher: Fetcher,
    policy: RetryPolicy,
    stale_time: Duration,
    gc_time: Duration,
    registered: bool,
}

impl fmt::Debug for QuerySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("key", &self.key)
            .field("registered", &self.registered)
            .finish()
    }
}

impl QuerySubscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> QueryState {
        self.cache.state(&self.key)
    }

    /// Wait for the running fetch, if any, then report the state.
    pub async fn settled(&self) -> QueryState {
        if let Some(running) = self.cache.in_flight(&self.key) {
            let _ = running.await;
        }
        self.state()
    }

    /// Fetch now, joining a running fetch when there is one.
    pub async fn refetch(&self) -> QueryState {
        if self.key.is_absent() {
            return QueryState::default();
        }
        let running = self.cache.ensure_fetch(
            &self.key,
            &self.fetcher,
            self.policy,
            self.stale_time,
            self.gc_time,
        );
        let _ = running.await;
        self.state()
    }
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        if self.registered {
            self.cache.release(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ResourceKind;
    use crate::persist::{MemorySnapshotStore, PersistenceBridge};
    use futures_util::future::join_all;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache() -> QueryCache {
        QueryCache::new(&CacheConfig::default(), None)
    }

    fn league_key() -> CacheKey {
        CacheKey::derive(ResourceKind::League, Some("L1"), None)
    }

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        value: Value,
    ) -> impl Fn() -> BoxFuture<'static, Result<Value, Error>> + Send + Sync + 'static {
        let calls = calls.clone();
        move || {
            let calls = calls.clone();
            let value = value.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(50)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_subscribers_share_one_fetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let subs: Vec<_> = (0..5)
            .map(|_| {
                cache.subscribe(
                    league_key(),
                    counting_fetcher(&calls, json!(["F1", "F2"])),
                    QueryOptions::default(),
                )
            })
            .collect();

        assert!(subs[0].state().is_loading);
        let states = join_all(subs.iter().map(|s| s.settled())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = states[0].data.clone().unwrap();
        for state in &states {
            assert!(Arc::ptr_eq(&first, state.data.as_ref().unwrap()));
            assert!(!state.is_loading);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_not_refetched() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set(league_key(), json!(["cached"]));

        let sub = cache.subscribe(
            league_key(),
            counting_fetcher(&calls, json!(["new"])),
            QueryOptions::default(),
        );
        let state = sub.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*state.data.unwrap(), json!(["cached"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_data_served_while_refetching() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache.set(league_key(), json!(["old"]));
        tokio::time::advance(Duration::from_secs(301)).await;

        let sub = cache.subscribe(
            league_key(),
            counting_fetcher(&calls, json!(["new"])),
            QueryOptions::default(),
        );
        let during = sub.state();
        assert!(during.is_fetching);
        assert!(during.is_stale);
        assert!(!during.is_loading);
        assert_eq!(*during.data.unwrap(), json!(["old"]));

        let after = sub.settled().await;
        assert_eq!(*after.data.unwrap(), json!(["new"]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let sub = cache.subscribe(
            league_key(),
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Http("connection reset".into()))
                    } else {
                        Ok(json!(["F1"]))
                    }
                }
            },
            QueryOptions::default(),
        );
        let state = sub.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(state.error.is_none());
        assert_eq!(*state.data.unwrap(), json!(["F1"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_keep_previous_value() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        cache.set(league_key(), json!(["previous"]));
        cache.invalidate(&league_key());

        let sub = cache.subscribe(
            league_key(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<Value, _>(Error::Api {
                        status: 503,
                        message: "upstream down".into(),
                    })
                }
            },
            QueryOptions::default(),
        );
        let state = sub.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*state.data.unwrap(), json!(["previous"]));
        let message = state.error.unwrap();
        assert!(!message.contains("upstream down"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_entry_evicted_after_gc_time() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::default().with_gc_time(Duration::from_secs(60));

        let sub = cache.subscribe(league_key(), counting_fetcher(&calls, json!([])), opts.clone());
        sub.settled().await;
        drop(sub);

        sleep(Duration::from_secs(30)).await;
        let again = cache.subscribe(league_key(), counting_fetcher(&calls, json!([])), opts);
        sleep(Duration::from_secs(45)).await;
        assert!(cache.get(&league_key()).is_some());

        drop(again);
        sleep(Duration::from_secs(61)).await;
        assert!(cache.get(&league_key()).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_key_never_fetches() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::derive(ResourceKind::League, None, None);

        let sub = cache.subscribe(key, counting_fetcher(&calls, json!([])), QueryOptions::default());
        let state = sub.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(state.data.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_data_can_skip_fetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::default().with_initial_data(json!(["seed"]), true);

        let sub = cache.subscribe(league_key(), counting_fetcher(&calls, json!(["net"])), opts);
        let state = sub.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*state.data.unwrap(), json!(["seed"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_subscription_only_fetches_on_refetch() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let opts = QueryOptions::default().disabled();

        let sub = cache.subscribe(league_key(), counting_fetcher(&calls, json!([1])), opts);
        assert!(sub.settled().await.data.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let state = sub.refetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*state.data.unwrap(), json!([1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_fetch_persists_allowed_keys_only() {
        let store = Arc::new(MemorySnapshotStore::new());
        let bridge = Arc::new(PersistenceBridge::new(
            Box::new(store.clone()),
            Duration::from_secs(3600),
        ));
        let cache = QueryCache::new(&CacheConfig::default(), Some(bridge.clone()));
        let calls = Arc::new(AtomicUsize::new(0));

        let league = cache.subscribe(league_key(), counting_fetcher(&calls, json!([])), QueryOptions::default());
        let fixture_key = CacheKey::derive(ResourceKind::Fixture, Some("F1"), None);
        let fixture = cache.subscribe(fixture_key, counting_fetcher(&calls, json!({})), QueryOptions::default());
        league.settled().await;
        fixture.settled().await;
        assert_eq!(bridge.flush().await, 1);

        assert!(store.contains("league:L1:all"));
        assert!(!store.contains("fixture:F1:all"));
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_as_decodes_typed_value() {
        let cache = cache();
        cache.set(league_key(), json!([{ "id": "F1", "date": "2025-06-01" }]));
        let fixtures: Vec<common::Fixture> = cache.state(&league_key()).data_as().unwrap();
        assert_eq!(fixtures[0].id, "F1");

        let wrong: Option<String> = cache.state(&league_key()).data_as();
        assert!(wrong.is_none());
    }
}
