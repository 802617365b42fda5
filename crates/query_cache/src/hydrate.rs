//! One-shot injection of server-provided payloads.
//!
//! A host page may ship navigation data alongside its markup. Each
//! payload is copied into the cache, written to storage, and then never
//! injected again for the lifetime of the injector.

use common::{Fixture, LeagueWithTeams};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::cache::QueryCache;
use crate::keys::{CacheKey, ResourceKind};

/// Payloads a host may hand over at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationPayloads {
    #[serde(default)]
    pub all_leagues_with_teams: Option<Vec<LeagueWithTeams>>,
    #[serde(default)]
    pub hot_fixtures: Option<Vec<Fixture>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSlot {
    AllLeaguesWithTeams,
    HotFixtures,
}

impl PayloadSlot {
    pub const ALL: [PayloadSlot; 2] = [PayloadSlot::AllLeaguesWithTeams, PayloadSlot::HotFixtures];

    pub fn key(self) -> CacheKey {
        match self {
            PayloadSlot::AllLeaguesWithTeams => CacheKey::singleton(ResourceKind::LeaguesWithTeams),
            PayloadSlot::HotFixtures => CacheKey::singleton(ResourceKind::HotFixtures),
        }
    }
}

impl HydrationPayloads {
    /// JSON for a slot, or `None` when the payload is missing or empty.
    fn value_for(&self, slot: PayloadSlot) -> Option<serde_json::Result<Value>> {
        match slot {
            PayloadSlot::AllLeaguesWithTeams => self
                .all_leagues_with_teams
                .as_ref()
                .filter(|leagues| !leagues.is_empty())
                .map(serde_json::to_value),
            PayloadSlot::HotFixtures => self
                .hot_fixtures
                .as_ref()
                .filter(|fixtures| !fixtures.is_empty())
                .map(serde_json::to_value),
        }
    }
}

/// Tracks which payloads have been injected.
#[derive(Debug, Default)]
pub struct HydrationInjector {
    leagues_injected: AtomicBool,
    hot_injected: AtomicBool,
}

impl HydrationInjector {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, slot: PayloadSlot) -> &AtomicBool {
        match slot {
            PayloadSlot::AllLeaguesWithTeams => &self.leagues_injected,
            PayloadSlot::HotFixtures => &self.hot_injected,
        }
    }

    pub fn is_injected(&self, slot: PayloadSlot) -> bool {
        self.flag(slot).load(Ordering::Acquire)
    }

    /// Inject every non-empty payload not injected before. Returns how
    /// many slots were written.
    pub fn inject(&self, cache: &QueryCache, payloads: &HydrationPayloads) -> usize {
        let mut injected = 0;
        for slot in PayloadSlot::ALL {
            let value = match payloads.value_for(slot) {
                None => continue,
                Some(Ok(value)) => value,
                Some(Err(e)) => {
                    warn!("Skipping {:?} payload: {}", slot, e);
                    continue;
                }
            };
            // Claim the slot first so concurrent callers cannot both write.
            if self
                .flag(slot)
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }

            let key = slot.key();
            cache.set(key.clone(), value.clone());
            if let Some(bridge) = cache.persistence() {
                bridge.persist(&key, &value);
            }
            debug!("Hydrated {}", key);
            injected += 1;
        }
        injected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{MemorySnapshotStore, PersistenceBridge};
    use common::config::CacheConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn payloads() -> HydrationPayloads {
        serde_json::from_value(serde_json::json!({
            "allLeaguesWithTeams": [{ "id": "L1", "slug": "premier-league", "teams": [] }],
            "hotFixtures": [{ "id": "F1" }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_injection_happens_once() {
        let store = Arc::new(MemorySnapshotStore::new());
        let bridge = Arc::new(PersistenceBridge::new(
            Box::new(store.clone()),
            Duration::from_secs(3600),
        ));
        let cache = QueryCache::new(&CacheConfig::default(), Some(bridge));
        let injector = HydrationInjector::new();

        assert_eq!(injector.inject(&cache, &payloads()), 2);
        assert_eq!(injector.inject(&cache, &payloads()), 0);
        assert_eq!(injector.inject(&cache, &payloads()), 0);

        assert_eq!(store.writes(), 2);
        assert!(store.contains("hot-fixtures:all"));
        assert!(cache.get(&PayloadSlot::AllLeaguesWithTeams.key()).is_some());
        assert!(injector.is_injected(PayloadSlot::HotFixtures));
    }

    #[tokio::test]
    async fn test_empty_payload_leaves_slot_open() {
        let cache = QueryCache::new(&CacheConfig::default(), None);
        let injector = HydrationInjector::new();
        let empty = HydrationPayloads {
            all_leagues_with_teams: Some(Vec::new()),
            hot_fixtures: None,
        };

        assert_eq!(injector.inject(&cache, &empty), 0);
        assert!(!injector.is_injected(PayloadSlot::AllLeaguesWithTeams));
        assert!(cache.is_empty());

        assert_eq!(injector.inject(&cache, &payloads()), 2);
    }
}
