//! Canonical cache keys.
//!
//! Every reader and writer of the cache derives keys here. Keys mirror
//! the backend's cache partitioning: one bucket per resource, split by
//! month OR venue, never both.

use std::fmt;

use common::FixtureFilter;
use serde::{Deserialize, Serialize};

/// Kinds of cached resources. The string form is the key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A league's fixture list.
    League,
    /// A team's fixture list.
    Team,
    /// A single fixture.
    Fixture,
    /// League details without fixtures.
    LeagueInfo,
    /// The "all leagues with teams" navigation payload.
    LeaguesWithTeams,
    /// Homepage hot fixtures.
    HotFixtures,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::League,
        ResourceKind::Team,
        ResourceKind::Fixture,
        ResourceKind::LeagueInfo,
        ResourceKind::LeaguesWithTeams,
        ResourceKind::HotFixtures,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::League => "league",
            ResourceKind::Team => "team",
            ResourceKind::Fixture => "fixture",
            ResourceKind::LeagueInfo => "league-info",
            ResourceKind::LeaguesWithTeams => "leagues-with-teams",
            ResourceKind::HotFixtures => "hot-fixtures",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == prefix)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

/// Id segment used when no resource is selected.
const ABSENT: &str = "none";

impl CacheKey {
    /// Derive the key for `(kind, id, filter)`.
    ///
    /// A missing or blank id yields the absent sentinel. Month takes
    /// precedence over venue.
    pub fn derive(kind: ResourceKind, id: Option<&str>, filter: Option<&FixtureFilter>) -> Self {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Self::absent(kind);
        };

        let normalized = filter.map(FixtureFilter::normalized).unwrap_or_default();
        match (normalized.month, normalized.venue) {
            (Some(month), _) => Self(format!("{}:{}:month:{}", kind, id, month)),
            (None, Some(venue)) => Self(format!("{}:{}:venue:{}", kind, id, venue)),
            (None, None) => Self(format!("{}:{}:all", kind, id)),
        }
    }

    /// Key for a resource with no id, like the hot fixtures list.
    pub fn singleton(kind: ResourceKind) -> Self {
        Self(format!("{}:all", kind))
    }

    /// The "no resource" sentinel for a kind.
    pub fn absent(kind: ResourceKind) -> Self {
        Self(format!("{}:{}", kind, ABSENT))
    }

    /// Rebuild a key from its string form, as stored in snapshots.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_absent(&self) -> bool {
        self.0
            .split_once(':')
            .is_some_and(|(_, rest)| rest == ABSENT)
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        let prefix = self.0.split(':').next()?;
        ResourceKind::from_prefix(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
