//! Client-side query cache for gateway data.
//!
//! Keys come from [`keys`], fetching and coalescing live in [`cache`],
//! durable snapshots in [`persist`] and startup injection in [`hydrate`].

pub mod cache;
pub mod hydrate;
pub mod keys;
pub mod persist;

pub use cache::{FetchOutcome, QueryCache, QueryOptions, QueryState, QuerySubscription};
pub use hydrate::{HydrationInjector, HydrationPayloads, PayloadSlot};
pub use keys::{CacheKey, ResourceKind};
pub use persist::{
    FileSnapshotStore, MemorySnapshotStore, PersistenceBridge, RestoreReport, SnapshotStore,
};
