//! Local caching for API responses.
//!
//! This module provides `TimedCache`, a read-through cache with a per-call
//! TTL and explicit invalidation, plus the storage media it can sit on:
//! - `FileStore`: one JSON file per key, survives restarts
//! - `MemoryStore`: in-process map
//!
//! Time comes from an injectable `Clock` so freshness can be tested without
//! sleeping.

pub mod clock;
pub mod store;
pub mod timed;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, StoreResult};
pub use timed::{CacheEntry, TimedCache};
