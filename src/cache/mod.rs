//! Cache module for storing API responses to disk
//!
//! Responses are keyed by a hash of the request identity and kept as one JSON
//! file per key. Each entry's category (the endpoint name) selects how long it
//! stays fresh; stale and unreadable entries read as misses, never as errors.

mod key;
mod policy;
mod store;

pub use key::{derive_category, derive_key, strip_scheme, DEFAULT_CATEGORY};
pub use policy::{hours, ExpirationPolicy};
pub use store::{default_cache_dir, CacheEntry, CacheError, CacheStats, CacheStore};
