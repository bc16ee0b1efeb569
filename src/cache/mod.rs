// Cache module for local filesystem caching.
// Stores GitHub API responses on disk with a time-to-live.

pub mod paths;
pub mod store;

pub use paths::{encode_key, entry_path};
pub use store::{CachedData, DEFAULT_TTL, TtlCache};
