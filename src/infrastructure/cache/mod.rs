//! Cache tiers
//!
//! - `BoundedLruCache`: hot in-process results, LRU eviction, no expiry
//! - `TtlCache`: trained model handles, fixed lifetime from insertion
//! - `FileCache`: JSON documents on disk for the standalone heuristic predictors
//! - `PredictionCache`: fingerprint-keyed results over the LRU tier

pub mod file_cache;
pub mod lru_cache;
pub mod prediction_cache;
pub mod ttl_cache;

pub use file_cache::FileCache;
pub use lru_cache::BoundedLruCache;
pub use prediction_cache::{CachedPrediction, PredictionCache};
pub use ttl_cache::TtlCache;
