//! Named cache storage
//!
//! A persistent equivalent of the platform Cache Storage API. Entries never
//! expire by age: they are overwritten by a newer response for the same
//! request, or removed together with their whole named cache.

pub mod key;
pub mod storage;

pub use key::request_key;
pub use storage::{CacheStats, CacheStore, EntrySummary, RegistrationRecord};
