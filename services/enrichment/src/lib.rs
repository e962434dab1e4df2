//! Enrichment Service
//!
//! Turns raw provider listings into enriched listings:
//! - `cache`: time-bounded, concurrency-safe cache of decoded build specs
//! - `fanout`: parallel per-listing build resolution joined by a barrier,
//!   order-preserving assembly, best-effort persistence
//! - `search`: request defaults, provider query shaping and make/model matching
//!
//! # Flow
//!
//! ```text
//! listings ──► one task per listing ──► cache hit? ──yes──► spec
//!                                         │no
//!                                         ▼
//!                                   decode_build ──ok──► cache.set, spec
//!                                         │err
//!                                         ▼
//!                              embedded spec? ──yes──► spec (not cached)
//!                                         │no
//!                                         ▼
//!                                   item dropped
//!
//!          barrier (all tasks joined) ──► slots in input order
//!                 ──► MSRP valuation ──► persist each (best effort)
//! ```

pub mod cache;
pub mod fanout;
pub mod search;

pub use cache::{BuildCache, BuildCacheConfig, SweepTask};
pub use fanout::{EnrichmentError, Enricher};
pub use search::{SearchCriteria, SearchDefaults};
