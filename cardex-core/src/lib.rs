//! Core library for cardex.
//!
//! Resolves the canonical TMDb identity of a television series and its
//! episodes, and selects the best still, logo, or translated title for each
//! episode. Network traffic is minimized through a persistent identifier map
//! and a debounced negative cache with a permanent-blacklist threshold, both
//! durable across restarts and self-healing on load.

pub mod blacklist;
mod deadline;
pub mod error;
pub mod matcher;
pub mod persistence;
pub mod providers;
pub mod resolver;
pub mod select;
pub mod service;
pub mod types;

pub use blacklist::{BlacklistCache, BlacklistEntry, DEFAULT_RETRY_THRESHOLD, QueryKind};
pub use deadline::Deadline;
pub use error::{Result, StoreError, TmdbError};
pub use persistence::{StoreFile, StorePaths};
pub use providers::{TmdbClient, TmdbQuerier};
pub use resolver::IdMap;
pub use select::MinimumResolution;
pub use service::{ServiceOptions, TmdbService};
pub use types::{EpisodeIndex, EpisodeInfo, SeriesInfo, Title, TmdbId, TvdbId};
