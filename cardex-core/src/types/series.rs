use std::fmt;

use serde::{Deserialize, Serialize};

/// TMDb's canonical numeric identifier for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TmdbId(u32);

impl TmdbId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TmdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cross-provider identifier from TheTVDB, usable to short-circuit
/// name/year search via TMDb's external-ID lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TvdbId(u32);

impl TvdbId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TvdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural identity of a series: name plus premiere year, optionally
/// enriched with a TVDB ID, and carrying the resolved TMDb ID once known.
///
/// Once a TMDb ID is set it is never cleared; a later, more authoritative
/// lookup (e.g. an external-ID match) may overwrite it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInfo {
    pub name: String,
    pub year: u16,
    pub tvdb_id: Option<TvdbId>,
    tmdb_id: Option<TmdbId>,
}

impl SeriesInfo {
    pub fn new(name: impl Into<String>, year: u16) -> Self {
        Self {
            name: name.into(),
            year,
            tvdb_id: None,
            tmdb_id: None,
        }
    }

    pub fn with_tvdb_id(mut self, id: TvdbId) -> Self {
        self.tvdb_id = Some(id);
        self
    }

    /// Full name as used for map and blacklist keys, e.g. `Show (2020)`.
    pub fn full_name(&self) -> String {
        format!("{} ({})", self.name, self.year)
    }

    pub fn tmdb_id(&self) -> Option<TmdbId> {
        self.tmdb_id
    }

    pub fn set_tmdb_id(&mut self, id: TmdbId) {
        self.tmdb_id = Some(id);
    }
}

impl fmt::Display for SeriesInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.year)
    }
}
