use std::collections::BTreeMap;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::{Result, StoreError, TmdbError};
use crate::persistence::StoreFile;
use crate::providers::TmdbQuerier;
use crate::types::{SeriesInfo, TmdbId, TvdbId};

/// Persisted mapping from series natural keys to TMDb IDs.
///
/// Two independent mappings: full name (`Show (2020)`) and TVDB ID, both to
/// the TMDb ID. Entries are append-only; a key that already has a mapping is
/// never overwritten by a later resolution of the same key.
#[derive(Debug)]
pub struct IdMap {
    file: StoreFile,
    by_name: BTreeMap<String, TmdbId>,
    by_tvdb: BTreeMap<String, TmdbId>,
}

impl IdMap {
    /// Load from the store; missing sections are recreated empty and entries
    /// without a numeric ID are dropped.
    pub fn load(file: StoreFile) -> Self {
        let (by_name, by_tvdb) = match file.load() {
            Some(value) => Self::repair(value),
            None => Default::default(),
        };
        Self {
            file,
            by_name,
            by_tvdb,
        }
    }

    fn repair(value: Value) -> (BTreeMap<String, TmdbId>, BTreeMap<String, TmdbId>) {
        let mut by_name = BTreeMap::new();
        let mut by_tvdb = BTreeMap::new();
        let Value::Object(root) = value else {
            return (by_name, by_tvdb);
        };

        for (section, target) in [("name", &mut by_name), ("id", &mut by_tvdb)] {
            let Some(Value::Object(entries)) = root.get(section) else {
                continue;
            };
            for (key, raw) in entries {
                match raw.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    Some(id) => {
                        target.insert(key.clone(), TmdbId::new(id));
                    }
                    None => {
                        debug!(section, key, "dropped malformed ID map entry");
                    }
                }
            }
        }

        (by_name, by_tvdb)
    }

    pub fn get_by_name(&self, full_name: &str) -> Option<TmdbId> {
        self.by_name.get(full_name).copied()
    }

    pub fn get_by_tvdb(&self, id: TvdbId) -> Option<TmdbId> {
        self.by_tvdb.get(&id.to_string()).copied()
    }

    /// Record the resolved ID for a series under its full name and, when
    /// known, its TVDB ID. Existing mappings win; only new keys are written.
    pub fn record(&mut self, series: &SeriesInfo) -> std::result::Result<(), StoreError> {
        let Some(id) = series.tmdb_id() else {
            return Ok(());
        };

        let mut changed = false;
        self.by_name.entry(series.full_name()).or_insert_with(|| {
            changed = true;
            id
        });
        if let Some(tvdb) = series.tvdb_id {
            self.by_tvdb.entry(tvdb.to_string()).or_insert_with(|| {
                changed = true;
                id
            });
        }

        if changed { self.flush() } else { Ok(()) }
    }

    /// Operator override: pin a full name to an ID, replacing any existing
    /// mapping. Resolution-time inserts never do this.
    pub fn pin_name(&mut self, full_name: &str, id: TmdbId) -> std::result::Result<(), StoreError> {
        self.by_name.insert(full_name.to_owned(), id);
        self.flush()
    }

    pub fn names(&self) -> impl Iterator<Item = (&str, TmdbId)> {
        self.by_name.iter().map(|(name, id)| (name.as_str(), *id))
    }

    fn flush(&self) -> std::result::Result<(), StoreError> {
        let document = serde_json::json!({
            "name": self.by_name,
            "id": self.by_tvdb,
        });
        self.file.save(&document)
    }
}

/// Resolve the TMDb ID for a series.
///
/// Attempt order: TVDB mapping, name mapping (both without network), then
/// the external-ID lookup (adopted only on exactly one result), then title +
/// year search taking the first result unconditionally. A search with zero
/// results is a resolution failure but is *not* blacklisted anywhere;
/// repeated failed resolutions re-query on every call.
///
/// The map lock is only held for lookups and inserts, never across a
/// provider query; callers serialize concurrent resolution of the same
/// series themselves.
pub async fn resolve_series_id(
    querier: &dyn TmdbQuerier,
    id_map: &Mutex<IdMap>,
    series: &mut SeriesInfo,
) -> Result<Option<TmdbId>> {
    {
        let map = id_map.lock().await;
        if let Some(tvdb) = series.tvdb_id
            && let Some(id) = map.get_by_tvdb(tvdb)
        {
            series.set_tmdb_id(id);
            return Ok(Some(id));
        }
        if let Some(id) = map.get_by_name(&series.full_name()) {
            series.set_tmdb_id(id);
            return Ok(Some(id));
        }
    }

    if let Some(tvdb) = series.tvdb_id {
        let found = querier.find_by_external_id(tvdb).await?;
        match found.tv_results.as_slice() {
            [] => {
                debug!(series = %series, %tvdb, "TMDb returned no series for TVDB ID");
            }
            [only] => {
                series.set_tmdb_id(only.id);
                id_map.lock().await.record(series)?;
                return Ok(Some(only.id));
            }
            _ => {
                warn!(series = %series, %tvdb, "TMDb returned more than one series for TVDB ID");
            }
        }
    }

    let results = querier.search_series(&series.name, series.year).await?;
    if results.total_results == 0 {
        error!(series = %series, "TMDb returned no results");
        return Ok(None);
    }
    let Some(first) = results.results.first() else {
        return Err(TmdbError::Malformed(
            "positive total_results with an empty results page".into(),
        ));
    };

    series.set_tmdb_id(first.id);
    id_map.lock().await.record(series)?;
    Ok(Some(first.id))
}
