use std::fmt;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::blacklist::{BlacklistCache, DEFAULT_RETRY_THRESHOLD, QueryKind};
use crate::deadline::Deadline;
use crate::error::{Result, TmdbError};
use crate::matcher;
use crate::persistence::StorePaths;
use crate::providers::{TmdbQuerier, image_url};
use crate::resolver::{self, IdMap};
use crate::select::{self, MinimumResolution};
use crate::types::{EpisodeInfo, SeriesInfo, TmdbId};

/// Tunables for the query service.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Failures beyond this count blacklist an entry permanently.
    pub retry_threshold: u32,
    /// Source images below this resolution are never selected.
    pub minimum_resolution: MinimumResolution,
    /// Language for translated episode titles, e.g. `en-US`.
    pub language: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            retry_threshold: DEFAULT_RETRY_THRESHOLD,
            minimum_resolution: MinimumResolution::unrestricted(),
            language: "en-US".to_owned(),
        }
    }
}

/// The query service: composes the blacklist gate, ID resolver, episode
/// matcher, and asset selector into the three public lookups.
///
/// Each lookup follows the same shape: blacklist check (no network), series
/// and episode resolution, the concrete provider query, selection, and a
/// blacklist update when the chain ends without a result. Transport errors
/// propagate to the caller and never touch the blacklist; only the
/// provider's definitive "not found" answers (and malformed payloads,
/// treated as not found) are cached negatively.
pub struct TmdbService {
    querier: Arc<dyn TmdbQuerier>,
    options: ServiceOptions,
    id_map: Mutex<IdMap>,
    blacklist: Mutex<BlacklistCache>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl fmt::Debug for TmdbService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbService").finish_non_exhaustive()
    }
}

fn episode_key(series: &SeriesInfo, episode: &EpisodeInfo) -> String {
    format!("{}-{}", series.full_name(), episode.key())
}

fn language_prefix(language: &str) -> &str {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or(language)
}

impl TmdbService {
    pub fn new(querier: Arc<dyn TmdbQuerier>, store: &StorePaths, options: ServiceOptions) -> Self {
        Self {
            querier,
            options,
            id_map: Mutex::new(IdMap::load(store.id_map())),
            blacklist: Mutex::new(BlacklistCache::load(store.blacklist())),
            inflight: DashMap::new(),
        }
    }

    /// URL of the best source image for an episode, or `None` when the
    /// provider has nothing usable.
    pub async fn get_source_image(
        &self,
        series: &mut SeriesInfo,
        episode: &EpisodeInfo,
        title_match: bool,
        deadline: Deadline,
    ) -> Result<Option<String>> {
        let key = episode_key(series, episode);
        if self.is_blacklisted(QueryKind::Image, &key).await {
            debug!(series = %series, episode = %episode, "skipping blacklisted image query");
            return Ok(None);
        }

        let outcome = self
            .locate_source_image(series, episode, title_match, deadline)
            .await;
        self.finish(QueryKind::Image, &key, outcome).await
    }

    async fn locate_source_image(
        &self,
        series: &mut SeriesInfo,
        episode: &EpisodeInfo,
        title_match: bool,
        deadline: Deadline,
    ) -> Result<Option<String>> {
        deadline.check()?;
        // A failed series resolution is tolerated here: the matcher's
        // first tier can still locate the episode by its own TVDB ID.
        self.resolve_serialized(series).await?;

        deadline.check()?;
        let Some(index) =
            matcher::find_episode(self.querier.as_ref(), series, episode, title_match, deadline)
                .await?
        else {
            debug!(series = %series, episode = %episode, "TMDb has no matching episode");
            return Ok(None);
        };
        let Some(series_id) = series.tmdb_id() else {
            return Ok(None);
        };

        deadline.check()?;
        let stills = self.querier.episode_stills(series_id, index).await?;
        if stills.is_empty() {
            debug!(series = %series, episode = %episode, "TMDb has no images");
            return Ok(None);
        }

        match select::pick_best_image(&stills, self.options.minimum_resolution) {
            Some(best) => Ok(Some(image_url(&best.file_path))),
            None => {
                debug!(
                    series = %series,
                    episode = %episode,
                    "TMDb images do not meet the dimensional requirements"
                );
                Ok(None)
            }
        }
    }

    /// Translated episode title in the configured language, or `None` when
    /// the provider only has the generic placeholder.
    pub async fn get_episode_title(
        &self,
        series: &mut SeriesInfo,
        episode: &EpisodeInfo,
        deadline: Deadline,
    ) -> Result<Option<String>> {
        let key = episode_key(series, episode);
        if self.is_blacklisted(QueryKind::Title, &key).await {
            debug!(series = %series, episode = %episode, "skipping blacklisted title query");
            return Ok(None);
        }

        let outcome = self.locate_episode_title(series, episode, deadline).await;
        self.finish(QueryKind::Title, &key, outcome).await
    }

    async fn locate_episode_title(
        &self,
        series: &mut SeriesInfo,
        episode: &EpisodeInfo,
        deadline: Deadline,
    ) -> Result<Option<String>> {
        deadline.check()?;
        self.resolve_serialized(series).await?;

        deadline.check()?;
        let Some(index) =
            matcher::find_episode(self.querier.as_ref(), series, episode, true, deadline).await?
        else {
            return Ok(None);
        };
        let Some(series_id) = series.tmdb_id() else {
            return Ok(None);
        };

        deadline.check()?;
        let Some(detail) = self
            .querier
            .localized_episode_detail(series_id, index, &self.options.language)
            .await?
        else {
            return Ok(None);
        };

        if select::is_generic_title(
            &detail.name,
            language_prefix(&self.options.language),
            episode,
        ) {
            debug!(episode = %episode, title = %detail.name, "generic title detected");
            return Ok(None);
        }

        Ok(Some(detail.name))
    }

    /// URL of the best logo for a series, or `None` when no transparent
    /// English logo exists.
    pub async fn get_series_logo(
        &self,
        series: &mut SeriesInfo,
        deadline: Deadline,
    ) -> Result<Option<String>> {
        let key = series.full_name();
        if self.is_blacklisted(QueryKind::Logo, &key).await {
            debug!(series = %series, "skipping blacklisted logo query");
            return Ok(None);
        }

        let outcome = self.locate_series_logo(series, deadline).await;
        self.finish(QueryKind::Logo, &key, outcome).await
    }

    async fn locate_series_logo(
        &self,
        series: &mut SeriesInfo,
        deadline: Deadline,
    ) -> Result<Option<String>> {
        deadline.check()?;
        let Some(series_id) = self.resolve_serialized(series).await? else {
            return Ok(None);
        };

        deadline.check()?;
        let logos = self.querier.series_logos(series_id).await?;
        if logos.is_empty() {
            debug!(series = %series, "TMDb has no logos");
            return Ok(None);
        }

        match select::pick_best_logo(&logos) {
            Some(best) => Ok(Some(image_url(&best.file_path))),
            None => {
                debug!(series = %series, "no transparent English logo available");
                Ok(None)
            }
        }
    }

    /// Download an image URL to the destination path, creating parent
    /// directories as needed.
    pub async fn download_image(&self, url: &str, destination: &Path) -> Result<()> {
        let bytes = self.querier.fetch_bytes(url).await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| crate::error::StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(destination, bytes)
            .await
            .map_err(|source| crate::error::StoreError::Io {
                path: destination.to_path_buf(),
                source,
            })?;
        Ok(())
    }

    async fn is_blacklisted(&self, kind: QueryKind, key: &str) -> bool {
        self.blacklist
            .lock()
            .await
            .is_blacklisted(kind, key, self.options.retry_threshold)
    }

    /// Close out a lookup: record a failure for definitive misses and for
    /// malformed payloads (treated as not found), pass transport errors
    /// through untouched.
    async fn finish(
        &self,
        kind: QueryKind,
        key: &str,
        outcome: Result<Option<String>>,
    ) -> Result<Option<String>> {
        match outcome {
            Ok(Some(found)) => Ok(Some(found)),
            Ok(None) => {
                self.blacklist.lock().await.record_failure(kind, key)?;
                Ok(None)
            }
            Err(TmdbError::Malformed(message)) => {
                error!(kind = kind.as_str(), key, message, "malformed TMDb response");
                self.blacklist.lock().await.record_failure(kind, key)?;
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Serialize resolution per series so concurrent callers of the same
    /// identity share one in-flight lookup; distinct identities proceed in
    /// parallel.
    async fn resolve_serialized(&self, series: &mut SeriesInfo) -> Result<Option<TmdbId>> {
        let lock = self
            .inflight
            .entry(series.full_name())
            .or_default()
            .clone();
        let _guard = lock.lock().await;
        resolver::resolve_series_id(self.querier.as_ref(), &self.id_map, series).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        EpisodeRecord, ImageRecord, LogoRecord, MockTmdbQuerier, SearchHit, SearchResponse,
    };
    use crate::types::Title;

    fn store() -> (tempfile::TempDir, StorePaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(dir.path());
        (dir, paths)
    }

    fn search_hit(id: u32) -> SearchResponse {
        SearchResponse {
            total_results: 1,
            results: vec![SearchHit {
                id: TmdbId::new(id),
                name: Some("Show".into()),
            }],
        }
    }

    fn record(name: &str, season: u32, episode: u32) -> EpisodeRecord {
        EpisodeRecord {
            name: name.to_owned(),
            season_number: season,
            episode_number: episode,
        }
    }

    fn service(querier: MockTmdbQuerier, store: &StorePaths) -> TmdbService {
        TmdbService::new(Arc::new(querier), store, ServiceOptions::default())
    }

    #[tokio::test]
    async fn source_image_happy_path_selects_the_best_still() {
        let (_dir, paths) = store();
        let mut querier = MockTmdbQuerier::new();
        querier
            .expect_search_series()
            .times(1)
            .returning(|_, _| Ok(search_hit(7)));
        querier
            .expect_episode_detail()
            .times(1)
            .returning(|_, _, _| Ok(Some(record("Pilot", 1, 1))));
        querier.expect_episode_stills().times(1).returning(|_, _| {
            Ok(vec![
                ImageRecord {
                    file_path: "/small.jpg".into(),
                    width: 100,
                    height: 100,
                    vote_average: 9.0,
                },
                ImageRecord {
                    file_path: "/large.jpg".into(),
                    width: 1920,
                    height: 1080,
                    vote_average: 2.0,
                },
            ])
        });

        let service = service(querier, &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("Pilot"), 1, 1);

        let url = service
            .get_source_image(&mut series, &episode, true, Deadline::none())
            .await
            .unwrap();
        assert_eq!(
            url.as_deref(),
            Some("https://image.tmdb.org/t/p/original/large.jpg")
        );
    }

    #[tokio::test]
    async fn blacklisted_queries_never_reach_the_network() {
        let (_dir, paths) = store();
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("Pilot"), 1, 1);

        {
            let mut blacklist = BlacklistCache::load(paths.blacklist());
            blacklist
                .record_failure(QueryKind::Image, &episode_key(&series, &episode))
                .unwrap();
        }

        // No expectations: any provider call panics the test.
        let service = service(MockTmdbQuerier::new(), &paths);
        let url = service
            .get_source_image(&mut series, &episode, true, Deadline::none())
            .await
            .unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn episode_miss_records_a_failure_and_suppresses_the_next_call() {
        let (_dir, paths) = store();
        let mut querier = MockTmdbQuerier::new();
        querier
            .expect_search_series()
            .times(1)
            .returning(|_, _| Ok(search_hit(7)));
        querier
            .expect_episode_detail()
            .times(1)
            .returning(|_, _, _| Ok(None));
        querier
            .expect_season_episodes()
            .times(1)
            .returning(|_, _| Ok(None));

        let service = service(querier, &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("Pilot"), 0, 1);

        let first = service
            .get_source_image(&mut series, &episode, true, Deadline::none())
            .await
            .unwrap();
        assert!(first.is_none());

        // Second call is served from the blacklist; the mock would panic on
        // any further provider call beyond the declared times(1).
        let second = service
            .get_source_image(&mut series, &episode, true, Deadline::none())
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn transport_errors_propagate_without_blacklisting() {
        let (_dir, paths) = store();
        let mut querier = MockTmdbQuerier::new();
        querier
            .expect_search_series()
            .times(2)
            .returning(|_, _| Err(TmdbError::Api("boom".into())));

        let service = service(querier, &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("Pilot"), 1, 1);

        let first = service
            .get_source_image(&mut series, &episode, true, Deadline::none())
            .await;
        assert!(matches!(first, Err(TmdbError::Api(_))));

        // Not blacklisted: the second call queries again (times(2) above).
        let second = service
            .get_source_image(&mut series, &episode, true, Deadline::none())
            .await;
        assert!(matches!(second, Err(TmdbError::Api(_))));
    }

    #[tokio::test]
    async fn malformed_payload_is_cached_as_not_found() {
        let (_dir, paths) = store();
        let mut querier = MockTmdbQuerier::new();
        querier
            .expect_search_series()
            .times(1)
            .returning(|_, _| Ok(search_hit(7)));
        querier
            .expect_episode_detail()
            .times(1)
            .returning(|_, _, _| Ok(Some(record("Pilot", 1, 1))));
        querier
            .expect_episode_stills()
            .times(1)
            .returning(|_, _| Err(TmdbError::Malformed("stills missing".into())));

        let service = service(querier, &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("Pilot"), 1, 1);

        let first = service
            .get_source_image(&mut series, &episode, true, Deadline::none())
            .await
            .unwrap();
        assert!(first.is_none());

        let blacklist = BlacklistCache::load(paths.blacklist());
        assert!(blacklist.is_blacklisted(
            QueryKind::Image,
            &episode_key(&series, &episode),
            DEFAULT_RETRY_THRESHOLD
        ));
    }

    #[tokio::test]
    async fn generic_translated_title_is_rejected_and_cached() {
        let (_dir, paths) = store();
        let mut querier = MockTmdbQuerier::new();
        querier
            .expect_search_series()
            .times(1)
            .returning(|_, _| Ok(search_hit(7)));
        querier
            .expect_episode_detail()
            .times(1)
            .returning(|_, _, _| Ok(Some(record("The Heist", 1, 5))));
        querier
            .expect_localized_episode_detail()
            .withf(|_, _, language| language == "en-US")
            .times(1)
            .returning(|_, _, _| Ok(Some(record("Episode 5", 1, 5))));

        let service = service(querier, &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("The Heist"), 1, 5);

        let title = service
            .get_episode_title(&mut series, &episode, Deadline::none())
            .await
            .unwrap();
        assert!(title.is_none());

        let blacklist = BlacklistCache::load(paths.blacklist());
        assert!(blacklist.is_blacklisted(
            QueryKind::Title,
            &episode_key(&series, &episode),
            DEFAULT_RETRY_THRESHOLD
        ));
    }

    #[tokio::test]
    async fn real_translated_title_is_returned() {
        let (_dir, paths) = store();
        let mut querier = MockTmdbQuerier::new();
        querier
            .expect_search_series()
            .times(1)
            .returning(|_, _| Ok(search_hit(7)));
        querier
            .expect_episode_detail()
            .times(1)
            .returning(|_, _, _| Ok(Some(record("The Heist", 1, 5))));
        querier
            .expect_localized_episode_detail()
            .times(1)
            .returning(|_, _, _| Ok(Some(record("Der Coup", 1, 5))));

        let service = service(querier, &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("The Heist"), 1, 5);

        let title = service
            .get_episode_title(&mut series, &episode, Deadline::none())
            .await
            .unwrap();
        assert_eq!(title.as_deref(), Some("Der Coup"));
    }

    #[tokio::test]
    async fn logo_lookup_prefers_svg_and_caches_resolution_failures() {
        let (_dir, paths) = store();
        let mut querier = MockTmdbQuerier::new();
        querier
            .expect_search_series()
            .times(1)
            .returning(|_, _| Ok(search_hit(7)));
        querier.expect_series_logos().times(1).returning(|_| {
            Ok(vec![
                LogoRecord {
                    file_path: "/big.png".into(),
                    width: 2000,
                    height: 1000,
                    iso_639_1: Some("en".into()),
                },
                LogoRecord {
                    file_path: "/logo.svg".into(),
                    width: 50,
                    height: 20,
                    iso_639_1: Some("en".into()),
                },
            ])
        });

        let resolved_service = service(querier, &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let url = resolved_service
            .get_series_logo(&mut series, Deadline::none())
            .await
            .unwrap();
        assert_eq!(
            url.as_deref(),
            Some("https://image.tmdb.org/t/p/original/logo.svg")
        );

        // A series that cannot be resolved records a logo failure.
        let mut unresolvable_querier = MockTmdbQuerier::new();
        unresolvable_querier
            .expect_search_series()
            .times(1)
            .returning(|_, _| {
                Ok(SearchResponse {
                    total_results: 0,
                    results: vec![],
                })
            });
        let service = service(unresolvable_querier, &paths);
        let mut unknown = SeriesInfo::new("Unknown", 1999);
        let url = service
            .get_series_logo(&mut unknown, Deadline::none())
            .await
            .unwrap();
        assert!(url.is_none());

        let blacklist = BlacklistCache::load(paths.blacklist());
        assert!(blacklist.is_blacklisted(
            QueryKind::Logo,
            "Unknown (1999)",
            DEFAULT_RETRY_THRESHOLD
        ));
    }

    #[tokio::test]
    async fn expired_deadline_fails_before_any_query() {
        let (_dir, paths) = store();
        let service = service(MockTmdbQuerier::new(), &paths);
        let mut series = SeriesInfo::new("Show", 2020);
        let episode = EpisodeInfo::new(Title::new("Pilot"), 1, 1);

        let result = service
            .get_source_image(
                &mut series,
                &episode,
                true,
                Deadline::after(std::time::Duration::ZERO),
            )
            .await;
        assert!(matches!(result, Err(TmdbError::DeadlineExpired)));
    }
}
