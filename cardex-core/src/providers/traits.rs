use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;

use crate::error::Result;
use crate::types::{EpisodeIndex, TmdbId, TvdbId};

/// Title + first-air-year search results.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub total_results: u32,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: TmdbId,
    pub name: Option<String>,
}

/// Cross-reference lookup results for an external (TVDB) identifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindResponse {
    #[serde(default)]
    pub tv_results: Vec<FoundSeries>,
    #[serde(default)]
    pub tv_episode_results: Vec<FoundEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoundSeries {
    pub id: TmdbId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoundEpisode {
    pub show_id: TmdbId,
    pub season_number: u32,
    pub episode_number: u32,
}

impl FoundEpisode {
    pub fn index(&self) -> EpisodeIndex {
        EpisodeIndex {
            season: self.season_number,
            episode: self.episode_number,
        }
    }
}

/// Episode as returned by the season and episode detail endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeRecord {
    pub name: String,
    pub season_number: u32,
    pub episode_number: u32,
}

impl EpisodeRecord {
    pub fn index(&self) -> EpisodeIndex {
        EpisodeIndex {
            season: self.season_number,
            episode: self.episode_number,
        }
    }
}

/// One episode still candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageRecord {
    pub file_path: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub vote_average: f32,
}

/// One series logo candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct LogoRecord {
    pub file_path: String,
    pub width: u32,
    pub height: u32,
    pub iso_639_1: Option<String>,
}

/// The provider endpoints the engine consumes.
///
/// `Ok(None)` (or an empty list) is the provider's ordinary "no such
/// season/episode/asset" answer; `Err` is reserved for transport,
/// credential, and schema failures.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TmdbQuerier: Send + Sync {
    /// Search series by name and first-air year.
    async fn search_series(&self, name: &str, year: u16) -> Result<SearchResponse>;

    /// Cross-reference lookup by TVDB identifier.
    async fn find_by_external_id(&self, id: TvdbId) -> Result<FindResponse>;

    /// Episode detail by direct season/episode index.
    async fn episode_detail(
        &self,
        series: TmdbId,
        season: u32,
        episode: u32,
    ) -> Result<Option<EpisodeRecord>>;

    /// Episode detail with translated fields for the given language.
    async fn localized_episode_detail(
        &self,
        series: TmdbId,
        index: EpisodeIndex,
        language: &str,
    ) -> Result<Option<EpisodeRecord>>;

    /// Full episode list of one season; `None` if the season does not exist.
    async fn season_episodes(
        &self,
        series: TmdbId,
        season: u32,
    ) -> Result<Option<Vec<EpisodeRecord>>>;

    /// Still images for one episode.
    async fn episode_stills(
        &self,
        series: TmdbId,
        index: EpisodeIndex,
    ) -> Result<Vec<ImageRecord>>;

    /// Logo images for one series.
    async fn series_logos(&self, series: TmdbId) -> Result<Vec<LogoRecord>>;

    /// Raw byte fetch, used for image downloads.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}
