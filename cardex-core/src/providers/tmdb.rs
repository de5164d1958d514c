use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::traits::{
    EpisodeRecord, FindResponse, ImageRecord, LogoRecord, SearchResponse, TmdbQuerier,
};
use crate::error::{Result, TmdbError};
use crate::types::{EpisodeIndex, TmdbId, TvdbId};

/// Base URL for sending API requests to TheMovieDB.
pub const API_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Base URL for image assets.
pub const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

#[derive(Debug, serde::Deserialize)]
struct StillsResponse {
    stills: Vec<ImageRecord>,
}

#[derive(Debug, serde::Deserialize)]
struct SeriesImagesResponse {
    #[serde(default)]
    logos: Vec<LogoRecord>,
}

#[derive(Debug, serde::Deserialize)]
struct SeasonResponse {
    episodes: Vec<EpisodeRecord>,
}

/// HTTP client for TheMovieDB.
pub struct TmdbClient {
    api_key: String,
    client: Client,
}

impl fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmdbClient").finish_non_exhaustive()
    }
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Startup credential check. An invalid key is fatal to every operation
    /// this client can perform, so callers should halt on
    /// [`TmdbError::InvalidApiKey`] here rather than degrade per-call.
    pub async fn verify_key(&self) -> Result<()> {
        let url = format!("{API_BASE_URL}/configuration");
        self.get_json::<serde_json::Value>(&url, &[]).await?;
        Ok(())
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<reqwest::Response> {
        debug!(url, "TMDb request");
        let response = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(TmdbError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(TmdbError::RateLimited),
            _ => Ok(response),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.get(url, params).await?;
        if !response.status().is_success() {
            return Err(TmdbError::Api(format!(
                "TMDb returned status {} for {url}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TmdbError::Malformed(e.to_string()))
    }

    /// Like [`Self::get_json`] but treating 404 as the domain's ordinary
    /// not-found answer (TMDb pairs it with a `{"success": false}` body).
    async fn get_json_opt<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let response = self.get(url, params).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TmdbError::Api(format!(
                "TMDb returned status {} for {url}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| TmdbError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl TmdbQuerier for TmdbClient {
    async fn search_series(&self, name: &str, year: u16) -> Result<SearchResponse> {
        let url = format!("{API_BASE_URL}/search/tv");
        let year = year.to_string();
        self.get_json(
            &url,
            &[
                ("query", name),
                ("first_air_date_year", year.as_str()),
                ("include_adult", "false"),
            ],
        )
        .await
    }

    async fn find_by_external_id(&self, id: TvdbId) -> Result<FindResponse> {
        let url = format!("{API_BASE_URL}/find/{id}");
        self.get_json(&url, &[("external_source", "tvdb_id")]).await
    }

    async fn episode_detail(
        &self,
        series: TmdbId,
        season: u32,
        episode: u32,
    ) -> Result<Option<EpisodeRecord>> {
        let url = format!("{API_BASE_URL}/tv/{series}/season/{season}/episode/{episode}");
        self.get_json_opt(&url, &[]).await
    }

    async fn localized_episode_detail(
        &self,
        series: TmdbId,
        index: EpisodeIndex,
        language: &str,
    ) -> Result<Option<EpisodeRecord>> {
        let url = format!(
            "{API_BASE_URL}/tv/{series}/season/{}/episode/{}",
            index.season, index.episode
        );
        self.get_json_opt(&url, &[("language", language)]).await
    }

    async fn season_episodes(
        &self,
        series: TmdbId,
        season: u32,
    ) -> Result<Option<Vec<EpisodeRecord>>> {
        let url = format!("{API_BASE_URL}/tv/{series}/season/{season}");
        let season: Option<SeasonResponse> = self.get_json_opt(&url, &[]).await?;
        Ok(season.map(|s| s.episodes))
    }

    async fn episode_stills(
        &self,
        series: TmdbId,
        index: EpisodeIndex,
    ) -> Result<Vec<ImageRecord>> {
        let url = format!(
            "{API_BASE_URL}/tv/{series}/season/{}/episode/{}/images",
            index.season, index.episode
        );
        let stills: Option<StillsResponse> = self.get_json_opt(&url, &[]).await?;
        Ok(stills.map(|s| s.stills).unwrap_or_default())
    }

    async fn series_logos(&self, series: TmdbId) -> Result<Vec<LogoRecord>> {
        let url = format!("{API_BASE_URL}/tv/{series}/images");
        let images: Option<SeriesImagesResponse> = self.get_json_opt(&url, &[]).await?;
        Ok(images.map(|i| i.logos).unwrap_or_default())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TmdbError::Api(format!(
                "image fetch returned status {} for {url}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Full asset URL for a provider-relative `file_path`, at original size.
pub(crate) fn image_url(file_path: &str) -> String {
    format!("{IMAGE_BASE_URL}/original{file_path}")
}
