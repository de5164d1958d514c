use std::path::PathBuf;

use cardex_core::{MinimumResolution, ServiceOptions, StorePaths};
use serde::{Deserialize, Deserializer};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub tmdb: TmdbSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

impl Config {
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            retry_threshold: self.tmdb.retry_threshold,
            minimum_resolution: self.tmdb.minimum_resolution,
            language: self.tmdb.language.clone(),
        }
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(&self.store.dir)
    }
}

/// Provider credential and lookup tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TmdbSettings {
    /// API key for TheMovieDB. Required; there is no usable default.
    #[serde(default)]
    pub api_key: String,

    /// Failed requests beyond this count blacklist an entry permanently.
    #[serde(default = "default_retry_threshold")]
    pub retry_threshold: u32,

    /// Minimum acceptable source image dimensions, e.g. `800x400`.
    #[serde(default = "MinimumResolution::unrestricted", deserialize_with = "de_resolution")]
    pub minimum_resolution: MinimumResolution,

    /// Language for translated episode titles.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for TmdbSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            retry_threshold: default_retry_threshold(),
            minimum_resolution: MinimumResolution::unrestricted(),
            language: default_language(),
        }
    }
}

/// Where the identifier map and blacklist live.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_retry_threshold() -> u32 {
    cardex_core::DEFAULT_RETRY_THRESHOLD
}

fn default_language() -> String {
    "en-US".to_owned()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".cardex")
}

fn de_resolution<'de, D>(deserializer: D) -> Result<MinimumResolution, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
