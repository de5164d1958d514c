use std::fmt;

use cardex_core::select::supports_generic_titles;
use thiserror::Error;
use tracing::warn;

use crate::models::Config;

/// Configuration states no operation could survive. These halt startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigGuardRailError {
    #[error("tmdb.api_key is empty; no provider operation can succeed without it")]
    MissingApiKey,

    #[error("tmdb.retry_threshold must be at least 1")]
    ZeroRetryThreshold,
}

/// Configuration states that degrade behavior but are survivable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// No minimum resolution configured; every candidate image passes.
    NoMinimumResolution,
    /// Generic-title detection has no template for this language, so
    /// placeholder translations will be accepted as real titles.
    UntranslatableLanguage(String),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::NoMinimumResolution => {
                write!(f, "no minimum resolution configured; all image candidates pass")
            }
            ConfigWarning::UntranslatableLanguage(code) => write!(
                f,
                "no generic-title template for language {code:?}; placeholder translations will not be filtered"
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigWarnings(Vec<ConfigWarning>);

impl ConfigWarnings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.0.iter()
    }

    pub fn log_all(&self) {
        for warning in &self.0 {
            warn!("{warning}");
        }
    }
}

/// Validate a loaded configuration: guard-rail violations are returned as
/// errors, survivable oddities as warnings.
pub fn validate(config: &Config) -> Result<ConfigWarnings, Vec<ConfigGuardRailError>> {
    let mut errors = Vec::new();
    if config.tmdb.api_key.trim().is_empty() {
        errors.push(ConfigGuardRailError::MissingApiKey);
    }
    if config.tmdb.retry_threshold == 0 {
        errors.push(ConfigGuardRailError::ZeroRetryThreshold);
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut warnings = Vec::new();
    if config.tmdb.minimum_resolution == cardex_core::MinimumResolution::unrestricted() {
        warnings.push(ConfigWarning::NoMinimumResolution);
    }
    let prefix = config
        .tmdb
        .language
        .split(['-', '_'])
        .next()
        .unwrap_or(config.tmdb.language.as_str());
    if !supports_generic_titles(prefix) {
        warnings.push(ConfigWarning::UntranslatableLanguage(
            config.tmdb.language.clone(),
        ));
    }

    Ok(ConfigWarnings(warnings))
}
