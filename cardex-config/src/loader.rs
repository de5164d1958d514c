use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::Config;
use crate::validation::{self, ConfigGuardRailError, ConfigWarnings};

/// Config file consulted when no explicit path is given.
const DEFAULT_CONFIG_FILE: &str = "cardex.toml";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {key} override: {message}")]
    InvalidOverride { key: &'static str, message: String },

    #[error("configuration rejected: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    GuardRails(Vec<ConfigGuardRailError>),
}

/// A validated configuration plus the warnings found while validating it.
#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Loads configuration from a TOML file and `CARDEX_*` environment
/// overrides, then validates it.
///
/// Precedence, lowest to highest: built-in defaults, the config file, the
/// environment. A `.env` file in the working directory is folded into the
/// environment first.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        dotenvy::dotenv().ok();

        let mut config = match &self.path {
            Some(path) => Self::read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::read_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("no config file; starting from defaults");
                Config::default()
            }
        };

        apply_env_overrides(&mut config)?;

        match validation::validate(&config) {
            Ok(warnings) => Ok(ConfigLoad { config, warnings }),
            Err(errors) => Err(ConfigLoadError::GuardRails(errors)),
        }
    }

    fn read_file(path: &Path) -> Result<Config, ConfigLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigLoadError> {
    if let Ok(value) = std::env::var("CARDEX_TMDB_API_KEY") {
        config.tmdb.api_key = value;
    }
    if let Ok(value) = std::env::var("CARDEX_TMDB_RETRY_THRESHOLD") {
        config.tmdb.retry_threshold =
            value
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigLoadError::InvalidOverride {
                    key: "CARDEX_TMDB_RETRY_THRESHOLD",
                    message: e.to_string(),
                })?;
    }
    if let Ok(value) = std::env::var("CARDEX_TMDB_MINIMUM_RESOLUTION") {
        config.tmdb.minimum_resolution =
            value
                .parse()
                .map_err(|e| ConfigLoadError::InvalidOverride {
                    key: "CARDEX_TMDB_MINIMUM_RESOLUTION",
                    message: format!("{e}"),
                })?;
    }
    if let Ok(value) = std::env::var("CARDEX_TMDB_LANGUAGE") {
        config.tmdb.language = value;
    }
    if let Ok(value) = std::env::var("CARDEX_STORE_DIR") {
        config.store.dir = PathBuf::from(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // Loader tests read and write process environment; serialize them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_KEYS: [&str; 5] = [
        "CARDEX_TMDB_API_KEY",
        "CARDEX_TMDB_RETRY_THRESHOLD",
        "CARDEX_TMDB_MINIMUM_RESOLUTION",
        "CARDEX_TMDB_LANGUAGE",
        "CARDEX_STORE_DIR",
    ];

    fn clean_env() -> MutexGuard<'static, ()> {
        let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for key in OVERRIDE_KEYS {
            unsafe { std::env::remove_var(key) };
        }
        guard
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("cardex.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn file_values_load_and_validate() {
        let _env = clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [tmdb]
            api_key = "abc"
            retry_threshold = 5
            minimum_resolution = "1280x720"

            [store]
            dir = "/var/lib/cardex"
            "#,
        );

        let loaded = ConfigLoader::from_path(path).load().unwrap();
        assert_eq!(loaded.config.tmdb.api_key, "abc");
        assert_eq!(loaded.config.tmdb.retry_threshold, 5);
        assert_eq!(loaded.config.store.dir, PathBuf::from("/var/lib/cardex"));
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn environment_overrides_file_values() {
        let _env = clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [tmdb]
            api_key = "from-file"
            "#,
        );

        unsafe {
            std::env::set_var("CARDEX_TMDB_API_KEY", "from-env");
            std::env::set_var("CARDEX_TMDB_RETRY_THRESHOLD", "9");
        }
        let loaded = ConfigLoader::from_path(path).load().unwrap();
        unsafe {
            std::env::remove_var("CARDEX_TMDB_API_KEY");
            std::env::remove_var("CARDEX_TMDB_RETRY_THRESHOLD");
        }

        assert_eq!(loaded.config.tmdb.api_key, "from-env");
        assert_eq!(loaded.config.tmdb.retry_threshold, 9);
    }

    #[test]
    fn malformed_override_is_rejected() {
        let _env = clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[tmdb]\napi_key = \"abc\"\n");

        unsafe { std::env::set_var("CARDEX_TMDB_RETRY_THRESHOLD", "soon") };
        let result = ConfigLoader::from_path(path).load();
        unsafe { std::env::remove_var("CARDEX_TMDB_RETRY_THRESHOLD") };

        assert!(matches!(
            result,
            Err(ConfigLoadError::InvalidOverride { key: "CARDEX_TMDB_RETRY_THRESHOLD", .. })
        ));
    }

    #[test]
    fn missing_api_key_fails_the_guard_rails() {
        let _env = clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "");

        let result = ConfigLoader::from_path(path).load();
        assert!(matches!(result, Err(ConfigLoadError::GuardRails(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let _env = clean_env();
        let result = ConfigLoader::from_path("/definitely/not/here.toml").load();
        assert!(matches!(result, Err(ConfigLoadError::Io { .. })));
    }
}
