use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by provider queries and the query service.
///
/// The ordinary "provider has no such series/episode/asset" outcome is *not*
/// an error: lookups return `Ok(None)` for that path so transient transport
/// trouble is never conflated with "content does not exist".
#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Deadline expired")]
    DeadlineExpired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures writing the persisted identifier map or blacklist.
///
/// Read-side corruption is not represented here: unreadable store files are
/// self-healed at load time (the repair pass) and only emit a warning.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TmdbError>;
