use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::StoreError;

const ID_MAP_FILE: &str = "id_map.json";
const BLACKLIST_FILE: &str = "blacklist.json";

/// Root directory holding the two persisted maps.
#[derive(Debug, Clone)]
pub struct StorePaths(PathBuf);

impl StorePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self(dir.into())
    }

    pub fn dir(&self) -> &Path {
        &self.0
    }

    pub fn id_map(&self) -> StoreFile {
        StoreFile::new(self.0.join(ID_MAP_FILE))
    }

    pub fn blacklist(&self) -> StoreFile {
        StoreFile::new(self.0.join(BLACKLIST_FILE))
    }
}

/// One durable JSON document.
///
/// `load` never fails: an absent file yields `None` and an unreadable or
/// unparseable one is reported and also yields `None`, so the caller always
/// starts from a usable (possibly empty) state. `save` is a full atomic
/// rewrite: the document is written to a temp file in the same directory and
/// renamed over the target, so a crash mid-write leaves the previous valid
/// snapshot intact.
#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable store file, starting empty");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt store file, starting empty");
                None
            }
        }
    }

    pub fn save<T: Serialize>(&self, document: &T) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(&mut tmp, document)?;
        tmp.flush().map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e.error,
        })?;

        Ok(())
    }

    /// Delete the backing file, the full-cache-reset path. Absence is fine.
    pub fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(dir.path().join("missing.json"));
        assert!(file.load().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(dir.path().join("doc.json"));

        file.save(&json!({"name": {"Show (2020)": 42}})).unwrap();
        let value = file.load().unwrap();
        assert_eq!(value["name"]["Show (2020)"], 42);
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{not json at all").unwrap();

        let file = StoreFile::new(path);
        assert!(file.load().is_none());
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(dir.path().join("doc.json"));

        file.save(&json!({"v": 1})).unwrap();
        file.save(&json!({"v": 2})).unwrap();
        assert_eq!(file.load().unwrap()["v"], 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = StoreFile::new(dir.path().join("doc.json"));

        file.save(&json!({})).unwrap();
        file.remove().unwrap();
        file.remove().unwrap();
        assert!(file.load().is_none());
    }
}
