use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::{DurableStore, StoreError};

/// Extension of committed record files.
const RECORD_EXTENSION: &str = "json";

/// Extension of in-flight writes; never read back.
const TMP_EXTENSION: &str = "json.tmp";

/// On-disk layout of a single record.
///
/// The original key is stored inside the file because file names are a
/// digest of the key (keys may be longer than a file name allows).
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    value: String,
}

/// [`DurableStore`] backed by a directory of JSON files.
///
/// Each key lives in its own file named after the SHA-256 of the key.
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write loses the new value but never leaves a torn record.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Default location: `~/.cache/larder/store`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("larder")
            .join("store")
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(URL_SAFE_NO_PAD.encode(digest))
            .with_extension(RECORD_EXTENSION)
    }

    fn read_record(path: &Path) -> Result<Option<StoredRecord>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt store record");
                Ok(None)
            }
        }
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        Ok(Self::read_record(&path)?
            .filter(|record| record.key == key)
            .map(|record| record.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        let path = self.path_for(key);
        let tmp_path = path.with_extension(TMP_EXTENSION);
        let record = StoredRecord {
            key: key.to_string(),
            value: value.to_string(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| StoreError::Io(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(record) = Self::read_record(&path)? {
                keys.push(record.key);
            }
        }
        Ok(keys)
    }
}
