//! Content-addressed extraction cache
//!
//! Entries are keyed by file path and carry a fingerprint of the content they
//! were extracted from. A lookup only hits when the fingerprint recomputed from
//! the current content is identical; anything else means re-extraction.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CacheError;

/// Content hash plus byte length, e.g. `"9f2c…e1.4096"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(content: &[u8]) -> Self {
        let hash = blake3::hash(content);
        Self(format!("{}.{}", hash.to_hex(), content.len()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: Fingerprint,
    pub data: T,
}

pub struct ContentCache<T> {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CacheEntry<T>>,
    enabled: bool,
    /// Paths looked up or recorded since the cache was opened
    touched: HashSet<String>,
}

impl<T> ContentCache<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// A cache that lives only for the current run
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: BTreeMap::new(),
            enabled: true,
            touched: HashSet::new(),
        }
    }

    /// Load a persisted cache document. A missing file yields an empty cache;
    /// an unreadable document is discarded with a warning.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let entries = match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Discarding unreadable cache {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        info!("Loaded cache {:?} with {} entries", path, entries.len());

        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
            enabled: true,
            touched: HashSet::new(),
        })
    }

    /// Disable lookups; fresh results are still recorded and saved
    pub fn bypass(mut self, bypass: bool) -> Self {
        self.enabled = !bypass;
        self
    }

    fn key_for(file: &Path) -> String {
        file.to_string_lossy().into_owned()
    }

    pub fn lookup(&self, file: &Path, content: &[u8]) -> Option<&T> {
        if !self.enabled {
            return None;
        }

        let entry = self.entries.get(&Self::key_for(file))?;
        (entry.key == Fingerprint::of(content)).then_some(&entry.data)
    }

    /// Record a fresh extraction, replacing any previous entry for the path
    pub fn insert(&mut self, file: &Path, content: &[u8], data: T) {
        let key = Self::key_for(file);
        self.touched.insert(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                key: Fingerprint::of(content),
                data,
            },
        );
    }

    /// Return the cached payload for unchanged content or run `extract` and
    /// store its result. Extraction errors leave the cache untouched.
    pub fn get_or_extract<E>(
        &mut self,
        file: &Path,
        content: &[u8],
        extract: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if let Some(data) = self.lookup(file, content).cloned() {
            debug!("Cache hit for {:?}", file);
            self.touched.insert(Self::key_for(file));
            return Ok(data);
        }

        debug!("Cache miss for {:?}", file);
        let data = extract()?;
        self.insert(file, content, data.clone());
        Ok(data)
    }

    /// Drop entries for paths neither looked up through
    /// [`get_or_extract`](Self::get_or_extract) nor recorded since the cache
    /// was opened. Returns the number of entries removed.
    pub fn prune_untouched(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| self.touched.contains(key));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the cache document if this cache is backed by a file
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(path, json).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Saved {} cache entries to {:?}", self.entries.len(), path);
        Ok(())
    }
}
