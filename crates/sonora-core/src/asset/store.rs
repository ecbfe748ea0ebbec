//! Path-keyed asset cache
//!
//! Several clips usually reference the same file. The store decodes a path
//! once and hands out shared references afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{AssetResult, AudioBuffer, AudioDecoder, SymphoniaDecoder};

pub struct AssetStore {
    decoder: Box<dyn AudioDecoder>,
    cache: Mutex<HashMap<PathBuf, Arc<AudioBuffer>>>,
}

impl AssetStore {
    /// Store backed by the default symphonia decoder
    pub fn new() -> Self {
        Self::with_decoder(Box::new(SymphoniaDecoder))
    }

    pub fn with_decoder(decoder: Box<dyn AudioDecoder>) -> Self {
        Self {
            decoder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached asset for `path`, decoding it on first request
    ///
    /// A failed decode is not cached, so a later call retries.
    pub fn load(&self, path: &Path) -> AssetResult<Arc<AudioBuffer>> {
        if let Some(buffer) = self.lock().get(path) {
            return Ok(Arc::clone(buffer));
        }

        // Decode outside the lock; a concurrent load of the same path may
        // decode twice, the first insert wins
        let buffer = Arc::new(self.decoder.decode(path)?);
        let mut cache = self.lock();
        let entry = cache
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::clone(&buffer));
        Ok(Arc::clone(entry))
    }

    /// Drop the cached asset for `path`. Clips holding it keep their reference.
    pub fn evict(&self, path: &Path) -> bool {
        self.lock().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<AudioBuffer>>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for AssetStore {
    fn default() -> Self {
        Self::new()
    }
}
