use anyhow::anyhow;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{CacheError, ExtractError};
use crate::loaders::LoaderRegistry;
use crate::models::ModMetadata;
use crate::storage::ModStore;

/// Turns an archive on disk into metadata. `hash` is the already computed content hash.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path, hash: &str) -> Result<ModMetadata, ExtractError>;
}

impl MetadataExtractor for LoaderRegistry {
    fn extract(&self, path: &Path, hash: &str) -> Result<ModMetadata, ExtractError> {
        self.extract_file(path, hash)
    }
}

#[derive(Debug, Clone)]
pub struct CacheResult {
    pub metadata: ModMetadata,
    pub hash: String,
    pub cache_hit: bool,
}

/// SHA-256 of the file contents as lowercase hex.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Content-addressed front for the extractors: identical bytes are only ever
/// extracted once, no matter how many paths or threads ask for them.
pub struct ContentCache {
    store: Arc<dyn ModStore>,
    extractor: Arc<dyn MetadataExtractor>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn ModStore>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self {
            store,
            extractor,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ModStore> {
        &self.store
    }

    pub fn get_or_extract(&self, path: &Path) -> Result<CacheResult, CacheError> {
        let hash = hash_file(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(metadata) = self.lookup(&hash)? {
            log::debug!("[ContentCache] Hit for {:?} ({})", path, &hash[..12]);
            return Ok(hit(metadata, hash, path));
        }

        let slot = self.slot_for(&hash)?;
        let result = self.extract_exclusive(&slot, path, &hash);
        self.release(&hash);
        result
    }

    fn extract_exclusive(
        &self,
        slot: &Mutex<()>,
        path: &Path,
        hash: &str,
    ) -> Result<CacheResult, CacheError> {
        let _guard = slot
            .lock()
            .map_err(|_| CacheError::Storage(anyhow!("In-flight lock poisoned for {}", hash)))?;

        // Another worker may have finished the same content while we waited.
        if let Some(metadata) = self.lookup(hash)? {
            log::debug!("[ContentCache] Hit after wait for {:?}", path);
            return Ok(hit(metadata, hash.to_string(), path));
        }

        log::debug!("[ContentCache] Miss for {:?}, extracting", path);
        let extracted = self.extractor.extract(path, hash)?;
        let mut stored = self
            .store
            .insert_or_fetch_by_hash(extracted)
            .map_err(CacheError::Storage)?;
        stored.file_path = path.to_path_buf();

        Ok(CacheResult {
            metadata: stored,
            hash: hash.to_string(),
            cache_hit: false,
        })
    }

    fn lookup(&self, hash: &str) -> Result<Option<ModMetadata>, CacheError> {
        self.store.get_mod_by_hash(hash).map_err(CacheError::Storage)
    }

    fn slot_for(&self, hash: &str) -> Result<Arc<Mutex<()>>, CacheError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| CacheError::Storage(anyhow!("In-flight table lock poisoned")))?;
        Ok(in_flight
            .entry(hash.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    fn release(&self, hash: &str) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(hash);
        }
    }
}

fn hit(mut metadata: ModMetadata, hash: String, path: &Path) -> CacheResult {
    metadata.file_path = path.to_path_buf();
    CacheResult {
        metadata,
        hash,
        cache_hit: true,
    }
}
