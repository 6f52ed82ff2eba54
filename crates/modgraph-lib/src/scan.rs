use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::cache::{CacheResult, ContentCache};
use crate::error::CacheError;
use crate::models::{ModMetadata, Modpack, ModpackEntry};
use crate::progress::ProgressReporter;
use crate::storage::ModStore;

const OPERATION: &str = "scan";

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lowercase file extensions, without the dot, treated as mod archives.
    pub extensions: Vec<String>,
    /// Worker threads for archive extraction. 0 lets rayon decide.
    pub worker_threads: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["jar".to_string()],
            worker_threads: 0,
        }
    }
}

/// An archive that was skipped because it could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub relative_path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub modpack: Modpack,
    pub mods: Vec<ModMetadata>,
    pub new_mods: Vec<ModMetadata>,
    pub updated_mods: Vec<ModMetadata>,
    pub removed_mods: Vec<ModMetadata>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub failures: Vec<ScanFailure>,
}

impl ScanResult {
    /// Percentage of resolved archives served from the cache.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 * 100.0 / total as f64
        }
    }
}

/// Walks a modpack directory through the cache and records the resulting snapshot.
pub struct ScanOrchestrator {
    cache: Arc<ContentCache>,
    pool: rayon::ThreadPool,
    options: ScanOptions,
}

impl ScanOrchestrator {
    pub fn new(cache: Arc<ContentCache>, options: ScanOptions) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.worker_threads)
            .thread_name(|i| format!("modgraph-scan-{}", i))
            .build()
            .context("Failed to build scan worker pool")?;
        Ok(Self {
            cache,
            pool,
            options,
        })
    }

    pub fn scan(&self, dir: &Path, reporter: &dyn ProgressReporter) -> Result<ScanResult> {
        let root = canonical_root(dir)?;
        log::info!("[ScanService] Scanning modpack at {:?}", root);
        reporter.report(OPERATION, "Discovering archives", 0);

        let archives = self.collect_archives(&root)?;
        log::info!("[ScanService] Found {} archive(s)", archives.len());

        let store = self.cache.store();
        let modpack = match store.get_modpack_snapshot(&root)? {
            Some(existing) => existing,
            None => store.create_modpack(&root, &modpack_name(&root))?,
        };
        let previous: HashMap<&str, &ModpackEntry> = modpack
            .mods
            .iter()
            .map(|e| (e.relative_path.as_str(), e))
            .collect();

        reporter.report(
            OPERATION,
            &format!("Reading {} archives", archives.len()),
            10,
        );
        let cache = &self.cache;
        let resolved: Vec<(PathBuf, Result<CacheResult, CacheError>)> = self.pool.install(|| {
            archives
                .par_iter()
                .map(|path| (path.clone(), cache.get_or_extract(path)))
                .collect()
        });

        reporter.report(OPERATION, "Reconciling with previous scan", 80);
        let mut mods = Vec::new();
        let mut new_mods = Vec::new();
        let mut updated_mods = Vec::new();
        let mut entries = Vec::new();
        let mut failures = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let (mut cache_hits, mut cache_misses) = (0, 0);

        for (path, outcome) in resolved {
            let relative_path = relative_to(&root, &path);
            // Still in the walk, so never reported as removed even if unreadable.
            seen.insert(relative_path.clone());
            let result = match outcome {
                Ok(result) => result,
                Err(CacheError::Storage(e)) => {
                    let message = format!("Storage failure while scanning {}", relative_path);
                    return Err(e.context(message));
                }
                Err(CacheError::Archive(e)) => {
                    log::warn!("[ScanService] Skipping {}: {}", relative_path, e);
                    failures.push(ScanFailure {
                        relative_path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if result.cache_hit {
                cache_hits += 1;
            } else {
                cache_misses += 1;
            }

            match previous.get(relative_path.as_str()) {
                None => new_mods.push(result.metadata.clone()),
                Some(entry) if entry.hash != result.hash => {
                    updated_mods.push(result.metadata.clone())
                }
                Some(_) => {}
            }

            entries.push(ModpackEntry {
                mod_id: result.metadata.id.clone(),
                hash: result.hash,
                relative_path,
            });
            mods.push(result.metadata);
        }

        let mut removed_mods = Vec::new();
        for entry in modpack.mods.iter().filter(|e| !seen.contains(&e.relative_path)) {
            if let Some(found) = lookup_removed(&**store, entry)? {
                removed_mods.push(found);
            }
        }

        let modpack = store.replace_modpack_snapshot(modpack.id, entries)?;

        log::info!(
            "[ScanService] Scanned {} mods: {} new, {} updated, {} removed, {} cache hits, {} misses, {} failed",
            mods.len(),
            new_mods.len(),
            updated_mods.len(),
            removed_mods.len(),
            cache_hits,
            cache_misses,
            failures.len()
        );
        reporter.report(OPERATION, "Scan complete", 100);

        Ok(ScanResult {
            modpack,
            mods,
            new_mods,
            updated_mods,
            removed_mods,
            cache_hits,
            cache_misses,
            failures,
        })
    }

    /// Archive paths under `root`, sorted. Any walk error aborts the scan.
    fn collect_archives(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to walk {:?}", root))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| {
                    let e = e.to_ascii_lowercase();
                    self.options.extensions.iter().any(|x| *x == e)
                })
                .unwrap_or(false);
            if matches {
                archives.push(entry.into_path());
            }
        }
        archives.sort();
        Ok(archives)
    }
}

pub(crate) fn canonical_root(dir: &Path) -> Result<PathBuf> {
    let root = dunce::canonicalize(dir)
        .with_context(|| format!("Modpack directory {:?} is not accessible", dir))?;
    if !root.is_dir() {
        bail!("{:?} is not a directory", root);
    }
    Ok(root)
}

fn modpack_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned())
}

/// Forward-slash path relative to the modpack root, stable across platforms.
fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// The archive is gone, so only stored metadata can describe it: by hash first, then by id.
fn lookup_removed(
    store: &dyn ModStore,
    entry: &ModpackEntry,
) -> Result<Option<ModMetadata>, CacheError> {
    if let Some(found) = store
        .get_mod_by_hash(&entry.hash)
        .map_err(CacheError::Storage)?
    {
        return Ok(Some(found));
    }
    store
        .get_mod_by_id(&entry.mod_id)
        .map_err(CacheError::Storage)
}
