use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::cache::ContentCache;
use crate::conflict::{count_by_severity, rank_conflicts, ConflictAggregator};
use crate::dependency::{self, DependencyResult};
use crate::loaders::{DefaultIcon, ExtractOptions, LoaderRegistry};
use crate::models::{Conflict, ConflictRule, Graph, ModMetadata, Modpack, Severity};
use crate::progress::ProgressReporter;
use crate::scan::{canonical_root, ScanOptions, ScanOrchestrator, ScanResult};
use crate::storage::ModStore;

const OPERATION: &str = "analyze";

#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub scan: ScanOptions,
    pub extract: ExtractOptions,
    pub default_icon: DefaultIcon,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub total_mods: usize,
    pub new_mods: usize,
    pub updated_mods: usize,
    pub removed_mods: usize,
    pub failed_archives: usize,
    pub cache_hit_rate: f64,
    pub missing_dependencies: usize,
    pub version_conflicts: usize,
    pub circular_dependencies: usize,
    pub total_conflicts: usize,
    pub conflicts_by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub modpack: Modpack,
    pub mods: Vec<ModMetadata>,
    pub dependencies: DependencyResult,
    /// Most severe first.
    pub conflicts: Vec<Conflict>,
    pub summary: AnalysisSummary,
}

/// Entry point for front ends.
pub struct AnalysisService {
    store: Arc<dyn ModStore>,
    scanner: ScanOrchestrator,
    conflicts: ConflictAggregator,
    reporter: Arc<dyn ProgressReporter>,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn ModStore>,
        options: ServiceOptions,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self> {
        let registry = LoaderRegistry::new(options.default_icon, options.extract);
        let cache = Arc::new(ContentCache::new(store.clone(), Arc::new(registry)));
        let scanner = ScanOrchestrator::new(cache, options.scan)?;
        Ok(Self {
            conflicts: ConflictAggregator::new(store.clone()),
            store,
            scanner,
            reporter,
        })
    }

    /// Scans the directory and records its snapshot without analyzing it.
    pub fn scan(&self, dir: &Path) -> Result<ScanResult> {
        self.scanner.scan(dir, self.reporter.as_ref())
    }

    /// Rescans a modpack that may have changed on disk since the last scan.
    pub fn refresh(&self, dir: &Path) -> Result<ScanResult> {
        log::info!("[AnalysisService] Refreshing {:?}", dir);
        self.scan(dir)
    }

    /// Full pipeline: scan, dependency analysis, conflict detection.
    pub fn analyze(&self, dir: &Path) -> Result<AnalysisReport> {
        let scan = self.scan(dir)?;

        self.reporter
            .report(OPERATION, "Building dependency graph", 0);
        let dependencies = dependency::analyze(&scan.mods);

        self.reporter.report(OPERATION, "Detecting conflicts", 50);
        let mut conflicts = self.conflicts.detect_conflicts(&scan.mods, &dependencies)?;
        rank_conflicts(&mut conflicts);

        let summary = AnalysisSummary {
            total_mods: scan.mods.len(),
            new_mods: scan.new_mods.len(),
            updated_mods: scan.updated_mods.len(),
            removed_mods: scan.removed_mods.len(),
            failed_archives: scan.failures.len(),
            cache_hit_rate: scan.cache_hit_rate(),
            missing_dependencies: dependencies.missing_dependencies.len(),
            version_conflicts: dependencies.version_conflicts.len(),
            circular_dependencies: dependencies.circular_deps.len(),
            total_conflicts: conflicts.len(),
            conflicts_by_severity: count_by_severity(&conflicts),
        };
        self.reporter.report(OPERATION, "Analysis complete", 100);

        Ok(AnalysisReport {
            modpack: scan.modpack,
            mods: scan.mods,
            dependencies,
            conflicts,
            summary,
        })
    }

    /// Graph of the last recorded scan. Does not touch the filesystem beyond
    /// resolving `dir`.
    pub fn get_graph(&self, dir: &Path) -> Result<Graph> {
        let mods = self.snapshot_mods(dir)?;
        Ok(dependency::build_graph(&mods))
    }

    pub fn get_mod_metadata(&self, mod_id: &str) -> Result<Option<ModMetadata>> {
        self.store.get_mod_by_id(mod_id)
    }

    fn snapshot_mods(&self, dir: &Path) -> Result<Vec<ModMetadata>> {
        let root = canonical_root(dir)?;
        let modpack = self
            .store
            .get_modpack_snapshot(&root)?
            .filter(|m| m.last_scanned.is_some())
            .ok_or_else(|| anyhow!("Modpack {:?} has not been scanned yet", root))?;

        let mut mods = Vec::with_capacity(modpack.mods.len());
        for entry in &modpack.mods {
            match self.store.get_mod_by_hash(&entry.hash)? {
                Some(mut metadata) => {
                    metadata.file_path = root.join(&entry.relative_path);
                    mods.push(metadata);
                }
                None => log::warn!(
                    "[AnalysisService] Snapshot entry {} has no stored metadata",
                    entry.relative_path
                ),
            }
        }
        Ok(mods)
    }

    pub fn add_rule(&self, rule: ConflictRule) -> Result<ConflictRule> {
        self.conflicts.add_rule(rule)
    }

    pub fn list_rules(&self) -> Result<Vec<ConflictRule>> {
        self.conflicts.list_rules()
    }

    pub fn delete_rule(&self, rule_id: u64) -> Result<bool> {
        self.conflicts.delete_rule(rule_id)
    }
}
