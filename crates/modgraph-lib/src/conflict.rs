use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::dependency::DependencyResult;
use crate::models::{Conflict, ConflictRule, ConflictType, Environment, ModMetadata, Severity};
use crate::storage::ModStore;

/// Merges dependency findings with stored incompatibility rules into one conflict list.
pub struct ConflictAggregator {
    store: Arc<dyn ModStore>,
}

impl ConflictAggregator {
    pub fn new(store: Arc<dyn ModStore>) -> Self {
        Self { store }
    }

    /// Conflicts in a fixed order: missing dependencies, version conflicts, cycles,
    /// matching rules (by rule id), then the environment check.
    pub fn detect_conflicts(
        &self,
        mods: &[ModMetadata],
        dependencies: &DependencyResult,
    ) -> Result<Vec<Conflict>> {
        let mut conflicts = Vec::new();

        for missing in &dependencies.missing_dependencies {
            let mut description = format!(
                "Mod '{}' requires '{}' which is not installed",
                missing.mod_id, missing.dependency_id
            );
            if !missing.version_range.is_any() {
                description.push_str(&format!(" (version: {})", missing.version_range));
            }
            let severity = if missing.required {
                Severity::Critical
            } else {
                Severity::Warning
            };
            conflicts.push(
                Conflict::new(
                    ConflictType::MissingDependency,
                    severity,
                    description,
                    vec![missing.mod_id.clone(), missing.dependency_id.clone()],
                )
                .with_detail("required", missing.required.to_string())
                .with_detail("version_range", missing.version_range.format()),
            );
        }

        for conflict in &dependencies.version_conflicts {
            conflicts.push(
                Conflict::new(
                    ConflictType::VersionConflict,
                    Severity::Warning,
                    format!(
                        "Mod '{}' requires '{}' version {}, but version {} is installed",
                        conflict.mod_id,
                        conflict.dependency_id,
                        conflict.required_range,
                        conflict.actual_version
                    ),
                    vec![conflict.mod_id.clone(), conflict.dependency_id.clone()],
                )
                .with_detail("required_range", conflict.required_range.format())
                .with_detail("actual_version", conflict.actual_version.as_str()),
            );
        }

        for cycle in &dependencies.circular_deps {
            let mut chain = cycle.clone();
            if let Some(first) = cycle.first() {
                chain.push(first.clone());
            }
            conflicts.push(Conflict::new(
                ConflictType::CircularDependency,
                Severity::Critical,
                format!("Circular dependency detected: {}", chain.join(" -> ")),
                cycle.clone(),
            ));
        }

        let present: HashSet<&str> = mods.iter().map(|m| m.id.as_str()).collect();
        let rules = self
            .store
            .get_conflict_rules()
            .context("Failed to load conflict rules")?;
        for rule in rules {
            let a_present = present.contains(rule.mod_id_a.as_str());
            if a_present && present.contains(rule.mod_id_b.as_str()) {
                conflicts.push(
                    Conflict::new(
                        rule.conflict_type,
                        rule.severity,
                        rule.description.clone(),
                        vec![rule.mod_id_a.clone(), rule.mod_id_b.clone()],
                    )
                    .with_detail("rule_id", rule.id.to_string()),
                );
            }
        }

        if let Some(mismatch) = environment_mismatch(mods) {
            conflicts.push(mismatch);
        }

        log::info!(
            "[ConflictService] Detected {} conflict(s) across {} mods",
            conflicts.len(),
            mods.len()
        );
        Ok(conflicts)
    }

    pub fn add_rule(&self, rule: ConflictRule) -> Result<ConflictRule> {
        let saved = self.store.save_conflict_rule(rule)?;
        log::info!(
            "[ConflictService] Saved rule {} ({} <-> {})",
            saved.id,
            saved.mod_id_a,
            saved.mod_id_b
        );
        Ok(saved)
    }

    pub fn list_rules(&self) -> Result<Vec<ConflictRule>> {
        self.store.get_conflict_rules()
    }

    pub fn delete_rule(&self, rule_id: u64) -> Result<bool> {
        self.store.delete_conflict_rule(rule_id)
    }
}

fn ids_with(mods: &[ModMetadata], environment: Environment) -> Vec<String> {
    let mut seen = HashSet::new();
    mods.iter()
        .filter(|m| m.environment == environment)
        .filter(|m| seen.insert(m.id.as_str()))
        .map(|m| m.id.clone())
        .collect()
}

fn environment_mismatch(mods: &[ModMetadata]) -> Option<Conflict> {
    let client = ids_with(mods, Environment::Client);
    let server = ids_with(mods, Environment::Server);
    if client.is_empty() || server.is_empty() {
        return None;
    }
    let affected = client.iter().chain(server.iter()).cloned().collect();
    Some(
        Conflict::new(
            ConflictType::EnvironmentMismatch,
            Severity::Info,
            "Modpack contains both client-only and server-only mods. This may indicate a configuration issue.",
            affected,
        )
        .with_detail("client_only_mods", client)
        .with_detail("server_only_mods", server),
    )
}

/// Most severe first. Stable, so detection order is kept within a severity.
pub fn rank_conflicts(conflicts: &mut [Conflict]) {
    conflicts.sort_by_key(|c| c.severity);
}

pub fn count_by_severity(conflicts: &[Conflict]) -> BTreeMap<Severity, usize> {
    let mut counts = BTreeMap::new();
    for conflict in conflicts {
        *counts.entry(conflict.severity).or_insert(0) += 1;
    }
    counts
}
