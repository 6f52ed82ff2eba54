use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::index::StoreIndex;
use super::ModStore;
use crate::models::{ConflictRule, ModMetadata, Modpack, ModpackEntry};

#[derive(Debug, Default)]
struct StoreState {
    /// Never pruned: superseded archives stay addressable by hash.
    mods_by_hash: HashMap<String, ModMetadata>,
    index: StoreIndex,
}

impl StoreState {
    fn save_mod(&mut self, metadata: &ModMetadata) {
        self.index
            .latest_by_id
            .insert(metadata.id.clone(), metadata.hash.clone());
        self.mods_by_hash
            .insert(metadata.hash.clone(), metadata.clone());
    }
}

/// Process-local store, used by tests and one-off analyses.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }
}

impl ModStore for MemoryStore {
    fn get_mod_by_hash(&self, hash: &str) -> Result<Option<ModMetadata>> {
        Ok(self.read()?.mods_by_hash.get(hash).cloned())
    }

    fn get_mod_by_id(&self, mod_id: &str) -> Result<Option<ModMetadata>> {
        let state = self.read()?;
        Ok(state
            .index
            .latest_by_id
            .get(mod_id)
            .and_then(|hash| state.mods_by_hash.get(hash))
            .cloned())
    }

    fn save_mod(&self, metadata: &ModMetadata) -> Result<()> {
        self.write()?.save_mod(metadata);
        Ok(())
    }

    fn insert_or_fetch_by_hash(&self, metadata: ModMetadata) -> Result<ModMetadata> {
        let mut state = self.write()?;
        if let Some(existing) = state.mods_by_hash.get(&metadata.hash) {
            return Ok(existing.clone());
        }
        state.save_mod(&metadata);
        Ok(metadata)
    }

    fn get_modpack_snapshot(&self, path: &Path) -> Result<Option<Modpack>> {
        Ok(self.read()?.index.modpack_by_path(path))
    }

    fn create_modpack(&self, path: &Path, name: &str) -> Result<Modpack> {
        Ok(self.write()?.index.create_modpack(path, name))
    }

    fn replace_modpack_snapshot(
        &self,
        modpack_id: u64,
        mods: Vec<ModpackEntry>,
    ) -> Result<Modpack> {
        self.write()?.index.replace_snapshot(modpack_id, mods)
    }

    fn get_conflict_rules(&self) -> Result<Vec<ConflictRule>> {
        Ok(self.read()?.index.rules.values().cloned().collect())
    }

    fn save_conflict_rule(&self, rule: ConflictRule) -> Result<ConflictRule> {
        Ok(self.write()?.index.save_rule(rule))
    }

    fn delete_conflict_rule(&self, rule_id: u64) -> Result<bool> {
        Ok(self.write()?.index.rules.remove(&rule_id).is_some())
    }
}
