use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::models::{ConflictRule, Modpack, ModpackEntry};

/// Bookkeeping every store keeps next to the hash-keyed metadata records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreIndex {
    /// Mod id -> hash of the most recently saved archive for that id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub latest_by_id: HashMap<String, String>,
    #[serde(default)]
    pub modpacks: BTreeMap<u64, Modpack>,
    #[serde(default)]
    pub rules: BTreeMap<u64, ConflictRule>,
    #[serde(default)]
    pub next_modpack_id: u64,
    #[serde(default)]
    pub next_rule_id: u64,
}

impl StoreIndex {
    pub fn modpack_by_path(&self, path: &Path) -> Option<Modpack> {
        self.modpacks.values().find(|m| m.path == path).cloned()
    }

    /// Returns the existing modpack when one is already registered for `path`.
    pub fn create_modpack(&mut self, path: &Path, name: &str) -> Modpack {
        if let Some(existing) = self.modpack_by_path(path) {
            return existing;
        }
        self.next_modpack_id += 1;
        let modpack = Modpack {
            id: self.next_modpack_id,
            name: name.to_string(),
            path: PathBuf::from(path),
            last_scanned: None,
            mods: Vec::new(),
        };
        self.modpacks.insert(modpack.id, modpack.clone());
        modpack
    }

    pub fn replace_snapshot(
        &mut self,
        modpack_id: u64,
        mods: Vec<ModpackEntry>,
    ) -> Result<Modpack> {
        let modpack = self
            .modpacks
            .get_mut(&modpack_id)
            .ok_or_else(|| anyhow!("Modpack {} does not exist", modpack_id))?;
        modpack.mods = mods;
        modpack.last_scanned = Some(Utc::now());
        Ok(modpack.clone())
    }

    pub fn save_rule(&mut self, mut rule: ConflictRule) -> ConflictRule {
        if rule.id == 0 {
            self.next_rule_id += 1;
            rule.id = self.next_rule_id;
        } else {
            self.next_rule_id = self.next_rule_id.max(rule.id);
        }
        self.rules.insert(rule.id, rule.clone());
        rule
    }
}
