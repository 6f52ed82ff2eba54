pub mod index;
pub mod json_store;
pub mod memory;

use anyhow::Result;
use std::path::Path;

use crate::models::{ConflictRule, ModMetadata, Modpack, ModpackEntry};

pub use json_store::JsonFileStore;
pub use memory::MemoryStore;

/// Persistence behind the content cache and the analysis service.
pub trait ModStore: Send + Sync {
    fn get_mod_by_hash(&self, hash: &str) -> Result<Option<ModMetadata>>;

    /// Most recently saved metadata for the id, whichever archive it came from.
    fn get_mod_by_id(&self, mod_id: &str) -> Result<Option<ModMetadata>>;

    fn save_mod(&self, metadata: &ModMetadata) -> Result<()>;

    /// Stores `metadata` unless something is already stored under its hash, and returns
    /// whichever record ends up stored. The check and the write are one atomic step.
    fn insert_or_fetch_by_hash(&self, metadata: ModMetadata) -> Result<ModMetadata>;

    fn get_modpack_snapshot(&self, path: &Path) -> Result<Option<Modpack>>;

    fn create_modpack(&self, path: &Path, name: &str) -> Result<Modpack>;

    /// Replaces the snapshot's mod list and stamps `last_scanned`.
    fn replace_modpack_snapshot(
        &self,
        modpack_id: u64,
        mods: Vec<ModpackEntry>,
    ) -> Result<Modpack>;

    /// All rules, ordered by id.
    fn get_conflict_rules(&self) -> Result<Vec<ConflictRule>>;

    /// Assigns an id when `rule.id` is 0; otherwise replaces the rule with that id.
    fn save_conflict_rule(&self, rule: ConflictRule) -> Result<ConflictRule>;

    /// Returns false when no rule had that id.
    fn delete_conflict_rule(&self, rule_id: u64) -> Result<bool>;

    /// Rules naming both mods, in either order.
    fn find_rules_for_pair(&self, mod_a: &str, mod_b: &str) -> Result<Vec<ConflictRule>> {
        Ok(self
            .get_conflict_rules()?
            .into_iter()
            .filter(|r| r.matches_pair(mod_a, mod_b))
            .collect())
    }
}
