use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::index::StoreIndex;
use super::ModStore;
use crate::models::{ConflictRule, ModMetadata, Modpack, ModpackEntry};

const INDEX_FILE: &str = "index.json";
const MODS_DIR: &str = "mods";
const LATEST_DIR: &str = "latest";

/// File-backed store. Metadata records live in one JSON file per content hash under
/// `mods/<xx>/<hash>.json`, and the latest hash per mod id in `latest/<sha256 of id>.json`.
/// Modpacks and rules live in `index.json`.
/// Every file is written to a temporary sibling and renamed into place.
#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    mod_id: String,
    hash: String,
}

#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    index: Mutex<StoreIndex>,
}

impl JsonFileStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).with_context(|| format!("Create store directory {:?}", root))?;
        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let data = fs::read_to_string(&index_path)
                .with_context(|| format!("Read store index {:?}", index_path))?;
            serde_json::from_str(&data)
                .with_context(|| format!("Parse store index {:?}", index_path))?
        } else {
            StoreIndex::default()
        };
        log::debug!("[JsonFileStore] Opened store at {:?}", root);
        Ok(Self {
            root: root.to_path_buf(),
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreIndex>> {
        self.index
            .lock()
            .map_err(|_| anyhow!("Store index lock poisoned"))
    }

    fn record_path(&self, hash: &str) -> Result<PathBuf> {
        if hash.len() < 2 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("Invalid content hash {:?}", hash);
        }
        Ok(self
            .root
            .join(MODS_DIR)
            .join(&hash[..2])
            .join(format!("{}.json", hash)))
    }

    fn read_record(&self, hash: &str) -> Result<Option<ModMetadata>> {
        let path = self.record_path(hash)?;
        if !path.exists() {
            return Ok(None);
        }
        let data =
            fs::read_to_string(&path).with_context(|| format!("Read mod record {:?}", path))?;
        let metadata = serde_json::from_str(&data)
            .with_context(|| format!("Parse mod record {:?}", path))?;
        Ok(Some(metadata))
    }

    /// Writes the record and points its id at it.
    fn write_record(&self, metadata: &ModMetadata) -> Result<()> {
        let path = self.record_path(&metadata.hash)?;
        write_atomic(&path, metadata)?;
        let pointer = LatestPointer {
            mod_id: metadata.id.clone(),
            hash: metadata.hash.clone(),
        };
        write_atomic(&self.latest_path(&metadata.id), &pointer)
    }

    fn latest_path(&self, mod_id: &str) -> PathBuf {
        let key = format!("{:x}", Sha256::digest(mod_id.as_bytes()));
        self.root.join(LATEST_DIR).join(format!("{}.json", key))
    }

    fn read_latest(&self, mod_id: &str) -> Result<Option<String>> {
        let path = self.latest_path(mod_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Read latest pointer {:?}", path))?;
        let pointer: LatestPointer = serde_json::from_str(&data)
            .with_context(|| format!("Parse latest pointer {:?}", path))?;
        Ok(Some(pointer.hash))
    }

    /// Applies `change` to a copy of the index and only keeps it once it is on disk.
    fn commit<T>(
        &self,
        index: &mut StoreIndex,
        change: impl FnOnce(&mut StoreIndex) -> Result<T>,
    ) -> Result<T> {
        let mut next = index.clone();
        let out = change(&mut next)?;
        write_atomic(&self.root.join(INDEX_FILE), &next)?;
        *index = next;
        Ok(out)
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("No parent directory for {:?}", path))?;
    fs::create_dir_all(parent).with_context(|| format!("Create directory {:?}", parent))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Create temporary file in {:?}", parent))?;
    tmp.write_all(&serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("Write temporary file for {:?}", path))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Replace {:?}", path))?;
    Ok(())
}

impl ModStore for JsonFileStore {
    fn get_mod_by_hash(&self, hash: &str) -> Result<Option<ModMetadata>> {
        self.read_record(hash)
    }

    fn get_mod_by_id(&self, mod_id: &str) -> Result<Option<ModMetadata>> {
        let hash = {
            let _index = self.lock()?;
            self.read_latest(mod_id)?
        };
        match hash {
            Some(hash) => self.read_record(&hash),
            None => Ok(None),
        }
    }

    fn save_mod(&self, metadata: &ModMetadata) -> Result<()> {
        let _index = self.lock()?;
        self.write_record(metadata)
    }

    fn insert_or_fetch_by_hash(&self, metadata: ModMetadata) -> Result<ModMetadata> {
        // Holding the index lock makes the existence check and the write one step.
        let _index = self.lock()?;
        if let Some(existing) = self.read_record(&metadata.hash)? {
            return Ok(existing);
        }
        self.write_record(&metadata)?;
        Ok(metadata)
    }

    fn get_modpack_snapshot(&self, path: &Path) -> Result<Option<Modpack>> {
        Ok(self.lock()?.modpack_by_path(path))
    }

    fn create_modpack(&self, path: &Path, name: &str) -> Result<Modpack> {
        let mut index = self.lock()?;
        if let Some(existing) = index.modpack_by_path(path) {
            return Ok(existing);
        }
        self.commit(&mut index, |next| Ok(next.create_modpack(path, name)))
    }

    fn replace_modpack_snapshot(
        &self,
        modpack_id: u64,
        mods: Vec<ModpackEntry>,
    ) -> Result<Modpack> {
        let mut index = self.lock()?;
        self.commit(&mut index, |next| next.replace_snapshot(modpack_id, mods))
    }

    fn get_conflict_rules(&self) -> Result<Vec<ConflictRule>> {
        Ok(self.lock()?.rules.values().cloned().collect())
    }

    fn save_conflict_rule(&self, rule: ConflictRule) -> Result<ConflictRule> {
        let mut index = self.lock()?;
        self.commit(&mut index, |next| Ok(next.save_rule(rule)))
    }

    fn delete_conflict_rule(&self, rule_id: u64) -> Result<bool> {
        let mut index = self.lock()?;
        if !index.rules.contains_key(&rule_id) {
            return Ok(false);
        }
        self.commit(&mut index, |next| Ok(next.rules.remove(&rule_id).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictType, Severity};
    use crate::storage::memory::test_support::sample_mod;

    #[test]
    fn test_records_survive_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        {
            let store = JsonFileStore::open(dir.path())?;
            store.insert_or_fetch_by_hash(sample_mod("jei", "15.2.0", "abcdef01"))?;
            let pack = store.create_modpack(Path::new("/packs/a"), "a")?;
            store.replace_modpack_snapshot(
                pack.id,
                vec![ModpackEntry {
                    mod_id: "jei".into(),
                    hash: "abcdef01".into(),
                    relative_path: "jei.jar".into(),
                }],
            )?;
            store.save_conflict_rule(ConflictRule {
                id: 0,
                mod_id_a: "jei".into(),
                mod_id_b: "rei".into(),
                conflict_type: ConflictType::FeatureOverlap,
                description: "Two recipe viewers".into(),
                severity: Severity::Warning,
            })?;
        }

        assert!(dir.path().join("mods/ab/abcdef01.json").exists());
        let store = JsonFileStore::open(dir.path())?;
        assert_eq!(store.get_mod_by_id("jei")?.map(|m| m.version), Some("15.2.0".into()));
        let pack = store.get_modpack_snapshot(Path::new("/packs/a"))?.unwrap();
        assert_eq!(pack.mods.len(), 1);
        assert_eq!(store.find_rules_for_pair("rei", "jei")?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_insert_or_fetch_returns_stored_record() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::open(dir.path())?;
        let first = store.insert_or_fetch_by_hash(sample_mod("a", "1.0", "00ff"))?;
        let second = store.insert_or_fetch_by_hash(sample_mod("a", "9.9", "00ff"))?;
        assert_eq!(first.version, "1.0");
        assert_eq!(second.version, "1.0");
        Ok(())
    }

    #[test]
    fn test_mod_writes_leave_index_alone() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::open(dir.path())?;
        store.insert_or_fetch_by_hash(sample_mod("a", "1.0", "0a01"))?;
        store.save_mod(&sample_mod("a", "2.0", "0a02"))?;
        assert!(!dir.path().join(INDEX_FILE).exists());
        assert_eq!(store.get_mod_by_id("a")?.map(|m| m.hash), Some("0a02".into()));
        assert!(store.get_mod_by_id("b")?.is_none());
        Ok(())
    }

    #[test]
    fn test_failed_index_write_keeps_memory_unchanged() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::open(dir.path())?;
        let rule = ConflictRule {
            id: 0,
            mod_id_a: "sodium".into(),
            mod_id_b: "optifine".into(),
            conflict_type: ConflictType::KnownIncompatible,
            description: "Renderer replacements".into(),
            severity: Severity::Critical,
        };

        // A directory where index.json should go makes the rename fail.
        fs::create_dir(dir.path().join(INDEX_FILE))?;
        assert!(store.save_conflict_rule(rule.clone()).is_err());
        assert!(store.get_conflict_rules()?.is_empty());

        fs::remove_dir(dir.path().join(INDEX_FILE))?;
        assert_eq!(store.save_conflict_rule(rule)?.id, 1);
        Ok(())
    }

    #[test]
    fn test_rejects_non_hex_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.get_mod_by_hash("../etc/passwd").is_err());
    }
}
