use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One archive recorded by a scan, keyed by its path relative to the modpack root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModpackEntry {
    pub mod_id: String,
    pub hash: String,
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modpack {
    pub id: u64,
    pub name: String,
    pub path: PathBuf,
    pub last_scanned: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mods: Vec<ModpackEntry>,
}

impl Modpack {
    pub fn entry_for(&self, relative_path: &str) -> Option<&ModpackEntry> {
        self.mods.iter().find(|m| m.relative_path == relative_path)
    }
}
