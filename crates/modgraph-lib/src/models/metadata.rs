use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::version::VersionConstraint;

/// Manifest dialect an archive was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderType {
    Fabric,
    ForgeModern,
    ForgeLegacy,
    #[serde(rename = "neoforge")]
    NeoForge,
}

impl LoaderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderType::Fabric => "fabric",
            LoaderType::ForgeModern => "forge_modern",
            LoaderType::ForgeLegacy => "forge_legacy",
            LoaderType::NeoForge => "neoforge",
        }
    }
}

impl std::fmt::Display for LoaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side of the game a mod runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Client,
    Server,
    #[default]
    Both,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Client => "client",
            Environment::Server => "server",
            Environment::Both => "both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModIdentity {
    pub id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub mod_id: String,
    pub dependency_id: String,
    pub required: bool,
    #[serde(default)]
    pub version_range: VersionConstraint,
}

/// Normalized metadata for one archive, independent of its manifest dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModMetadata {
    pub id: String,
    pub version: String,
    /// SHA-256 hex digest of the archive bytes.
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub loader_type: LoaderType,
    #[serde(default)]
    pub environment: Environment,
    /// `data:<mime>;base64,...`
    #[serde(default)]
    pub icon_data: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Mods bundled inside this archive (jar-in-jar), flattened across nesting levels.
    #[serde(default)]
    pub embedded: Vec<ModIdentity>,
    #[serde(default)]
    pub raw_manifest: String,
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModMetadata {
    pub fn identity(&self) -> ModIdentity {
        ModIdentity {
            id: self.id.clone(),
            version: self.version.clone(),
        }
    }

    pub fn embeds(&self, mod_id: &str) -> Option<&ModIdentity> {
        self.embedded.iter().find(|m| m.id == mod_id)
    }
}
