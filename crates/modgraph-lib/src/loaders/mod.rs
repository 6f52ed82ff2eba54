pub mod archive;
pub mod fabric;
pub mod forge_legacy;
pub mod forge_modern;
pub mod icon;
pub mod manifest;
pub mod neoforge;
pub mod registry;

use crate::error::ExtractError;
use crate::models::{Environment, LoaderType, ModIdentity};
use crate::version::VersionConstraint;

pub use archive::JarArchive;
pub use icon::DefaultIcon;
pub use registry::{ExtractOptions, LoaderRegistry};

/// Ids that name the platform rather than an installable mod.
const PLATFORM_IDS: [&str; 10] = [
    "minecraft",
    "java",
    "fabricloader",
    "fabric-loader",
    "forge",
    "neoforge",
    "fml",
    "javafml",
    "lowcodefml",
    "mcp",
];

pub fn is_platform_dependency(id: &str) -> bool {
    let lower = id.trim().to_ascii_lowercase();
    PLATFORM_IDS.contains(&lower.as_str())
}

/// A dependency as declared in a manifest, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredDependency {
    pub id: String,
    pub required: bool,
    pub version_range: VersionConstraint,
}

impl DeclaredDependency {
    pub fn new(id: &str, required: bool, range: &str) -> Self {
        Self {
            id: id.trim().to_string(),
            required,
            version_range: VersionConstraint::parse(range),
        }
    }
}

/// What a loader reads out of its manifest. Dialect independent steps such as icon
/// lookup happen in the registry.
#[derive(Debug, Clone)]
pub struct ParsedManifest {
    pub loader_type: LoaderType,
    pub id: String,
    pub version: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub environment: Environment,
    pub dependencies: Vec<DeclaredDependency>,
    pub icon_path: Option<String>,
    pub raw_manifest: String,
    /// Extra nested archive paths named by the manifest itself.
    pub nested_jars: Vec<String>,
    /// Bundled mods the manifest describes without needing to open them.
    pub declared_embedded: Vec<ModIdentity>,
}

impl ParsedManifest {
    pub fn new(loader_type: LoaderType, id: String, raw_manifest: String) -> Self {
        Self {
            loader_type,
            id,
            version: None,
            name: None,
            description: None,
            authors: Vec::new(),
            environment: Environment::Both,
            dependencies: Vec::new(),
            icon_path: None,
            raw_manifest,
            nested_jars: Vec::new(),
            declared_embedded: Vec::new(),
        }
    }
}

/// One manifest dialect.
pub trait ModLoader: Send + Sync {
    fn loader_type(&self) -> LoaderType;

    /// Entry whose presence identifies the dialect.
    fn marker(&self) -> &'static str;

    fn can_handle(&self, archive: &JarArchive) -> bool {
        archive.contains(self.marker())
    }

    fn parse(&self, archive: &mut JarArchive) -> Result<ParsedManifest, ExtractError>;
}

/// Reads the marker entry, failing if it disappeared between detection and parsing.
pub(crate) fn read_marker(archive: &mut JarArchive, marker: &str) -> Result<String, ExtractError> {
    archive
        .read_string(marker)?
        .ok_or(ExtractError::UnsupportedFormat)
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
