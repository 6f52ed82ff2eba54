use serde::Deserialize;
use std::collections::BTreeMap;

use super::{non_empty, read_marker, DeclaredDependency, JarArchive, ModLoader, ParsedManifest};
use crate::error::ExtractError;
use crate::models::{Environment, LoaderType, ModIdentity};

pub const FABRIC_MARKER: &str = "fabric.mod.json";

#[derive(Debug, Deserialize)]
struct FabricModJson {
    id: Option<String>,
    version: Option<String>,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    authors: Vec<FabricPerson>,
    environment: Option<String>,
    icon: Option<FabricIcon>,
    #[serde(default)]
    depends: BTreeMap<String, VersionMatcher>,
    #[serde(default)]
    recommends: BTreeMap<String, VersionMatcher>,
    #[serde(default)]
    suggests: BTreeMap<String, VersionMatcher>,
    #[serde(default)]
    jars: Vec<FabricJar>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FabricPerson {
    Name(String),
    Detailed { name: String },
}

impl FabricPerson {
    fn name(&self) -> &str {
        match self {
            FabricPerson::Name(n) => n,
            FabricPerson::Detailed { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FabricIcon {
    Path(String),
    Sized(BTreeMap<String, String>),
}

impl FabricIcon {
    /// Largest size wins for size-keyed icon maps.
    fn best_path(&self) -> Option<String> {
        match self {
            FabricIcon::Path(p) => Some(p.clone()),
            FabricIcon::Sized(sizes) => sizes
                .iter()
                .max_by_key(|(size, _)| size.parse::<u32>().unwrap_or(0))
                .map(|(_, path)| path.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionMatcher {
    Single(String),
    Any(Vec<String>),
}

impl VersionMatcher {
    fn range(&self) -> &str {
        match self {
            VersionMatcher::Single(s) => s,
            VersionMatcher::Any(list) => list.first().map(String::as_str).unwrap_or("*"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FabricJar {
    file: String,
    id: Option<String>,
    version: Option<String>,
}

pub struct FabricLoader;

impl ModLoader for FabricLoader {
    fn loader_type(&self) -> LoaderType {
        LoaderType::Fabric
    }

    fn marker(&self) -> &'static str {
        FABRIC_MARKER
    }

    fn parse(&self, archive: &mut JarArchive) -> Result<ParsedManifest, ExtractError> {
        let raw = read_marker(archive, FABRIC_MARKER)?;
        let manifest: FabricModJson =
            serde_json::from_str(&raw).map_err(|e| ExtractError::invalid(FABRIC_MARKER, e))?;

        let id = non_empty(manifest.id).ok_or_else(|| ExtractError::MissingModId {
            file: FABRIC_MARKER.to_string(),
        })?;

        let mut parsed = ParsedManifest::new(LoaderType::Fabric, id, raw);
        parsed.version = non_empty(manifest.version);
        parsed.name = non_empty(manifest.name);
        parsed.description = non_empty(manifest.description);
        parsed.authors = manifest
            .authors
            .iter()
            .map(|p| p.name().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        parsed.environment = match manifest.environment.as_deref().map(str::trim) {
            Some("client") => Environment::Client,
            Some("server") => Environment::Server,
            _ => Environment::Both,
        };
        parsed.icon_path = manifest.icon.as_ref().and_then(FabricIcon::best_path);

        for (dep_id, matcher) in &manifest.depends {
            parsed
                .dependencies
                .push(DeclaredDependency::new(dep_id, true, matcher.range()));
        }
        for (dep_id, matcher) in manifest.recommends.iter().chain(manifest.suggests.iter()) {
            parsed
                .dependencies
                .push(DeclaredDependency::new(dep_id, false, matcher.range()));
        }

        for jar in manifest.jars {
            parsed.nested_jars.push(jar.file.trim_start_matches('/').to_string());
            if let (Some(id), Some(version)) = (non_empty(jar.id), non_empty(jar.version)) {
                parsed.declared_embedded.push(ModIdentity { id, version });
            }
        }

        Ok(parsed)
    }
}
