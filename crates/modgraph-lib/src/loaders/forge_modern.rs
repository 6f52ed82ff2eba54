use serde::Deserialize;
use std::collections::BTreeMap;

use super::{non_empty, read_marker, DeclaredDependency, JarArchive, ModLoader, ParsedManifest};
use crate::error::ExtractError;
use crate::models::{Environment, LoaderType};

pub const FORGE_MARKER: &str = "META-INF/mods.toml";

#[derive(Debug, Deserialize)]
struct ModsToml {
    #[serde(default)]
    mods: Vec<TomlMod>,
    dependencies: Option<TomlDependencies>,
    #[serde(rename = "logoFile")]
    logo_file: Option<String>,
    authors: Option<TomlAuthors>,
}

#[derive(Debug, Deserialize)]
struct TomlMod {
    #[serde(rename = "modId")]
    mod_id: Option<String>,
    version: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    description: Option<String>,
    authors: Option<TomlAuthors>,
    #[serde(rename = "logoFile")]
    logo_file: Option<String>,
    #[serde(rename = "displayTest")]
    display_test: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlAuthors {
    Text(String),
    List(Vec<String>),
}

impl TomlAuthors {
    fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TomlAuthors::Text(text) => text.split(',').collect(),
            TomlAuthors::List(list) => list.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// `[[dependencies.<modId>]]` tables, or a flat `[[dependencies]]` array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlDependencies {
    ByMod(BTreeMap<String, Vec<TomlDependency>>),
    Flat(Vec<TomlDependency>),
}

#[derive(Debug, Deserialize)]
struct TomlDependency {
    #[serde(rename = "modId")]
    mod_id: String,
    mandatory: Option<bool>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "versionRange")]
    version_range: Option<String>,
}

impl TomlDependency {
    /// `None` for relations that are not dependencies at all.
    fn required(&self) -> Option<bool> {
        match self.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("required") => Some(true),
            Some("optional") => Some(false),
            Some("incompatible") | Some("discouraged") => None,
            _ => Some(self.mandatory.unwrap_or(true)),
        }
    }
}

/// Shared by Forge and NeoForge, which use the same TOML layout.
pub(crate) fn parse_mods_toml(
    archive: &mut JarArchive,
    marker: &str,
    loader_type: LoaderType,
) -> Result<ParsedManifest, ExtractError> {
    let raw = read_marker(archive, marker)?;
    let manifest: ModsToml =
        toml::from_str(&raw).map_err(|e| ExtractError::invalid(marker, e))?;

    let primary = manifest
        .mods
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::MissingModId {
            file: marker.to_string(),
        })?;
    let id = non_empty(primary.mod_id).ok_or_else(|| ExtractError::MissingModId {
        file: marker.to_string(),
    })?;

    let mut parsed = ParsedManifest::new(loader_type, id, raw);
    parsed.version = non_empty(primary.version);
    parsed.name = non_empty(primary.display_name);
    parsed.description = non_empty(primary.description);
    parsed.authors = primary
        .authors
        .or(manifest.authors)
        .map(|a| a.names())
        .unwrap_or_default();
    parsed.icon_path = non_empty(primary.logo_file).or_else(|| non_empty(manifest.logo_file));
    parsed.environment = match primary.display_test.as_deref() {
        Some("IGNORE_ALL_VERSION") => Environment::Client,
        Some("IGNORE_SERVER_VERSION") => Environment::Server,
        _ => Environment::Both,
    };

    let entries = match manifest.dependencies {
        Some(TomlDependencies::ByMod(mut by_mod)) => match by_mod.remove(&parsed.id) {
            Some(own) => own,
            None => by_mod.into_values().flatten().collect(),
        },
        Some(TomlDependencies::Flat(list)) => list,
        None => Vec::new(),
    };
    for dep in entries {
        let Some(required) = dep.required() else {
            continue;
        };
        parsed.dependencies.push(DeclaredDependency::new(
            &dep.mod_id,
            required,
            dep.version_range.as_deref().unwrap_or(""),
        ));
    }

    Ok(parsed)
}

pub struct ForgeModernLoader;

impl ModLoader for ForgeModernLoader {
    fn loader_type(&self) -> LoaderType {
        LoaderType::ForgeModern
    }

    fn marker(&self) -> &'static str {
        FORGE_MARKER
    }

    /// Early NeoForge releases still shipped `mods.toml`; a dependency on
    /// `neoforge` tells them apart.
    fn parse(&self, archive: &mut JarArchive) -> Result<ParsedManifest, ExtractError> {
        let mut parsed = parse_mods_toml(archive, FORGE_MARKER, LoaderType::ForgeModern)?;
        if parsed
            .dependencies
            .iter()
            .any(|d| d.id.eq_ignore_ascii_case("neoforge"))
        {
            parsed.loader_type = LoaderType::NeoForge;
        }
        Ok(parsed)
    }
}
