use serde::Deserialize;

use super::{non_empty, read_marker, DeclaredDependency, JarArchive, ModLoader, ParsedManifest};
use crate::error::ExtractError;
use crate::models::LoaderType;

pub const LEGACY_MARKER: &str = "mcmod.info";

/// mcmod.info is either a bare array or `{"modListVersion": 2, "modList": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum McModInfo {
    List(Vec<LegacyMod>),
    Wrapped {
        #[serde(rename = "modList")]
        mod_list: Vec<LegacyMod>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => split_entries(&s),
            StringOrList::Many(list) => list,
        }
    }
}

/// Splits a scalar list on `;`, and on `,` outside range brackets so `jei@[4.0,5.0)` stays whole.
fn split_entries(s: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if c == ';' || (c == ',' && depth == 0) {
            entries.push(std::mem::take(&mut current));
            depth = 0;
        } else {
            current.push(c);
        }
    }
    entries.push(current);
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
struct LegacyMod {
    modid: Option<String>,
    name: Option<String>,
    description: Option<String>,
    version: Option<String>,
    #[serde(rename = "authorList")]
    author_list: Option<StringOrList>,
    authors: Option<StringOrList>,
    #[serde(rename = "logoFile")]
    logo_file: Option<String>,
    #[serde(rename = "requiredMods")]
    required_mods: Option<StringOrList>,
    dependencies: Option<StringOrList>,
}

/// `required-after:jei@[4.0,)` style entries. A bare `modid@range` is required.
fn parse_dependency(entry: &str) -> Option<DeclaredDependency> {
    let entry = entry.trim();
    let (required, rest) = match entry.split_once(':') {
        Some((prefix, rest)) => match prefix.trim().to_ascii_lowercase().as_str() {
            "required-after" | "required-before" | "required" => (true, rest),
            "after" | "before" => (false, rest),
            _ => (true, entry),
        },
        None => (true, entry),
    };
    let (id, range) = match rest.split_once('@') {
        Some((id, range)) => (id.trim(), range.trim()),
        None => (rest.trim(), ""),
    };
    if id.is_empty() || id == "*" || id.eq_ignore_ascii_case("forge") {
        return None;
    }
    Some(DeclaredDependency::new(id, required, range))
}

pub struct ForgeLegacyLoader;

impl ModLoader for ForgeLegacyLoader {
    fn loader_type(&self) -> LoaderType {
        LoaderType::ForgeLegacy
    }

    fn marker(&self) -> &'static str {
        LEGACY_MARKER
    }

    fn parse(&self, archive: &mut JarArchive) -> Result<ParsedManifest, ExtractError> {
        let raw = read_marker(archive, LEGACY_MARKER)?;
        let info: McModInfo =
            serde_json::from_str(&raw).map_err(|e| ExtractError::invalid(LEGACY_MARKER, e))?;
        let mods = match info {
            McModInfo::List(list) => list,
            McModInfo::Wrapped { mod_list } => mod_list,
        };
        let primary = mods
            .into_iter()
            .next()
            .ok_or_else(|| ExtractError::MissingModId {
                file: LEGACY_MARKER.to_string(),
            })?;
        let id = non_empty(primary.modid).ok_or_else(|| ExtractError::MissingModId {
            file: LEGACY_MARKER.to_string(),
        })?;

        let mut parsed = ParsedManifest::new(LoaderType::ForgeLegacy, id, raw);
        parsed.version = non_empty(primary.version);
        parsed.name = non_empty(primary.name);
        parsed.description = non_empty(primary.description);
        parsed.authors = primary
            .author_list
            .or(primary.authors)
            .map(StringOrList::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .collect();
        parsed.icon_path = non_empty(primary.logo_file);

        let entries = primary
            .required_mods
            .map(StringOrList::into_vec)
            .unwrap_or_default()
            .into_iter()
            .chain(
                primary
                    .dependencies
                    .map(StringOrList::into_vec)
                    .unwrap_or_default(),
            );
        for entry in entries {
            let Some(dep) = parse_dependency(&entry) else {
                continue;
            };
            // requiredMods and dependencies often repeat each other
            match parsed.dependencies.iter_mut().find(|d| d.id == dep.id) {
                Some(existing) => {
                    existing.required |= dep.required;
                    existing.version_range =
                        existing.version_range.intersect(&dep.version_range);
                }
                None => parsed.dependencies.push(dep),
            }
        }

        Ok(parsed)
    }
}
