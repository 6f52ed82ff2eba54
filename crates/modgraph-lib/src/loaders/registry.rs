use chrono::Utc;
use std::path::{Path, PathBuf};

use super::fabric::FabricLoader;
use super::forge_legacy::ForgeLegacyLoader;
use super::forge_modern::ForgeModernLoader;
use super::icon::{find_icon, DefaultIcon};
use super::manifest::{parse_main_attributes, MANIFEST_PATH};
use super::neoforge::NeoForgeLoader;
use super::{is_platform_dependency, JarArchive, ModLoader, ParsedManifest};
use crate::error::ExtractError;
use crate::models::{Dependency, ModIdentity, ModMetadata};

const EMBEDDED_JAR_DIRS: [&str; 2] = ["META-INF/jars/", "META-INF/jarjar/"];
const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// How many jar-in-jar levels are opened below the scanned archive.
    pub max_embed_depth: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { max_embed_depth: 4 }
    }
}

/// Detects the manifest dialect of an archive and turns it into [`ModMetadata`].
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn ModLoader>>,
    default_icon: DefaultIcon,
    options: ExtractOptions,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new(DefaultIcon::bundled(), ExtractOptions::default())
    }
}

impl LoaderRegistry {
    /// NeoForge is checked before Forge because NeoForge jars may carry both manifests.
    pub fn new(default_icon: DefaultIcon, options: ExtractOptions) -> Self {
        Self {
            loaders: vec![
                Box::new(FabricLoader),
                Box::new(NeoForgeLoader),
                Box::new(ForgeModernLoader),
                Box::new(ForgeLegacyLoader),
            ],
            default_icon,
            options,
        }
    }

    pub fn detect(&self, archive: &JarArchive) -> Option<&dyn ModLoader> {
        self.loaders
            .iter()
            .find(|l| l.can_handle(archive))
            .map(|l| l.as_ref())
    }

    pub fn extract_file(&self, path: &Path, hash: &str) -> Result<ModMetadata, ExtractError> {
        let mut archive = JarArchive::open(path)?;
        let mut metadata = self.extract_at_depth(&mut archive, 0)?;
        metadata.hash = hash.to_string();
        metadata.file_path = path.to_path_buf();
        log::debug!(
            "[LoaderRegistry] Extracted {} {} ({}) from {:?}",
            metadata.id,
            metadata.version,
            metadata.loader_type,
            path
        );
        Ok(metadata)
    }

    fn extract_at_depth(
        &self,
        archive: &mut JarArchive,
        depth: usize,
    ) -> Result<ModMetadata, ExtractError> {
        let loader = self.detect(archive).ok_or(ExtractError::UnsupportedFormat)?;
        let parsed = loader.parse(archive)?;

        let version = resolve_version(archive, parsed.version.clone());
        let icon_data = find_icon(archive, &parsed.id, parsed.icon_path.as_deref())
            .unwrap_or_else(|| self.default_icon.data_uri().to_string());
        let embedded = self.collect_embedded(archive, &parsed, depth);
        let dependencies = normalize_dependencies(&parsed);

        let now = Utc::now();
        Ok(ModMetadata {
            name: parsed.name.clone().unwrap_or_else(|| parsed.id.clone()),
            id: parsed.id,
            version,
            hash: String::new(),
            description: parsed.description.unwrap_or_default(),
            authors: parsed.authors,
            loader_type: parsed.loader_type,
            environment: parsed.environment,
            icon_data: Some(icon_data),
            dependencies,
            embedded,
            raw_manifest: parsed.raw_manifest,
            file_path: PathBuf::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Identities of every mod bundled below this archive. Nested failures never fail the parent.
    fn collect_embedded(
        &self,
        archive: &mut JarArchive,
        parsed: &ParsedManifest,
        depth: usize,
    ) -> Vec<ModIdentity> {
        let mut candidates: Vec<String> = Vec::new();
        for dir in EMBEDDED_JAR_DIRS {
            candidates.extend(archive.entries_matching(dir, ".jar"));
        }
        for declared in &parsed.nested_jars {
            if !candidates.contains(declared) {
                candidates.push(declared.clone());
            }
        }

        let mut embedded: Vec<ModIdentity> = Vec::new();
        if !candidates.is_empty() && depth >= self.options.max_embed_depth {
            log::warn!(
                "[LoaderRegistry] Not opening {} nested jar(s) in {}: {}",
                candidates.len(),
                parsed.id,
                ExtractError::NestingTooDeep {
                    max_depth: self.options.max_embed_depth
                }
            );
            candidates.clear();
        }

        for entry in candidates {
            match self.extract_nested(archive, &entry, depth + 1) {
                Ok(Some(child)) => {
                    push_unique(&mut embedded, child.identity());
                    for grandchild in child.embedded {
                        push_unique(&mut embedded, grandchild);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!(
                        "[LoaderRegistry] Skipping nested jar {} in {}: {}",
                        entry,
                        parsed.id,
                        e
                    );
                }
            }
        }

        for declared in &parsed.declared_embedded {
            push_unique(&mut embedded, declared.clone());
        }
        embedded
    }

    /// `Ok(None)` for nested jars that are plain libraries without a mod manifest.
    fn extract_nested(
        &self,
        archive: &mut JarArchive,
        entry: &str,
        depth: usize,
    ) -> Result<Option<ModMetadata>, ExtractError> {
        let Some(bytes) = archive.read_bytes(entry)? else {
            return Ok(None);
        };
        let mut nested = JarArchive::from_bytes(bytes)?;
        if self.detect(&nested).is_none() {
            return Ok(None);
        }
        self.extract_at_depth(&mut nested, depth).map(Some)
    }
}

fn push_unique(list: &mut Vec<ModIdentity>, identity: ModIdentity) {
    if !list.iter().any(|m| m.id == identity.id) {
        list.push(identity);
    }
}

/// Build tools leave `${file.jarVersion}` style placeholders; the jar manifest
/// usually carries the substituted value.
fn resolve_version(archive: &mut JarArchive, declared: Option<String>) -> String {
    match declared {
        Some(v) if !v.contains("${") => v,
        _ => archive
            .read_string(MANIFEST_PATH)
            .ok()
            .flatten()
            .and_then(|text| {
                parse_main_attributes(&text)
                    .remove("Implementation-Version")
                    .filter(|v| !v.is_empty() && !v.contains("${"))
            })
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
    }
}

/// Drops platform pseudo-mods and self references, merging repeated ids.
fn normalize_dependencies(parsed: &ParsedManifest) -> Vec<Dependency> {
    let mut out: Vec<Dependency> = Vec::new();
    for declared in &parsed.dependencies {
        if declared.id.is_empty()
            || declared.id == parsed.id
            || is_platform_dependency(&declared.id)
        {
            continue;
        }
        // Repeated ids merge: required if any declaration requires it, ranges intersected.
        match out.iter_mut().find(|d| d.dependency_id == declared.id) {
            Some(existing) => {
                existing.required |= declared.required;
                existing.version_range = existing.version_range.intersect(&declared.version_range);
            }
            None => out.push(Dependency {
                mod_id: parsed.id.clone(),
                dependency_id: declared.id.clone(),
                required: declared.required,
                version_range: declared.version_range.clone(),
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::archive::test_support::jar_bytes;
    use crate::loaders::DeclaredDependency;
    use crate::models::LoaderType;

    fn fabric_json(id: &str, version: &str, extra: &str) -> String {
        format!(r#"{{"schemaVersion": 1, "id": "{}", "version": "{}"{}}}"#, id, version, extra)
    }

    fn extract(entries: &[(&str, &[u8])]) -> Result<ModMetadata, ExtractError> {
        let registry = LoaderRegistry::default();
        let mut archive = JarArchive::from_bytes(jar_bytes(entries)).unwrap();
        registry.extract_at_depth(&mut archive, 0)
    }

    #[test]
    fn test_detection_order_prefers_neoforge() {
        let registry = LoaderRegistry::default();
        let archive = JarArchive::from_bytes(jar_bytes(&[
            ("META-INF/mods.toml", b"[[mods]]\nmodId=\"a\"\n"),
            ("META-INF/neoforge.mods.toml", b"[[mods]]\nmodId=\"a\"\n"),
        ]))
        .unwrap();
        assert_eq!(
            registry.detect(&archive).map(|l| l.loader_type()),
            Some(LoaderType::NeoForge)
        );
    }

    #[test]
    fn test_unsupported_archive() {
        assert!(matches!(
            extract(&[("readme.txt", b"hello")]),
            Err(ExtractError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_filters_platform_and_self_dependencies() {
        let json = fabric_json(
            "lithium",
            "0.11.2",
            r#", "depends": {"minecraft": "1.20.x", "fabricloader": ">=0.14", "lithium": "*", "fabric-api": "*"}"#,
        );
        let meta = extract(&[("fabric.mod.json", json.as_bytes())]).unwrap();
        let ids: Vec<_> = meta.dependencies.iter().map(|d| d.dependency_id.as_str()).collect();
        assert_eq!(ids, vec!["fabric-api"]);
        assert_eq!(meta.dependencies[0].mod_id, "lithium");
        assert_eq!(meta.name, "lithium");
    }

    #[test]
    fn test_repeated_dependency_merges() {
        let mut parsed =
            ParsedManifest::new(LoaderType::Fabric, "addon".to_string(), String::new());
        parsed.dependencies = vec![
            DeclaredDependency::new("lib", false, ">=1.2"),
            DeclaredDependency::new("lib", true, "<2.0"),
            DeclaredDependency::new("other", false, ""),
        ];

        let deps = normalize_dependencies(&parsed);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].dependency_id, "lib");
        assert!(deps[0].required);
        assert_eq!(deps[0].version_range.format(), "[1.2,2.0)");
        assert!(!deps[1].required);
    }

    #[test]
    fn test_placeholder_version_uses_jar_manifest() {
        let toml_text = b"[[mods]]\nmodId=\"ae2\"\nversion=\"${file.jarVersion}\"\n";
        let meta = extract(&[
            ("META-INF/mods.toml", toml_text),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\nImplementation-Version: 15.0.4\n"),
        ])
        .unwrap();
        assert_eq!(meta.version, "15.0.4");

        let meta = extract(&[("META-INF/mods.toml", toml_text)]).unwrap();
        assert_eq!(meta.version, "unknown");
    }

    #[test]
    fn test_default_icon_fallback() {
        let json = fabric_json("plain", "1.0", "");
        let meta = extract(&[("fabric.mod.json", json.as_bytes())]).unwrap();
        assert_eq!(meta.icon_data.as_deref(), Some(DefaultIcon::bundled().data_uri()));

        let meta = extract(&[
            ("fabric.mod.json", json.as_bytes()),
            ("assets/plain/icon.png", b"x"),
        ])
        .unwrap();
        assert_eq!(meta.icon_data.as_deref(), Some("data:image/png;base64,eA=="));
    }

    #[test]
    fn test_embedded_jars_are_flattened() {
        let leaf_json = fabric_json("leaf", "0.1", "");
        let leaf = jar_bytes(&[("fabric.mod.json", leaf_json.as_bytes())]);
        let middle_json = fabric_json("middle", "0.2", "");
        let middle = jar_bytes(&[
            ("fabric.mod.json", middle_json.as_bytes()),
            ("META-INF/jars/leaf.jar", &leaf),
        ]);
        let library = jar_bytes(&[("com/example/Lib.class", b"\xca\xfe")]);
        let outer_json = fabric_json(
            "outer",
            "1.0",
            r#", "jars": [{"file": "META-INF/jars/middle.jar"}, {"file": "nested/declared.jar", "id": "declared", "version": "3.0"}]"#,
        );
        let meta = extract(&[
            ("fabric.mod.json", outer_json.as_bytes()),
            ("META-INF/jars/middle.jar", &middle),
            ("META-INF/jarjar/library.jar", &library),
        ])
        .unwrap();

        let ids: Vec<_> = meta.embedded.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["middle", "leaf", "declared"]);
    }

    #[test]
    fn test_embed_depth_is_bounded() {
        let leaf_json = fabric_json("leaf", "0.1", "");
        let leaf = jar_bytes(&[("fabric.mod.json", leaf_json.as_bytes())]);
        let outer_json = fabric_json("outer", "1.0", "");
        let registry = LoaderRegistry::new(
            DefaultIcon::bundled(),
            ExtractOptions { max_embed_depth: 0 },
        );
        let mut archive = JarArchive::from_bytes(jar_bytes(&[
            ("fabric.mod.json", outer_json.as_bytes()),
            ("META-INF/jars/leaf.jar", &leaf),
        ]))
        .unwrap();
        let meta = registry.extract_at_depth(&mut archive, 0).unwrap();
        assert!(meta.embedded.is_empty());
    }
}
