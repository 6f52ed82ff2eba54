use super::forge_modern::parse_mods_toml;
use super::{JarArchive, ModLoader, ParsedManifest};
use crate::error::ExtractError;
use crate::models::LoaderType;

pub const NEOFORGE_MARKER: &str = "META-INF/neoforge.mods.toml";

pub struct NeoForgeLoader;

impl ModLoader for NeoForgeLoader {
    fn loader_type(&self) -> LoaderType {
        LoaderType::NeoForge
    }

    fn marker(&self) -> &'static str {
        NEOFORGE_MARKER
    }

    fn parse(&self, archive: &mut JarArchive) -> Result<ParsedManifest, ExtractError> {
        parse_mods_toml(archive, NEOFORGE_MARKER, LoaderType::NeoForge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::archive::test_support::jar_bytes;

    #[test]
    fn test_typed_dependencies() {
        let toml_text = r#"
[[mods]]
modId = "sophisticatedcore"
version = "${file.jarVersion}"

[[dependencies.sophisticatedcore]]
modId = "neoforge"
type = "required"
versionRange = "[21.0,)"

[[dependencies.sophisticatedcore]]
modId = "curios"
type = "optional"
versionRange = "[9.0,)"

[[dependencies.sophisticatedcore]]
modId = "oldmod"
type = "incompatible"
"#;
        let mut jar =
            JarArchive::from_bytes(jar_bytes(&[(NEOFORGE_MARKER, toml_text.as_bytes())])).unwrap();
        let parsed = NeoForgeLoader.parse(&mut jar).unwrap();

        assert_eq!(parsed.loader_type, LoaderType::NeoForge);
        assert_eq!(parsed.version.as_deref(), Some("${file.jarVersion}"));
        let ids: Vec<_> = parsed.dependencies.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["neoforge", "curios"]);
        assert!(!parsed.dependencies[1].required);
    }
}
