use anyhow::{Context, Result};
use base64::Engine;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;

use super::archive::JarArchive;

static BUNDLED_ICON: &[u8] = include_bytes!("../../assets/default_icon.png");

static BUNDLED_ICON_URI: Lazy<Arc<str>> =
    Lazy::new(|| Arc::from(encode_data_uri("default_icon.png", BUNDLED_ICON)));

/// Icon assigned to mods that do not ship one of their own.
#[derive(Debug, Clone)]
pub struct DefaultIcon {
    data_uri: Arc<str>,
}

impl DefaultIcon {
    pub fn bundled() -> Self {
        Self {
            data_uri: BUNDLED_ICON_URI.clone(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Read default icon {:?}", path))?;
        let name = path.to_string_lossy();
        Ok(Self {
            data_uri: Arc::from(encode_data_uri(&name, &bytes)),
        })
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}

impl Default for DefaultIcon {
    fn default() -> Self {
        Self::bundled()
    }
}

fn mime_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

pub fn encode_data_uri(name: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_for(name),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

fn probe_paths(mod_id: &str) -> Vec<String> {
    vec![
        format!("{}.png", mod_id),
        "logo.png".to_string(),
        "icon.png".to_string(),
        "pack.png".to_string(),
        format!("assets/{}/icon.png", mod_id),
        format!("assets/{}/logo.png", mod_id),
        format!("assets/{}/pack.png", mod_id),
        format!("assets/{}/textures/logo.png", mod_id),
    ]
}

/// Looks for the manifest's declared icon first, then the usual locations.
/// Returns `None` when the archive has no usable image.
pub fn find_icon(archive: &mut JarArchive, mod_id: &str, declared: Option<&str>) -> Option<String> {
    let mut candidates = Vec::new();
    if let Some(declared) = declared {
        let cleaned = declared.trim().trim_start_matches("./").trim_start_matches('/');
        if !cleaned.is_empty() {
            candidates.push(cleaned.to_string());
        }
    }
    candidates.extend(probe_paths(mod_id));

    for candidate in candidates {
        let Some(entry) = archive.find_case_insensitive(&candidate).map(str::to_owned) else {
            continue;
        };
        match archive.read_bytes(&entry) {
            Ok(Some(bytes)) if !bytes.is_empty() => {
                return Some(encode_data_uri(&entry, &bytes));
            }
            Ok(_) => {}
            Err(e) => log::debug!("[Icon] Failed to read {} for {}: {}", entry, mod_id, e),
        }
    }
    None
}
