use anyhow::{Context, Result};
use directories::ProjectDirs;
use modgraph_lib::loaders::{DefaultIcon, ExtractOptions};
use modgraph_lib::{ScanOptions, ServiceOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "MODGRAPH_CONFIG";
const DATA_DIR_ENV: &str = "MODGRAPH_DATA_DIR";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the metadata store lives.
    pub data_dir: PathBuf,
    /// Store directory name under `data_dir`.
    pub store_dir: String,
    pub archive_extensions: Vec<String>,
    /// 0 uses one worker per core.
    pub worker_threads: usize,
    pub max_embed_depth: usize,
    /// Image used for mods that ship no icon. The bundled icon when unset.
    pub default_icon_path: Option<PathBuf>,
    pub log_level: String,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "ModpackGraph")
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|d| d.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".modgraph"));
        Self {
            data_dir,
            store_dir: "store".to_string(),
            archive_extensions: vec!["jar".to_string()],
            worker_threads: 0,
            max_embed_depth: ExtractOptions::default().max_embed_depth,
            default_icon_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Parse config file {:?}", path))?;
        Ok(config)
    }

    /// `--config`, then `$MODGRAPH_CONFIG`, then the per-user config file if it exists.
    /// `--data-dir` and `$MODGRAPH_DATA_DIR` override the data directory.
    pub fn resolve_config(
        cli_config: Option<PathBuf>,
        cli_data_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            match project_dirs().map(|d| d.config_dir().join(CONFIG_FILE)) {
                Some(path) if path.exists() => Self::load_from_file(path)?,
                _ => Self::default(),
            }
        };

        if let Some(data_dir) = cli_data_dir {
            config.data_dir = data_dir;
        } else if let Ok(env_data_dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(env_data_dir);
        }

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Create data directory {:?}", config.data_dir))?;
        Ok(config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_dir)
    }

    pub fn service_options(&self) -> Result<ServiceOptions> {
        let default_icon = match &self.default_icon_path {
            Some(path) => DefaultIcon::from_file(path)?,
            None => DefaultIcon::bundled(),
        };
        Ok(ServiceOptions {
            scan: ScanOptions {
                extensions: self
                    .archive_extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
                worker_threads: self.worker_threads,
            },
            extract: ExtractOptions {
                max_embed_depth: self.max_embed_depth,
            },
            default_icon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let json = r#"{"worker_threads": 3, "archive_extensions": [".JAR", "zip"]}"#;
        std::fs::write(&path, json).unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.max_embed_depth, 4);

        let options = config.service_options().unwrap();
        assert_eq!(options.scan.extensions, vec!["jar", "zip"]);
    }

    #[test]
    fn test_cli_data_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        let data = dir.path().join("data");

        let config = AppConfig::resolve_config(Some(path), Some(data.clone())).unwrap();
        assert_eq!(config.data_dir, data);
        assert!(data.is_dir());
        assert_eq!(config.store_path(), data.join("store"));
    }
}
