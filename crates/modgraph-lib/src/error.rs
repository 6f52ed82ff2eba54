use std::path::PathBuf;

/// Reasons a single archive could not be turned into metadata.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a valid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No supported mod manifest found in archive")]
    UnsupportedFormat,

    #[error("Failed to parse {file}: {message}")]
    InvalidManifest { file: String, message: String },

    #[error("Manifest {file} does not declare a mod id")]
    MissingModId { file: String },

    #[error("Archive entry {name} is larger than {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("Embedded archive nesting exceeds depth {max_depth}")]
    NestingTooDeep { max_depth: usize },
}

impl ExtractError {
    pub fn invalid(file: &str, message: impl std::fmt::Display) -> Self {
        ExtractError::InvalidManifest {
            file: file.to_string(),
            message: message.to_string(),
        }
    }
}

/// Splits failures the scan can skip past from ones that must stop it.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Archive(#[from] ExtractError),

    #[error(transparent)]
    Storage(anyhow::Error),
}

impl CacheError {
    pub fn is_archive_error(&self) -> bool {
        matches!(self, CacheError::Archive(_))
    }
}
