use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

use crate::error::ExtractError;

/// Largest entry a mod archive may hold once decompressed.
pub const MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// Initial buffer size, since the size an entry declares is not trusted.
const INITIAL_CAPACITY: u64 = 1024 * 1024;

/// A mod archive held in memory so nested jars can be opened the same way as files on disk.
pub struct JarArchive {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    names: Vec<String>,
}

impl JarArchive {
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let bytes = fs::read(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ExtractError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        let names = archive.file_names().map(str::to_owned).collect();
        Ok(Self { archive, names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Actual entry name matching `name` ignoring ASCII case.
    pub fn find_case_insensitive(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// File entries whose name starts with `prefix` and ends with `suffix`, in archive order.
    pub fn entries_matching(&self, prefix: &str, suffix: &str) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| !n.ends_with('/') && n.starts_with(prefix))
            .filter(|n| n.to_ascii_lowercase().ends_with(suffix))
            .cloned()
            .collect()
    }

    pub fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, ExtractError> {
        if !self.contains(name) {
            return Ok(None);
        }
        let file = self.archive.by_name(name)?;
        let declared = file.size();
        read_limited(file, name, declared, MAX_ENTRY_BYTES).map(Some)
    }

    /// Reads a text entry, dropping a UTF-8 byte order mark. Invalid UTF-8 is replaced
    /// rather than rejected since older manifests are frequently Latin-1.
    pub fn read_string(&mut self, name: &str) -> Result<Option<String>, ExtractError> {
        Ok(self.read_bytes(name)?.map(|bytes| {
            let text = String::from_utf8_lossy(&bytes);
            text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
        }))
    }
}

/// Reads at most `limit` bytes from `reader`. Longer entries fail instead of growing the buffer.
fn read_limited<R: Read>(
    reader: R,
    name: &str,
    declared: u64,
    limit: u64,
) -> Result<Vec<u8>, ExtractError> {
    let mut buf = Vec::with_capacity(declared.min(limit).min(INITIAL_CAPACITY) as usize);
    reader
        .take(limit + 1)
        .read_to_end(&mut buf)
        .map_err(|e| ExtractError::invalid(name, e))?;
    if buf.len() as u64 > limit {
        return Err(ExtractError::EntryTooLarge {
            name: name.to_string(),
            limit,
        });
    }
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Builds an in-memory jar from `(name, contents)` pairs.
    pub fn jar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}
