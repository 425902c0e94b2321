//! File formats for [`FileStore`](crate::store::FileStore)

use crate::error::{Error, Result};
use crate::security;
use serde::{Serialize, de::DeserializeOwned};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Document encoding used by the file store
///
/// Reads and writes are blocking; the store runs them off the async executor.
pub trait FileFormat: Clone + Send + Sync + 'static {
    /// File extension for this format (e.g., "json", "toml")
    fn extension(&self) -> &str;

    /// Serialize data to string
    ///
    /// # Errors
    ///
    /// Returns an error if `data` cannot be represented in this format.
    fn serialize<T: Serialize>(&self, data: &T) -> Result<String>;

    /// Deserialize data from string
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is malformed.
    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T>;

    /// Read and deserialize from file; `Ok(None)` if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns `Error::FileRead` on I/O failure, or a parse error.
    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        self.deserialize(&content).map(Some)
    }

    /// Serialize and write to file
    ///
    /// Uses atomic write: writes to a uniquely named temp file in the same
    /// directory, then renames it over `path`. The file is restricted to its
    /// owner before it becomes visible under `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileWrite` if the temp file cannot be written or renamed.
    fn write<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let content = self.serialize(data)?;

        if path.file_name().is_none() {
            return Err(Error::Config(format!(
                "Invalid path '{}': must have a filename",
                path.display()
            )));
        }
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let write_err = |source| Error::FileWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
        temp.write_all(content.as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        security::set_secure_file_permissions(temp.path())?;

        temp.persist(path).map(|_| ()).map_err(|e| write_err(e.error))
    }
}

// =============================================================================
// JSON
// =============================================================================

/// JSON file format (default)
#[derive(Debug, Clone, Default)]
pub struct JsonFormat {
    /// Pretty print JSON output
    pretty: bool,
}

impl JsonFormat {
    /// Create a JSON format with pretty printing enabled
    #[must_use]
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Create a compact JSON format (no pretty printing)
    #[must_use]
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl FileFormat for JsonFormat {
    fn extension(&self) -> &str {
        "json"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(data).map_err(Error::from)
        } else {
            serde_json::to_string(data).map_err(Error::from)
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_json::from_str(content).map_err(Error::from)
    }
}

// =============================================================================
// TOML
// =============================================================================

/// TOML file format
#[cfg(feature = "toml")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFormat;

#[cfg(feature = "toml")]
impl FileFormat for TomlFormat {
    fn extension(&self) -> &str {
        "toml"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        toml::to_string_pretty(data).map_err(|e| Error::Parse(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        toml::from_str(content).map_err(|e| Error::Parse(e.to_string()))
    }
}

// =============================================================================
// YAML
// =============================================================================

/// YAML file format
#[cfg(feature = "yaml")]
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormat;

#[cfg(feature = "yaml")]
impl FileFormat for YamlFormat {
    fn extension(&self) -> &str {
        "yaml"
    }

    fn serialize<T: Serialize>(&self, data: &T) -> Result<String> {
        serde_yaml::to_string(data).map_err(|e| Error::Parse(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, content: &str) -> Result<T> {
        serde_yaml::from_str(content).map_err(|e| Error::Parse(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
