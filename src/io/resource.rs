//! Backing stores for DDDB resources
//!
//! Resources are addressed by slash-separated paths relative to the database
//! root, e.g. `products/MER_RR__1P.dd` or `mer_rr__1p/Quality_ADS.dd`.

use crate::types::{EnvisatError, EnvisatResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read-only source of DDDB tables
pub trait ResourceStore: Send + Sync {
    /// Full text of the resource at `path`
    fn read(&self, path: &str) -> EnvisatResult<String>;

    /// Non-failing existence check
    fn exists(&self, path: &str) -> bool;

    /// Human readable location for log messages
    fn describe(&self) -> String;
}

/// DDDB tables stored as files below a root directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl ResourceStore for DirectoryStore {
    fn read(&self, path: &str) -> EnvisatResult<String> {
        let file_path = self.resolve(path);
        log::debug!("DDDB: reading resource file '{}'", file_path.display());
        std::fs::read_to_string(&file_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EnvisatError::SchemaNotFound(format!(
                "missing file: {}",
                file_path.display()
            )),
            _ => EnvisatError::Io(e),
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// DDDB tables held in memory, keyed by resource path
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resources: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.resources.insert(path.into(), content.into());
    }

    pub fn with(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }
}

impl ResourceStore for MemoryStore {
    fn read(&self, path: &str) -> EnvisatResult<String> {
        self.resources
            .get(path)
            .cloned()
            .ok_or_else(|| EnvisatError::SchemaNotFound(format!("missing resource: {}", path)))
    }

    fn exists(&self, path: &str) -> bool {
        self.resources.contains_key(path)
    }

    fn describe(&self) -> String {
        format!("<memory: {} resources>", self.resources.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_store_reads_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("products")).unwrap();
        std::fs::write(dir.path().join("products/TST_1P.dd"), "TST_1P|test\n").unwrap();

        let store = DirectoryStore::new(dir.path());
        assert!(store.exists("products/TST_1P.dd"));
        assert!(!store.exists("products/TST_2P.dd"));
        assert_eq!(store.read("products/TST_1P.dd").unwrap(), "TST_1P|test\n");
        assert!(matches!(
            store.read("products/TST_2P.dd"),
            Err(EnvisatError::SchemaNotFound(_))
        ));
    }
}
