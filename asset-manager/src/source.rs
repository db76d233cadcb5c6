//! Where encoded sound bytes come from.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::util::{AssetError, Result};

pub trait AssetSource: Send + Sync {
    /// Returns the encoded bytes stored under a catalog path.
    fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

/// Files under a root directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let rel = Path::new(path);
        // catalog paths stay inside the root
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(AssetError::NotFound(path.to_string()));
        }
        let full = self.root.join(rel);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::NotFound(full.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory assets, mostly for tests and demos.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(path.to_string(), bytes);
    }

    /// Number of `fetch` calls served so far, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()))
    }
}
