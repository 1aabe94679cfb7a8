use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ImageRecord;

/// The persisted aggregate: every indexed image keyed by absolute path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibraryCache {
    pub updated: f64,
    pub images: BTreeMap<PathBuf, ImageRecord>,
}

impl LibraryCache {
    pub fn new(updated: f64) -> Self {
        Self {
            updated,
            images: BTreeMap::new(),
        }
    }

    pub fn get(&self, path: &Path) -> Option<&ImageRecord> {
        self.images.get(path)
    }

    pub fn upsert(&mut self, record: ImageRecord) {
        self.images.insert(record.path.clone(), record);
    }

    /// Drops every record for which `exists` is false; returns how many went.
    pub fn prune<F>(&mut self, mut exists: F) -> usize
    where
        F: FnMut(&Path) -> bool,
    {
        let before = self.images.len();
        self.images.retain(|path, _| exists(path));
        before - self.images.len()
    }

    /// Records under any of `roots`, sorted by path.
    pub fn snapshot_under<'a, I>(&self, roots: I) -> LibrarySnapshot
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let roots: Vec<&Path> = roots.into_iter().collect();
        let images = self
            .images
            .values()
            .filter(|record| roots.iter().any(|root| record.path.starts_with(root)))
            .cloned()
            .collect();
        LibrarySnapshot { images }
    }
}

/// Immutable view of the library handed to consumers of the index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibrarySnapshot {
    pub images: Vec<ImageRecord>,
}

impl LibrarySnapshot {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn find(&self, path: &Path) -> Option<&ImageRecord> {
        self.images.iter().find(|record| record.path == path)
    }
}
