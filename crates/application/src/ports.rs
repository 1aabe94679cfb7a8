use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tagshelf_domain::{ExtractedMetadata, FileStamp, Icon, LibraryCache};

use crate::{ApplicationError, ExtractionError};

/// Reads tags and pixel dimensions embedded in one image file.
pub trait MetadataReader: Send + Sync {
    fn read_metadata(&self, path: &Path) -> Result<ExtractedMetadata, ExtractionError>;
}

/// Replaces the tag set embedded in one image file.
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, path: &Path, tags: &BTreeSet<String>) -> Result<(), ApplicationError>;
}

pub trait FileScanner: Send + Sync {
    /// Indexable image files below `root`. `on_found` sees the running count.
    fn find_images(
        &self,
        root: &Path,
        on_found: &mut dyn FnMut(usize),
    ) -> Result<Vec<PathBuf>, ApplicationError>;

    fn stat(&self, path: &Path) -> Result<FileStamp, ExtractionError>;

    fn exists(&self, path: &Path) -> bool;
}

/// Whole-document persistence of the library cache.
pub trait CacheStore: Send + Sync {
    /// `None` when no document has been written yet.
    fn load(&self) -> Result<Option<LibraryCache>, ApplicationError>;

    fn save(&self, cache: &LibraryCache) -> Result<(), ApplicationError>;
}

pub trait ThumbnailGenerator: Send + Sync {
    /// Decodes `source`, writes the thumbnail PNG to `target` and returns nothing
    /// on success. `ApplicationError::Decode` means no decoder accepted the file.
    fn generate(
        &self,
        source: &Path,
        canonical_uri: &[u8],
        target: &Path,
    ) -> Result<(), ApplicationError>;

    /// `Ok(None)` when `thumbnail` does not exist.
    fn load_icon(&self, thumbnail: &Path) -> Result<Option<Icon>, ApplicationError>;

    fn failure_icon(&self) -> Icon;
}

pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> f64;
}
