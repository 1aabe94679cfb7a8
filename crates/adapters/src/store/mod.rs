mod document;

use std::fs;
use std::path::{Path, PathBuf};

use tagshelf_application::{ApplicationError, CacheStore};
use tagshelf_domain::LibraryCache;
use tracing::{debug, warn};

use document::CacheDocument;

/// The library cache as one JSON document, rewritten wholesale on save.
#[derive(Debug, Clone)]
pub struct JsonCacheStore {
    path: PathBuf,
}

impl JsonCacheStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonCacheStore {
    fn load(&self) -> Result<Option<LibraryCache>, ApplicationError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cache document");
                return Ok(None);
            }
            Err(error) => {
                return Err(ApplicationError::Io(format!(
                    "{}: {error}",
                    self.path.display()
                )))
            }
        };

        match serde_json::from_slice::<CacheDocument>(&bytes) {
            Ok(document) => Ok(Some(document.into_cache())),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "cache document unreadable, rebuilding");
                Ok(None)
            }
        }
    }

    fn save(&self, cache: &LibraryCache) -> Result<(), ApplicationError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|error| ApplicationError::Io(error.to_string()))?;
            }
        }

        let bytes = serde_json::to_vec(&CacheDocument::from_cache(cache))
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes)
            .map_err(|error| ApplicationError::Io(format!("{}: {error}", staging.display())))?;
        fs::rename(&staging, &self.path)
            .map_err(|error| ApplicationError::Io(format!("{}: {error}", self.path.display())))?;
        debug!(path = %self.path.display(), images = cache.images.len(), "cache saved");
        Ok(())
    }
}
