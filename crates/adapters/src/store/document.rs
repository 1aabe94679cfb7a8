use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tagshelf_domain::{Dimensions, ImageRecord, LibraryCache};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CacheDocument {
    updated: f64,
    images: BTreeMap<PathBuf, CachedImage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedImage {
    tags: Vec<String>,
    size: u64,
    w: i64,
    h: i64,
    mtime: f64,
    ctime: f64,
}

impl CacheDocument {
    /// JSON object keys must be strings, so records whose path is not UTF-8 are left out.
    pub(super) fn from_cache(cache: &LibraryCache) -> Self {
        let images = cache
            .images
            .iter()
            .filter(|(path, _)| {
                let encodable = path.to_str().is_some();
                if !encodable {
                    warn!(path = %path.display(), "not persisting image with a non UTF-8 path");
                }
                encodable
            })
            .map(|(path, record)| {
                (
                    path.clone(),
                    CachedImage {
                        tags: record.tags.iter().cloned().collect(),
                        size: record.byte_size,
                        w: record.dimensions.width,
                        h: record.dimensions.height,
                        mtime: record.mtime,
                        ctime: record.ctime,
                    },
                )
            })
            .collect();
        Self {
            updated: cache.updated,
            images,
        }
    }

    pub(super) fn into_cache(self) -> LibraryCache {
        let images = self
            .images
            .into_iter()
            .map(|(path, image)| {
                let record = ImageRecord {
                    path: path.clone(),
                    tags: image.tags.into_iter().collect(),
                    byte_size: image.size,
                    dimensions: Dimensions::new(image.w, image.h),
                    mtime: image.mtime,
                    ctime: image.ctime,
                };
                (path, record)
            })
            .collect();
        LibraryCache {
            updated: self.updated,
            images,
        }
    }
}
