use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tagshelf_application::{ApplicationError, ExtractionError, FileScanner};
use tagshelf_domain::{identify_image_kind, is_indexable, FileStamp, ImageKind, MAGIC_LEN};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct WalkdirFileScanner;

impl FileScanner for WalkdirFileScanner {
    fn find_images(
        &self,
        root: &Path,
        on_found: &mut dyn FnMut(usize),
    ) -> Result<Vec<PathBuf>, ApplicationError> {
        if !root.is_dir() {
            warn!(root = %root.display(), "library directory does not exist, skipping");
            return Ok(Vec::new());
        }
        let root = root
            .canonicalize()
            .map_err(|error| ApplicationError::Io(format!("{}: {error}", root.display())))?;

        let mut found = Vec::new();
        for entry in WalkDir::new(&root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    debug!(%error, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_indexable(entry.path()) {
                continue;
            }
            if entry.path().to_str().is_none() {
                warn!(path = %entry.path().display(), "skipping image with a non UTF-8 path");
                continue;
            }
            found.push(entry.into_path());
            on_found(found.len());
        }
        Ok(found)
    }

    fn stat(&self, path: &Path) -> Result<FileStamp, ExtractionError> {
        let metadata = fs::metadata(path)
            .map_err(|error| ExtractionError::Transient(format!("{}: {error}", path.display())))?;
        Ok(FileStamp {
            byte_size: metadata.len(),
            mtime: metadata.modified().map(epoch_seconds).unwrap_or_default(),
            ctime: change_time(&metadata),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Real format of `path` judged by its leading bytes.
pub fn sniff_image_kind(path: &Path) -> ImageKind {
    let mut head = Vec::with_capacity(MAGIC_LEN);
    match File::open(path).and_then(|file| file.take(MAGIC_LEN as u64).read_to_end(&mut head)) {
        Ok(_) => identify_image_kind(&head),
        Err(error) => {
            debug!(path = %path.display(), %error, "cannot read file header");
            ImageKind::Unsupported
        }
    }
}

pub(crate) fn epoch_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

#[cfg(unix)]
fn change_time(metadata: &fs::Metadata) -> f64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ctime() as f64 + metadata.ctime_nsec() as f64 / 1e9
}

#[cfg(not(unix))]
fn change_time(metadata: &fs::Metadata) -> f64 {
    metadata.created().map(epoch_seconds).unwrap_or_default()
}
