use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tagshelf_domain::{
    Dimensions, ExtractedMetadata, FileStamp, Icon, IconKind, ImageRecord, LibraryCache,
};

use crate::{
    ApplicationError, CacheStore, Clock, ExtractionError, FileScanner, MetadataReader, TagWriter,
    ThumbnailGenerator,
};

pub fn tags(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn record(path: &str, names: &[&str]) -> ImageRecord {
    ImageRecord {
        path: PathBuf::from(path),
        tags: tags(names),
        byte_size: 100,
        dimensions: Dimensions::new(4, 3),
        mtime: 10.0,
        ctime: 10.0,
    }
}

/// In-memory filesystem: path to stat, grouped under whatever root prefixes them.
#[derive(Default)]
pub struct FakeScanner {
    pub files: Mutex<BTreeMap<PathBuf, FileStamp>>,
}

impl FakeScanner {
    pub fn with_files(files: &[(&str, u64, f64)]) -> Self {
        let scanner = Self::default();
        for (path, size, mtime) in files {
            scanner.put(path, *size, *mtime);
        }
        scanner
    }

    pub fn put(&self, path: &str, byte_size: u64, mtime: f64) {
        self.files.lock().expect("files").insert(
            PathBuf::from(path),
            FileStamp {
                byte_size,
                mtime,
                ctime: mtime,
            },
        );
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().expect("files").remove(Path::new(path));
    }
}

impl FileScanner for FakeScanner {
    fn find_images(
        &self,
        root: &Path,
        on_found: &mut dyn FnMut(usize),
    ) -> Result<Vec<PathBuf>, ApplicationError> {
        let found: Vec<PathBuf> = self
            .files
            .lock()
            .expect("files")
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect();
        for count in 1..=found.len() {
            on_found(count);
        }
        Ok(found)
    }

    fn stat(&self, path: &Path) -> Result<FileStamp, ExtractionError> {
        self.files
            .lock()
            .expect("files")
            .get(path)
            .copied()
            .ok_or_else(|| ExtractionError::Transient(format!("{} vanished", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files").contains_key(path)
    }
}

#[derive(Default)]
pub struct FakeReader {
    pub metadata: Mutex<HashMap<PathBuf, Result<ExtractedMetadata, ExtractionError>>>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeReader {
    pub fn set(&self, path: &str, names: &[&str]) {
        self.metadata.lock().expect("metadata").insert(
            PathBuf::from(path),
            Ok(ExtractedMetadata {
                tags: tags(names),
                dimensions: Dimensions::new(640, 480),
            }),
        );
    }

    pub fn fail(&self, path: &str, error: ExtractionError) {
        self.metadata
            .lock()
            .expect("metadata")
            .insert(PathBuf::from(path), Err(error));
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().expect("calls").clone()
    }
}

impl MetadataReader for FakeReader {
    fn read_metadata(&self, path: &Path) -> Result<ExtractedMetadata, ExtractionError> {
        self.calls.lock().expect("calls").push(path.to_path_buf());
        self.metadata
            .lock()
            .expect("metadata")
            .get(path)
            .cloned()
            .unwrap_or_else(|| Ok(ExtractedMetadata::default()))
    }
}

#[derive(Default)]
pub struct FakeWriter {
    pub written: Mutex<Vec<(PathBuf, BTreeSet<String>)>>,
    pub fail_on: Mutex<Option<PathBuf>>,
}

impl FakeWriter {
    pub fn failing_on(path: &str) -> Self {
        let writer = Self::default();
        *writer.fail_on.lock().expect("fail_on") = Some(PathBuf::from(path));
        writer
    }
}

impl TagWriter for FakeWriter {
    fn write_tags(&self, path: &Path, tags: &BTreeSet<String>) -> Result<(), ApplicationError> {
        if self.fail_on.lock().expect("fail_on").as_deref() == Some(path) {
            return Err(ApplicationError::TagWrite {
                path: path.to_path_buf(),
                message: "read-only file".to_string(),
            });
        }
        self.written
            .lock()
            .expect("written")
            .push((path.to_path_buf(), tags.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub document: Mutex<Option<LibraryCache>>,
    pub saves: Mutex<usize>,
}

impl FakeStore {
    pub fn with(cache: LibraryCache) -> Self {
        Self {
            document: Mutex::new(Some(cache)),
            saves: Mutex::new(0),
        }
    }

    pub fn current(&self) -> Option<LibraryCache> {
        self.document.lock().expect("document").clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().expect("saves")
    }
}

impl CacheStore for FakeStore {
    fn load(&self) -> Result<Option<LibraryCache>, ApplicationError> {
        Ok(self.current())
    }

    fn save(&self, cache: &LibraryCache) -> Result<(), ApplicationError> {
        *self.document.lock().expect("document") = Some(cache.clone());
        *self.saves.lock().expect("saves") += 1;
        Ok(())
    }
}

pub struct FakeClock(pub f64);

impl Clock for FakeClock {
    fn now(&self) -> f64 {
        self.0
    }
}

/// Thumbnails live in a map; sources named `*.bad` fail to decode.
#[derive(Default)]
pub struct FakeGenerator {
    pub written: Mutex<HashMap<PathBuf, Vec<u8>>>,
    pub generated: Mutex<Vec<PathBuf>>,
    pub loads: Mutex<usize>,
}

impl FakeGenerator {
    pub fn generated(&self) -> Vec<PathBuf> {
        self.generated.lock().expect("generated").clone()
    }

    pub fn loads(&self) -> usize {
        *self.loads.lock().expect("loads")
    }
}

impl ThumbnailGenerator for FakeGenerator {
    fn generate(
        &self,
        source: &Path,
        canonical_uri: &[u8],
        target: &Path,
    ) -> Result<(), ApplicationError> {
        self.generated
            .lock()
            .expect("generated")
            .push(source.to_path_buf());
        if source.extension().is_some_and(|ext| ext == "bad") {
            return Err(ApplicationError::Decode("no decoder".to_string()));
        }
        self.written
            .lock()
            .expect("written")
            .insert(target.to_path_buf(), canonical_uri.to_vec());
        Ok(())
    }

    fn load_icon(&self, thumbnail: &Path) -> Result<Option<Icon>, ApplicationError> {
        *self.loads.lock().expect("loads") += 1;
        Ok(self
            .written
            .lock()
            .expect("written")
            .get(thumbnail)
            .map(|uri| Icon::new(2, 2, uri.clone(), IconKind::Thumbnail)))
    }

    fn failure_icon(&self) -> Icon {
        Icon::new(1, 1, vec![128, 0, 0, 255], IconKind::Failure)
    }
}
