use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tagshelf_domain::{ImageRecord, IndexPhase, LibraryCache, LibrarySnapshot};
use tracing::{debug, info, warn};

use crate::{
    ApplicationError, CacheStore, CancellationToken, Clock, ExtractionError, FileScanner,
    MetadataReader, TagEditResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanReport {
    pub found: usize,
    pub extracted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub pruned: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub cache: LibraryCache,
    pub report: ScanReport,
}

/// Owner of the persisted library cache. At most one operation that rewrites
/// the document runs at a time; a concurrent request gets `ApplicationError::Busy`.
pub struct MetadataIndex {
    scanner: Arc<dyn FileScanner>,
    reader: Arc<dyn MetadataReader>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    writing: AtomicBool,
}

enum Indexed {
    Extracted,
    Unchanged,
    Skipped,
}

struct WriteGuard<'a>(&'a AtomicBool);

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MetadataIndex {
    pub fn new(
        scanner: Arc<dyn FileScanner>,
        reader: Arc<dyn MetadataReader>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scanner,
            reader,
            store,
            clock,
            writing: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.writing.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<WriteGuard<'_>, ApplicationError> {
        self.writing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ApplicationError::Busy)?;
        Ok(WriteGuard(&self.writing))
    }

    pub fn scan(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
        on_phase: &mut dyn FnMut(IndexPhase),
    ) -> Result<ScanOutcome, ApplicationError> {
        let _guard = self.acquire()?;
        let mut cache = self.store.load()?.unwrap_or_default();
        let mut report = ScanReport::default();

        on_phase(IndexPhase::SearchingForImages { found: 0 });
        let mut paths = BTreeSet::new();
        for root in roots {
            let offset = paths.len();
            let found = self.scanner.find_images(root, &mut |count| {
                on_phase(IndexPhase::SearchingForImages {
                    found: offset + count,
                })
            })?;
            paths.extend(found);
        }
        report.found = paths.len();
        info!(roots = roots.len(), found = report.found, "image search finished");

        let total = paths.len();
        for (position, path) in paths.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(indexed = position, total, "scan cancelled");
                report.cancelled = true;
                break;
            }
            on_phase(IndexPhase::IndexingImage {
                current: position + 1,
                total,
            });
            match self.index_one(&mut cache, path) {
                Indexed::Extracted => report.extracted += 1,
                Indexed::Unchanged => report.unchanged += 1,
                Indexed::Skipped => report.skipped += 1,
            }
        }

        report.pruned = cache.prune(|path| self.scanner.exists(path));
        if report.pruned > 0 {
            info!(pruned = report.pruned, "dropped records of deleted files");
        }

        on_phase(IndexPhase::SavingCache);
        cache.updated = self.clock.now();
        self.store.save(&cache)?;
        on_phase(IndexPhase::Done);
        info!(
            extracted = report.extracted,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "index saved"
        );

        Ok(ScanOutcome { cache, report })
    }

    fn index_one(&self, cache: &mut LibraryCache, path: &Path) -> Indexed {
        let stamp = match self.scanner.stat(path) {
            Ok(stamp) => stamp,
            Err(error) => {
                debug!(path = %path.display(), %error, "cannot stat file, skipping");
                return Indexed::Skipped;
            }
        };
        if cache
            .get(path)
            .is_some_and(|record| record.is_fresh(&stamp))
        {
            return Indexed::Unchanged;
        }

        match self.reader.read_metadata(path) {
            Ok(metadata) => {
                debug!(path = %path.display(), tags = metadata.tags.len(), "extracted metadata");
                cache.upsert(ImageRecord::from_extraction(
                    path.to_path_buf(),
                    stamp,
                    metadata,
                ));
                Indexed::Extracted
            }
            Err(ExtractionError::Transient(reason)) => {
                debug!(path = %path.display(), %reason, "file unavailable, keeping prior record");
                Indexed::Skipped
            }
            Err(ExtractionError::Failed(reason)) => {
                warn!(path = %path.display(), %reason, "metadata extraction failed");
                Indexed::Skipped
            }
        }
    }

    /// Cached records under `roots` whose files still exist, sorted by path.
    pub fn load_snapshot(&self, roots: &[PathBuf]) -> Result<LibrarySnapshot, ApplicationError> {
        let Some(mut cache) = self.store.load()? else {
            debug!("no cache document yet, library is empty");
            return Ok(LibrarySnapshot::default());
        };
        cache.prune(|path| self.scanner.exists(path));
        Ok(cache.snapshot_under(roots.iter().map(PathBuf::as_path)))
    }

    /// Writes the tag sets of a finished edit into the persisted document.
    pub fn apply_tag_edit(&self, edit: &TagEditResult) -> Result<usize, ApplicationError> {
        let _guard = self.acquire()?;
        let Some(mut cache) = self.store.load()? else {
            warn!("no cache document to patch after tag edit");
            return Ok(0);
        };

        let mut patched = 0;
        for (path, tags) in &edit.updated {
            match cache.images.get_mut(path) {
                Some(record) => {
                    record.tags = tags.clone();
                    patched += 1;
                }
                None => warn!(path = %path.display(), "edited image is not in the cache"),
            }
        }
        cache.updated = self.clock.now();
        self.store.save(&cache)?;
        Ok(patched)
    }
}
