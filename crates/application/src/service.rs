use std::path::PathBuf;
use std::sync::Arc;

use tagshelf_domain::{Icon, LibrarySnapshot, Progress};
use tracing::{info, warn};

use crate::{
    ApplicationError, CacheStore, CancelIndexCommand, CancellationToken, Clock, EditTagsCommand,
    FileScanner, IndexEvent, IndexWorker, LoadLibraryCommand, MetadataIndex, MetadataReader,
    PollEventQuery, StartIndexCommand, SubmitThumbnailsCommand, TagEditResult, TagEditor,
    TagSelection, TagSummaryQuery, TagWriter, ThumbnailCache, ThumbnailCommand, ThumbnailEvent,
    ThumbnailGenerator, ThumbnailWorker, DEFAULT_ICON_CACHE_BYTES,
};

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub thumbnail_dir: PathBuf,
    pub icon_cache_bytes: usize,
    pub thumbnail_jobs: usize,
}

impl ServiceSettings {
    pub fn new(thumbnail_dir: PathBuf) -> Self {
        Self {
            thumbnail_dir,
            icon_cache_bytes: DEFAULT_ICON_CACHE_BYTES,
            thumbnail_jobs: 2,
        }
    }
}

pub struct ApplicationService {
    index: Arc<MetadataIndex>,
    index_worker: IndexWorker,
    editor: TagEditor,
    thumbnails: Arc<ThumbnailCache>,
    thumbnail_worker: ThumbnailWorker,
}

impl ApplicationService {
    pub fn new(
        scanner: Box<dyn FileScanner>,
        reader: Box<dyn MetadataReader>,
        writer: Box<dyn TagWriter>,
        store: Box<dyn CacheStore>,
        clock: Box<dyn Clock>,
        generator: Box<dyn ThumbnailGenerator>,
        settings: ServiceSettings,
    ) -> Self {
        let index = Arc::new(MetadataIndex::new(
            Arc::from(scanner),
            Arc::from(reader),
            Arc::from(store),
            Arc::from(clock),
        ));
        let thumbnails = Arc::new(ThumbnailCache::new(
            Arc::from(generator),
            settings.thumbnail_dir,
            settings.icon_cache_bytes,
        ));
        Self {
            index_worker: IndexWorker::new(Arc::clone(&index)),
            index,
            editor: TagEditor::new(Arc::from(writer)),
            thumbnail_worker: ThumbnailWorker::new(Arc::clone(&thumbnails), settings.thumbnail_jobs),
            thumbnails,
        }
    }

    pub fn start_index(
        &self,
        command: StartIndexCommand,
    ) -> Result<CancellationToken, ApplicationError> {
        if command.roots.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "at least one library directory is required".to_string(),
            ));
        }
        info!(roots = command.roots.len(), "starting index scan");
        self.index_worker.start(command.roots)
    }

    pub fn cancel_index(&self, _command: CancelIndexCommand) -> Result<(), ApplicationError> {
        self.index_worker.cancel()
    }

    pub fn poll_index(&self, query: PollEventQuery) -> Result<Option<IndexEvent>, ApplicationError> {
        match query.wait {
            Some(timeout) => self.index_worker.next_event(timeout),
            None => self.index_worker.try_next_event(),
        }
    }

    pub fn load_library(
        &self,
        command: LoadLibraryCommand,
    ) -> Result<LibrarySnapshot, ApplicationError> {
        self.index.load_snapshot(&command.roots)
    }

    /// Writes the tag change to every selected file, then patches the cache.
    /// When a write fails part-way, the files already rewritten are still
    /// patched into the cache before the error is returned.
    pub fn edit_tags(
        &self,
        command: EditTagsCommand,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(Progress),
    ) -> Result<TagEditResult, ApplicationError> {
        if command.add.is_empty() && command.remove.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "nothing to add or remove".to_string(),
            ));
        }
        if self.index.is_busy() {
            return Err(ApplicationError::Busy);
        }
        let result = match self.editor.apply(
            &command.selection,
            &command.add,
            &command.remove,
            &command.known_tags,
            cancel,
            on_progress,
        ) {
            Ok(result) => result,
            Err(ApplicationError::TagEditAborted { cause, applied }) => {
                if !applied.is_empty() {
                    match self.index.apply_tag_edit(&applied) {
                        Ok(patched) => {
                            warn!(patched, "tag edit aborted, cache patched with written files")
                        }
                        Err(error) => warn!(%error, "tag edit aborted, cache not patched"),
                    }
                }
                return Err(ApplicationError::TagEditAborted { cause, applied });
            }
            Err(error) => return Err(error),
        };
        if !result.is_empty() {
            let patched = self.index.apply_tag_edit(&result)?;
            info!(updated = result.updated.len(), patched, "tag edit applied");
        }
        Ok(result)
    }

    pub fn tag_summary(&self, query: TagSummaryQuery) -> Vec<TagSelection> {
        TagEditor::selection_summary(&query.selection, &query.known_tags)
    }

    pub fn thumbnail(&self, command: ThumbnailCommand) -> Result<Icon, ApplicationError> {
        self.thumbnails
            .icon_for(&command.path, command.force_regenerate)
    }

    pub fn submit_thumbnails(
        &self,
        command: SubmitThumbnailsCommand,
    ) -> Result<u64, ApplicationError> {
        self.thumbnail_worker.submit_batch(command.requests)
    }

    pub fn poll_thumbnail(
        &self,
        query: PollEventQuery,
    ) -> Result<Option<ThumbnailEvent>, ApplicationError> {
        match query.wait {
            Some(timeout) => self.thumbnail_worker.next_event(timeout),
            None => self.thumbnail_worker.try_next_event(),
        }
    }
}
