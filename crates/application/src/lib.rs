mod cancel;
mod error;
mod indexer;
mod ports;
mod service;
mod tag_edit;
mod tag_filter;
mod thumbnails;
mod use_cases;
mod workers;

#[cfg(test)]
mod test_support;

pub use cancel::CancellationToken;
pub use error::{ApplicationError, ExtractionError};
pub use indexer::{MetadataIndex, ScanOutcome, ScanReport};
pub use ports::{CacheStore, Clock, FileScanner, MetadataReader, TagWriter, ThumbnailGenerator};
pub use service::{ApplicationService, ServiceSettings};
pub use tag_edit::{Coverage, TagEditResult, TagEditor, TagSelection};
pub use tag_filter::{TagFilterEngine, TagSort, Visibility};
pub use thumbnails::{ThumbnailCache, DEFAULT_ICON_CACHE_BYTES};
pub use use_cases::{
    CancelIndexCommand, EditTagsCommand, LoadLibraryCommand, PollEventQuery, StartIndexCommand,
    SubmitThumbnailsCommand, TagSummaryQuery, ThumbnailCommand,
};
pub use workers::{
    thumbnail_progress_text, IndexEvent, IndexWorker, ThumbnailEvent, ThumbnailRequest,
    ThumbnailWorker,
};
