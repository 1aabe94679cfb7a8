mod error;
mod image;
mod library;
pub mod png_text;
mod progress;
mod tags;
mod thumbnail;

pub use error::DomainError;
pub use image::{
    detect_image_kind, human_filesize, identify_image_kind, is_indexable, Dimensions,
    ExtractedMetadata, FileStamp, ImageKind, ImageRecord, MAGIC_LEN,
};
pub use library::{LibraryCache, LibrarySnapshot};
pub use progress::{IndexPhase, Progress};
pub use tags::{normalize_tag_name, TagFilter, TagId, TagState, TagVocabularyEntry};
pub use thumbnail::{
    canonical_uri, thumbnail_file_name, thumbnail_key, Icon, IconKind, Rotation, ThumbnailSize,
    SOFTWARE_NAME,
};
