pub mod exiv2;
pub mod fs;
pub mod presenters;
pub mod store;

pub use exiv2::Exiv2Metadata;
pub use fs::{sniff_image_kind, PngThumbnailGenerator, SystemClock, WalkdirFileScanner};
pub use presenters::{
    present_image_long, present_image_row, present_phase, present_scan_report,
    present_selection, present_tag_edit, present_tag_line,
};
pub use store::JsonCacheStore;
