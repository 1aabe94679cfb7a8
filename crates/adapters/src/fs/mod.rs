mod clock;
mod scanner;
mod thumbs;

pub use clock::SystemClock;
pub use scanner::{sniff_image_kind, WalkdirFileScanner};
pub use thumbs::PngThumbnailGenerator;
