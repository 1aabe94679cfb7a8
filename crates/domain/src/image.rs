use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const PNG_MAGIC: &[u8] = b"\x89PNG\x0d\x0a\x1a\x0a";
const JPEG_MAGIC: &[u8] = b"\xff\xd8";
const GIF_MAGICS: [&[u8]; 2] = [b"GIF87a", b"GIF89a"];

/// Number of leading bytes needed by [`identify_image_kind`].
pub const MAGIC_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Unsupported,
}

impl ImageKind {
    pub fn mime_type(self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Gif => Some("image/gif"),
            Self::Unsupported => None,
        }
    }
}

/// Kind implied by the file extension.
pub fn detect_image_kind(path: &Path) -> ImageKind {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return ImageKind::Unsupported;
    };

    match ext.to_ascii_lowercase().as_str() {
        "png" => ImageKind::Png,
        "jpg" | "jpeg" => ImageKind::Jpeg,
        "gif" => ImageKind::Gif,
        _ => ImageKind::Unsupported,
    }
}

/// Whether the metadata index picks this file up during a scan.
///
/// GIFs can be thumbnailed but carry no tag metadata, so they are not indexed.
pub fn is_indexable(path: &Path) -> bool {
    matches!(detect_image_kind(path), ImageKind::Png | ImageKind::Jpeg)
}

/// Kind implied by the magic number at the start of a file.
pub fn identify_image_kind(head: &[u8]) -> ImageKind {
    if head.starts_with(PNG_MAGIC) {
        ImageKind::Png
    } else if head.starts_with(JPEG_MAGIC) {
        ImageKind::Jpeg
    } else if GIF_MAGICS.iter().any(|magic| head.starts_with(magic)) {
        ImageKind::Gif
    } else {
        ImageKind::Unsupported
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileStamp {
    pub byte_size: u64,
    pub mtime: f64,
    pub ctime: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: i64,
    pub height: i64,
}

impl Dimensions {
    pub const UNKNOWN: Self = Self {
        width: -1,
        height: -1,
    };

    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    pub fn is_known(self) -> bool {
        self.width >= 0 && self.height >= 0
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// What the metadata extractor returns for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedMetadata {
    pub tags: BTreeSet<String>,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub tags: BTreeSet<String>,
    pub byte_size: u64,
    pub dimensions: Dimensions,
    pub mtime: f64,
    pub ctime: f64,
}

impl ImageRecord {
    pub fn from_extraction(path: PathBuf, stamp: FileStamp, metadata: ExtractedMetadata) -> Self {
        Self {
            path,
            tags: metadata.tags,
            byte_size: stamp.byte_size,
            dimensions: metadata.dimensions,
            mtime: stamp.mtime,
            ctime: stamp.ctime,
        }
    }

    /// `mtime` and size are the only staleness oracle.
    pub fn is_fresh(&self, stamp: &FileStamp) -> bool {
        self.mtime == stamp.mtime && self.byte_size == stamp.byte_size
    }

    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }
}

pub fn human_filesize(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = "";
    for next in ["K", "M", "G", "T"] {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{value:.1}{unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_kind_detection_works() {
        assert_eq!(detect_image_kind(Path::new("a.JPG")), ImageKind::Jpeg);
        assert_eq!(detect_image_kind(Path::new("a.jpeg")), ImageKind::Jpeg);
        assert_eq!(detect_image_kind(Path::new("a.png")), ImageKind::Png);
        assert_eq!(detect_image_kind(Path::new("a.gif")), ImageKind::Gif);
        assert_eq!(
            detect_image_kind(Path::new("a.nef")),
            ImageKind::Unsupported
        );
        assert_eq!(detect_image_kind(Path::new("noext")), ImageKind::Unsupported);
    }

    #[test]
    fn gifs_are_not_indexed() {
        assert!(is_indexable(Path::new("/x/a.png")));
        assert!(is_indexable(Path::new("/x/a.Jpeg")));
        assert!(!is_indexable(Path::new("/x/a.gif")));
    }

    #[test]
    fn magic_numbers_identify_formats() {
        assert_eq!(
            identify_image_kind(b"\x89PNG\x0d\x0a\x1a\x0a"),
            ImageKind::Png
        );
        assert_eq!(identify_image_kind(b"\xff\xd8\xff\xe0"), ImageKind::Jpeg);
        assert_eq!(identify_image_kind(b"GIF87a.."), ImageKind::Gif);
        assert_eq!(identify_image_kind(b"GIF89a.."), ImageKind::Gif);
        assert_eq!(identify_image_kind(b"GIF88a.."), ImageKind::Unsupported);
        assert_eq!(identify_image_kind(b""), ImageKind::Unsupported);
    }

    #[test]
    fn freshness_needs_both_mtime_and_size() {
        let record = ImageRecord {
            path: PathBuf::from("/a.png"),
            tags: BTreeSet::new(),
            byte_size: 10,
            dimensions: Dimensions::UNKNOWN,
            mtime: 5.5,
            ctime: 1.0,
        };
        let same = FileStamp {
            byte_size: 10,
            mtime: 5.5,
            ctime: 99.0,
        };
        assert!(record.is_fresh(&same));
        assert!(!record.is_fresh(&FileStamp {
            mtime: 5.6,
            ..same
        }));
        assert!(!record.is_fresh(&FileStamp {
            byte_size: 11,
            ..same
        }));
    }

    #[test]
    fn human_filesize_uses_decimal_units() {
        assert_eq!(human_filesize(999), "999.0");
        assert_eq!(human_filesize(1500), "1.5K");
        assert_eq!(human_filesize(2_345_678), "2.3M");
    }
}
