use std::path::Path;
use std::sync::Arc;

use md5::{Digest, Md5};
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Value of the `Software` chunk written into every thumbnail.
pub const SOFTWARE_NAME: &str = "tagshelf";

/// Bytes left as-is in a canonical URI path: alphanumerics, `_.-~` and `/`.
const URI_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// `file://` followed by the percent-encoded absolute path.
pub fn canonical_uri(path: &Path) -> Vec<u8> {
    let raw = path_bytes(path);
    let mut uri = b"file://".to_vec();
    for piece in percent_encode(&raw, URI_PATH) {
        uri.extend_from_slice(piece.as_bytes());
    }
    uri
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().replace('\\', "/").into_bytes()
}

/// Lowercase hex MD5 of the canonical URI; the thumbnail's identity.
pub fn thumbnail_key(canonical_uri: &[u8]) -> String {
    hex::encode(Md5::digest(canonical_uri))
}

pub fn thumbnail_file_name(key: &str) -> String {
    format!("{key}.png")
}

/// Rotation implied by an EXIF `Orientation` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    CounterClockwise90,
    Half,
}

impl Rotation {
    /// 6 turns clockwise, 8 counter-clockwise, 3 half a turn. Mirrored
    /// orientations and unknown values are left alone.
    pub fn from_exif(orientation: u32) -> Self {
        match orientation {
            6 => Self::Clockwise90,
            8 => Self::CounterClockwise90,
            3 => Self::Half,
            _ => Self::None,
        }
    }
}

/// Bounding box every thumbnail is scaled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Largest size with the source aspect ratio that fits in the box.
    pub fn fit(self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (self.width.max(1), self.height.max(1));
        }
        let scale = f64::min(
            f64::from(self.width) / f64::from(width),
            f64::from(self.height) / f64::from(height),
        );
        let fitted_w = (f64::from(width) * scale).round().max(1.0) as u32;
        let fitted_h = (f64::from(height) * scale).round().max(1.0) as u32;
        (fitted_w.min(self.width), fitted_h.min(self.height))
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self::new(192, 128)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Thumbnail,
    Failure,
}

/// Decoded RGBA pixels ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<Vec<u8>>,
    pub kind: IconKind,
}

impl Icon {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>, kind: IconKind) -> Self {
        Self {
            width,
            height,
            rgba: Arc::new(rgba),
            kind,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.kind == IconKind::Failure
    }

    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }
}
