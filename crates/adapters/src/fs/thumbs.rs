use std::fs::{self, File};
use std::io::{BufReader, Cursor, Write};
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tagshelf_application::{ApplicationError, ThumbnailGenerator};
use tagshelf_domain::png_text::inject_thumbnail_chunks;
use tagshelf_domain::{
    detect_image_kind, identify_image_kind, Icon, IconKind, ImageKind, Rotation, ThumbnailSize,
    MAGIC_LEN, SOFTWARE_NAME,
};
use tracing::debug;

const FAILURE_COLOR: Rgba<u8> = Rgba([128, 0, 0, 255]);

/// Freedesktop-style PNG thumbnails built with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngThumbnailGenerator {
    size: ThumbnailSize,
}

impl PngThumbnailGenerator {
    pub fn new(size: ThumbnailSize) -> Self {
        Self { size }
    }

    fn render(&self, source: &Path) -> Result<Vec<u8>, ApplicationError> {
        let decoded = decode_source(source)?;
        let rotated = apply_rotation(decoded, read_orientation(source));
        let scaled = self.scale(rotated);

        let mut png = Vec::new();
        scaled
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|error| ApplicationError::Decode(format!("png encode failed: {error}")))?;
        Ok(png)
    }

    fn scale(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = self.size.fit(image.width(), image.height());
        if width < image.width() || height < image.height() {
            image.thumbnail_exact(width, height)
        } else if (width, height) == (image.width(), image.height()) {
            image
        } else {
            image.resize_exact(width, height, FilterType::Triangle)
        }
    }
}

impl ThumbnailGenerator for PngThumbnailGenerator {
    fn generate(
        &self,
        source: &Path,
        canonical_uri: &[u8],
        target: &Path,
    ) -> Result<(), ApplicationError> {
        let png = self.render(source)?;
        let mtime = fs::metadata(source)
            .and_then(|metadata| metadata.modified())
            .map_err(|error| ApplicationError::Io(format!("{}: {error}", source.display())))?;
        let mtime_secs = super::scanner::epoch_seconds(mtime).floor() as i64;
        let bytes = inject_thumbnail_chunks(
            &png,
            mtime_secs,
            canonical_uri,
            SOFTWARE_NAME.as_bytes(),
        )?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|error| ApplicationError::Io(error.to_string()))?;
        }
        write_private(target, &bytes)
            .map_err(|error| ApplicationError::Io(format!("{}: {error}", target.display())))?;
        debug!(source = %source.display(), thumbnail = %target.display(), "thumbnail written");
        Ok(())
    }

    fn load_icon(&self, thumbnail: &Path) -> Result<Option<Icon>, ApplicationError> {
        if !thumbnail.exists() {
            return Ok(None);
        }
        let decoded = image::open(thumbnail)
            .map_err(|error| ApplicationError::Decode(format!("{}: {error}", thumbnail.display())))?
            .to_rgba8();

        let mut canvas = RgbaImage::new(self.size.width, self.size.height);
        let x = (i64::from(self.size.width) - i64::from(decoded.width())) / 2;
        let y = (i64::from(self.size.height) - i64::from(decoded.height())) / 2;
        imageops::overlay(&mut canvas, &decoded, x, y);
        Ok(Some(Icon::new(
            canvas.width(),
            canvas.height(),
            canvas.into_raw(),
            IconKind::Thumbnail,
        )))
    }

    fn failure_icon(&self) -> Icon {
        let canvas = RgbaImage::from_pixel(self.size.width, self.size.height, FAILURE_COLOR);
        Icon::new(
            canvas.width(),
            canvas.height(),
            canvas.into_raw(),
            IconKind::Failure,
        )
    }
}

fn image_format(kind: ImageKind) -> Option<ImageFormat> {
    match kind {
        ImageKind::Png => Some(ImageFormat::Png),
        ImageKind::Jpeg => Some(ImageFormat::Jpeg),
        ImageKind::Gif => Some(ImageFormat::Gif),
        ImageKind::Unsupported => None,
    }
}

/// Decodes with the codec implied by the extension, then by the magic number.
fn decode_source(path: &Path) -> Result<DynamicImage, ApplicationError> {
    let bytes =
        fs::read(path).map_err(|error| ApplicationError::Io(format!("{}: {error}", path.display())))?;

    let by_extension = detect_image_kind(path);
    if let Some(format) = image_format(by_extension) {
        match image::load_from_memory_with_format(&bytes, format) {
            Ok(image) => return Ok(image),
            Err(error) => debug!(path = %path.display(), %error, "extension codec failed"),
        }
    }

    let sniffed = identify_image_kind(&bytes[..bytes.len().min(MAGIC_LEN)]);
    if sniffed != by_extension {
        if let Some(format) = image_format(sniffed) {
            debug!(path = %path.display(), ?sniffed, "retrying with sniffed format");
            if let Ok(image) = image::load_from_memory_with_format(&bytes, format) {
                return Ok(image);
            }
        }
    }

    Err(ApplicationError::Decode(format!(
        "no decoder accepted {}",
        path.display()
    )))
}

/// EXIF orientation of `path`; any lookup failure means no rotation.
fn read_orientation(path: &Path) -> Rotation {
    let Ok(file) = File::open(path) else {
        return Rotation::None;
    };
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(data) => data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Rotation::from_exif)
            .unwrap_or_default(),
        Err(error) => {
            debug!(path = %path.display(), %error, "no exif orientation");
            Rotation::None
        }
    }
}

fn apply_rotation(image: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => image,
        Rotation::Clockwise90 => image.rotate90(),
        Rotation::CounterClockwise90 => image.rotate270(),
        Rotation::Half => image.rotate180(),
    }
}

#[cfg(unix)]
fn write_private(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(target)?;
    file.write_all(bytes)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_private(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(target)?;
    file.write_all(bytes)
}
