mod parse;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tagshelf_application::{ApplicationError, ExtractionError, MetadataReader, TagWriter};
use tagshelf_domain::ExtractedMetadata;
use tracing::{debug, warn};

pub use parse::{parse_image_size, parse_xmp_subjects};

const SUBJECT_KEY: &str = "Xmp.dc.subject";

/// Reads and writes XMP `dc:subject` tags through the `exiv2` command line tool.
#[derive(Debug, Clone)]
pub struct Exiv2Metadata {
    binary: PathBuf,
}

impl Default for Exiv2Metadata {
    fn default() -> Self {
        Self::new(PathBuf::from("exiv2"))
    }
}

impl Exiv2Metadata {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn run(&self, args: &[String], path: &Path) -> std::io::Result<Output> {
        Command::new(&self.binary).args(args).arg(path).output()
    }

    fn print(&self, mode: &str, path: &Path) -> Result<Output, ExtractionError> {
        self.run(&["-p".to_string(), mode.to_string()], path)
            .map_err(|error| {
                ExtractionError::Failed(format!("cannot run {}: {error}", self.binary.display()))
            })
    }
}

impl MetadataReader for Exiv2Metadata {
    fn read_metadata(&self, path: &Path) -> Result<ExtractedMetadata, ExtractionError> {
        fs::metadata(path)
            .map_err(|error| ExtractionError::Transient(format!("{}: {error}", path.display())))?;

        let xmp = self.print("X", path)?;
        let tags = if xmp.status.success() {
            parse_xmp_subjects(&String::from_utf8_lossy(&xmp.stdout))
                .map_err(ExtractionError::Failed)?
        } else {
            debug!(path = %path.display(), status = %xmp.status, "no xmp packet");
            BTreeSet::new()
        };

        let summary = self.print("s", path)?;
        let dimensions = parse_image_size(&String::from_utf8_lossy(&summary.stdout));

        Ok(ExtractedMetadata { tags, dimensions })
    }
}

impl TagWriter for Exiv2Metadata {
    fn write_tags(&self, path: &Path, tags: &BTreeSet<String>) -> Result<(), ApplicationError> {
        let args = write_args(tags);
        let output = self.run(&args, path).map_err(|error| ApplicationError::TagWrite {
            path: path.to_path_buf(),
            message: format!("cannot run {}: {error}", self.binary.display()),
        })?;
        if !output.status.success() {
            return Err(ApplicationError::TagWrite {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            warn!(path = %path.display(), output = %stdout.trim(), "exiv2 reported warnings while writing tags");
        }
        Ok(())
    }
}

/// exiv2 `-M` commands replacing the subject bag with `tags`. The explicit
/// `XmpBag` type keeps a tag that starts with a type name from being parsed as one.
fn write_args(tags: &BTreeSet<String>) -> Vec<String> {
    let mut args = vec!["-M".to_string(), format!("del {SUBJECT_KEY}")];
    for tag in tags {
        args.push("-M".to_string());
        args.push(format!("set {SUBJECT_KEY} XmpBag {tag}"));
    }
    args
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn vanished_file_is_transient() {
        let dir = TempDir::new().expect("tempdir");
        let reader = Exiv2Metadata::default();
        assert!(matches!(
            reader.read_metadata(&dir.path().join("gone.jpg")),
            Err(ExtractionError::Transient(_))
        ));
    }

    #[test]
    fn every_tag_is_written_as_a_bag_item() {
        let tags: BTreeSet<String> = ["XmpText foo", "holiday"]
            .iter()
            .map(|tag| tag.to_string())
            .collect();
        assert_eq!(
            write_args(&tags),
            vec![
                "-M",
                "del Xmp.dc.subject",
                "-M",
                "set Xmp.dc.subject XmpBag XmpText foo",
                "-M",
                "set Xmp.dc.subject XmpBag holiday",
            ]
        );
        assert_eq!(write_args(&BTreeSet::new()), vec!["-M", "del Xmp.dc.subject"]);
    }

    #[test]
    fn missing_binary_is_a_failure_not_a_skip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"x").expect("write");
        let reader = Exiv2Metadata::new(dir.path().join("no-such-exiv2"));

        assert!(matches!(
            reader.read_metadata(&path),
            Err(ExtractionError::Failed(_))
        ));
        assert!(matches!(
            reader.write_tags(&path, &BTreeSet::new()),
            Err(ApplicationError::TagWrite { .. })
        ));
    }
}
