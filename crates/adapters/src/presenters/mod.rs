use tagshelf_application::{Coverage, ScanReport, TagEditResult, TagSelection};
use tagshelf_domain::{human_filesize, ImageKind, ImageRecord, IndexPhase, TagState, TagVocabularyEntry};

pub fn present_image_row(image: &ImageRecord) -> String {
    image.path.display().to_string()
}

/// Path, real format, dimensions, size and tags, tab separated.
pub fn present_image_long(image: &ImageRecord, kind: ImageKind) -> String {
    let dimensions = if image.dimensions.is_known() {
        format!("{}x{}", image.dimensions.width, image.dimensions.height)
    } else {
        "?x?".to_string()
    };
    let tags = image.tags.iter().cloned().collect::<Vec<_>>().join(", ");
    format!(
        "{}\t{}\t{}\t{}\t{}",
        image.path.display(),
        kind_label(kind),
        dimensions,
        human_filesize(image.byte_size),
        tags
    )
}

pub fn present_tag_line(entry: &TagVocabularyEntry) -> String {
    let marker = match entry.state {
        TagState::Default => ' ',
        TagState::Whitelisted => '+',
        TagState::Blacklisted => '-',
    };
    format!(
        "{marker} {}   ({}/{})",
        entry.id, entry.visible_count, entry.total_count
    )
}

pub fn present_phase(phase: &IndexPhase) -> String {
    match phase {
        IndexPhase::SearchingForImages { found } => format!("Searching for images: {found} found"),
        IndexPhase::IndexingImage { current, total } => format!("Indexing image {current}/{total}"),
        IndexPhase::SavingCache => "Saving cache".to_string(),
        IndexPhase::Done => "Done".to_string(),
    }
}

pub fn present_scan_report(report: &ScanReport) -> String {
    let status = if report.cancelled { "cancelled" } else { "finished" };
    format!(
        "index {status}: found={}, extracted={}, unchanged={}, skipped={}, pruned={}",
        report.found, report.extracted, report.unchanged, report.skipped, report.pruned
    )
}

/// One line per changed file, then the signed per-tag deltas.
pub fn present_tag_edit(result: &TagEditResult) -> Vec<String> {
    let mut lines: Vec<String> = result
        .updated
        .iter()
        .map(|(path, tags)| {
            let tags = tags.iter().cloned().collect::<Vec<_>>().join(", ");
            format!("{}: {tags}", path.display())
        })
        .collect();

    for (tag, delta) in &result.per_tag_delta {
        let created = if result.created_tags.contains(tag) {
            " (new)"
        } else {
            ""
        };
        lines.push(format!("{tag}: {delta:+}{created}"));
    }
    if result.untagged_delta != 0 {
        lines.push(format!("<Untagged>: {:+}", result.untagged_delta));
    }

    let status = if result.cancelled { ", cancelled" } else { "" };
    lines.push(format!("{} file(s) updated{status}", result.updated.len()));
    lines
}

pub fn present_selection(selection: &TagSelection, selected: usize) -> String {
    let check = match selection.coverage {
        Coverage::All => "[x]",
        Coverage::Some => "[~]",
        Coverage::None => "[ ]",
    };
    format!("{check} {} ({}/{selected})", selection.tag, selection.count)
}

fn kind_label(kind: ImageKind) -> &'static str {
    match kind {
        ImageKind::Png => "PNG",
        ImageKind::Jpeg => "JPEG",
        ImageKind::Gif => "GIF",
        ImageKind::Unsupported => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;

    use tagshelf_domain::{Dimensions, TagId};

    use super::*;

    fn record() -> ImageRecord {
        ImageRecord {
            path: PathBuf::from("/photos/a.jpg"),
            tags: ["sea", "beach"].iter().map(|tag| tag.to_string()).collect(),
            byte_size: 2_500_000,
            dimensions: Dimensions::new(640, 480),
            mtime: 1.0,
            ctime: 1.0,
        }
    }

    #[test]
    fn long_row_shows_real_format_and_size() {
        assert_eq!(
            present_image_long(&record(), ImageKind::Png),
            "/photos/a.jpg\tPNG\t640x480\t2.5M\tbeach, sea"
        );
    }

    #[test]
    fn tag_lines_show_visible_over_total() {
        let mut entry = TagVocabularyEntry::new(TagId::real("sea"), 5);
        entry.visible_count = 2;
        assert_eq!(present_tag_line(&entry), "  sea   (2/5)");

        let mut untagged = TagVocabularyEntry::new(TagId::Untagged, 3);
        untagged.state = TagState::Blacklisted;
        untagged.visible_count = 0;
        assert_eq!(present_tag_line(&untagged), "- <Untagged>   (0/3)");
    }

    #[test]
    fn tag_edit_lists_files_deltas_and_created_tags() {
        let result = TagEditResult {
            untagged_delta: -1,
            updated: BTreeMap::from([(
                PathBuf::from("/photos/a.jpg"),
                BTreeSet::from(["x".to_string()]),
            )]),
            per_tag_delta: BTreeMap::from([("x".to_string(), 1), ("y".to_string(), -2)]),
            created_tags: BTreeSet::from(["x".to_string()]),
            cancelled: false,
        };
        assert_eq!(
            present_tag_edit(&result),
            vec![
                "/photos/a.jpg: x".to_string(),
                "x: +1 (new)".to_string(),
                "y: -2".to_string(),
                "<Untagged>: -1".to_string(),
                "1 file(s) updated".to_string(),
            ]
        );
    }

    #[test]
    fn phases_read_as_progress_text() {
        assert_eq!(
            present_phase(&IndexPhase::IndexingImage {
                current: 3,
                total: 10
            }),
            "Indexing image 3/10"
        );
        assert_eq!(present_phase(&IndexPhase::Done), "Done");
    }

    #[test]
    fn selection_shows_check_state() {
        let selection = TagSelection {
            tag: "sea".to_string(),
            count: 1,
            coverage: Coverage::Some,
        };
        assert_eq!(present_selection(&selection, 3), "[~] sea (1/3)");
    }
}
