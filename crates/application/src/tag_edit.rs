use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use tagshelf_domain::{normalize_tag_name, ImageRecord, Progress};
use tracing::{debug, info};

use crate::{ApplicationError, CancellationToken, TagWriter};

/// The minimal diff a tag edit leaves behind, applied by callers to the
/// persisted cache and to the vocabulary without rescanning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagEditResult {
    /// `-1` per image that gained its first tag, `+1` per image that lost its last.
    pub untagged_delta: i64,
    pub updated: BTreeMap<PathBuf, BTreeSet<String>>,
    pub per_tag_delta: BTreeMap<String, i64>,
    /// Added tags that were not in the vocabulary before the edit.
    pub created_tags: BTreeSet<String>,
    pub cancelled: bool,
}

impl TagEditResult {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    All,
    Some,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelection {
    pub tag: String,
    pub count: usize,
    pub coverage: Coverage,
}

pub struct TagEditor {
    writer: Arc<dyn TagWriter>,
}

impl TagEditor {
    pub fn new(writer: Arc<dyn TagWriter>) -> Self {
        Self { writer }
    }

    /// Applies `(old ∪ add) \ remove` to every image of `selection`.
    ///
    /// A writer failure aborts the batch with `ApplicationError::TagEditAborted`
    /// carrying the diff of the files written before it. Cancellation stops
    /// before the next image and returns what was applied so far.
    pub fn apply(
        &self,
        selection: &[ImageRecord],
        add: &BTreeSet<String>,
        remove: &BTreeSet<String>,
        known_tags: &BTreeSet<String>,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(Progress),
    ) -> Result<TagEditResult, ApplicationError> {
        let add = normalize_all(add)?;
        let remove = normalize_all(remove)?;

        let mut result = TagEditResult {
            created_tags: add.difference(known_tags).cloned().collect(),
            ..TagEditResult::default()
        };

        let total = selection.len();
        for (position, image) in selection.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(applied = position, total, "tag edit cancelled");
                result.cancelled = true;
                break;
            }
            on_progress(Progress::new(position, total));

            let new_tags: BTreeSet<String> = image
                .tags
                .union(&add)
                .filter(|tag| !remove.contains(*tag))
                .cloned()
                .collect();
            if new_tags == image.tags {
                continue;
            }

            if let Err(cause) = self.writer.write_tags(&image.path, &new_tags) {
                result.per_tag_delta.retain(|_, delta| *delta != 0);
                return Err(ApplicationError::TagEditAborted {
                    cause: Box::new(cause),
                    applied: Box::new(result),
                });
            }
            debug!(path = %image.path.display(), tags = new_tags.len(), "tags written");

            for gained in new_tags.difference(&image.tags) {
                *result.per_tag_delta.entry(gained.clone()).or_default() += 1;
            }
            for lost in image.tags.difference(&new_tags) {
                *result.per_tag_delta.entry(lost.clone()).or_default() -= 1;
            }
            match (image.tags.is_empty(), new_tags.is_empty()) {
                (true, false) => result.untagged_delta -= 1,
                (false, true) => result.untagged_delta += 1,
                _ => {}
            }
            result.updated.insert(image.path.clone(), new_tags);
        }
        if !result.cancelled {
            on_progress(Progress::new(total, total));
        }
        result.per_tag_delta.retain(|_, delta| *delta != 0);

        Ok(result)
    }

    /// How much of `selection` carries each tag, for every tag in `known_tags`
    /// and every tag present in the selection.
    pub fn selection_summary(
        selection: &[ImageRecord],
        known_tags: &BTreeSet<String>,
    ) -> Vec<TagSelection> {
        let mut counts: BTreeMap<&str, usize> =
            known_tags.iter().map(|tag| (tag.as_str(), 0)).collect();
        for image in selection {
            for tag in &image.tags {
                *counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(tag, count)| TagSelection {
                tag: tag.to_string(),
                count,
                coverage: match count {
                    0 => Coverage::None,
                    n if n == selection.len() => Coverage::All,
                    _ => Coverage::Some,
                },
            })
            .collect()
    }
}

fn normalize_all(tags: &BTreeSet<String>) -> Result<BTreeSet<String>, ApplicationError> {
    tags.iter()
        .map(|tag| normalize_tag_name(tag).map_err(ApplicationError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::test_support::{record, tags, FakeWriter};

    fn editor() -> (Arc<FakeWriter>, TagEditor) {
        let writer = Arc::new(FakeWriter::default());
        (writer.clone(), TagEditor::new(writer))
    }

    fn apply(
        editor: &TagEditor,
        selection: &[ImageRecord],
        add: &[&str],
        remove: &[&str],
        known: &[&str],
    ) -> Result<TagEditResult, ApplicationError> {
        editor.apply(
            selection,
            &tags(add),
            &tags(remove),
            &tags(known),
            &CancellationToken::new(),
            &mut |_| {},
        )
    }

    #[test]
    fn tagging_an_untagged_image_reports_minimal_diff() {
        let (writer, editor) = editor();
        let result = apply(&editor, &[record("/a.png", &[])], &["x"], &[], &[]).expect("edit");

        assert_eq!(result.untagged_delta, -1);
        assert_eq!(result.per_tag_delta.get("x"), Some(&1));
        assert_eq!(result.created_tags, tags(&["x"]));
        assert_eq!(result.updated.get(Path::new("/a.png")), Some(&tags(&["x"])));
        assert_eq!(writer.written.lock().expect("written").len(), 1);
    }

    #[test]
    fn unchanged_images_are_skipped() {
        let (writer, editor) = editor();
        let result = apply(&editor, &[record("/a.png", &["x"])], &["x"], &[], &["x"]).expect("edit");

        assert!(result.is_empty());
        assert_eq!(result.untagged_delta, 0);
        assert!(result.per_tag_delta.is_empty());
        assert!(result.created_tags.is_empty());
        assert!(writer.written.lock().expect("written").is_empty());
    }

    #[test]
    fn remove_wins_and_last_tag_removal_counts_as_untagged() {
        let (_, editor) = editor();
        let selection = [record("/a.png", &["a"]), record("/b.png", &["a", "b"])];
        let result = apply(&editor, &selection, &["a"], &["a"], &["a", "b"]).expect("edit");

        assert_eq!(result.untagged_delta, 1);
        assert_eq!(result.per_tag_delta.get("a"), Some(&-2));
        assert_eq!(result.updated.get(Path::new("/a.png")), Some(&BTreeSet::new()));
        assert_eq!(result.updated.get(Path::new("/b.png")), Some(&tags(&["b"])));
    }

    #[test]
    fn added_tags_are_trimmed_and_empty_names_rejected() {
        let (writer, editor) = editor();
        let result = apply(&editor, &[record("/a.png", &[])], &[" x "], &[], &[]).expect("edit");
        assert_eq!(result.created_tags, tags(&["x"]));

        let rejected = apply(&editor, &[record("/b.png", &[])], &["  "], &[], &[]);
        assert!(matches!(rejected, Err(ApplicationError::Domain(_))));
        assert_eq!(writer.written.lock().expect("written").len(), 1);
    }

    #[test]
    fn writer_failure_aborts_the_batch() {
        let (writer, editor) = editor();
        *writer.fail_on.lock().expect("fail_on") = Some(PathBuf::from("/b.png"));
        let selection = [
            record("/a.png", &[]),
            record("/b.png", &[]),
            record("/c.png", &[]),
        ];

        let error = apply(&editor, &selection, &["x"], &[], &[]).expect_err("write fails");

        let ApplicationError::TagEditAborted { cause, applied } = error else {
            panic!("expected an aborted edit");
        };
        assert!(matches!(*cause, ApplicationError::TagWrite { .. }));
        assert_eq!(applied.updated.len(), 1);
        assert_eq!(applied.updated.get(Path::new("/a.png")), Some(&tags(&["x"])));
        assert_eq!(applied.per_tag_delta.get("x"), Some(&1));
        assert_eq!(applied.untagged_delta, -1);
        let written = writer.written.lock().expect("written");
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, PathBuf::from("/a.png"));
    }

    #[test]
    fn cancellation_keeps_applied_edits() {
        let (_, editor) = editor();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let selection = [record("/a.png", &[]), record("/b.png", &[])];
        let mut seen = Vec::new();

        let result = editor
            .apply(
                &selection,
                &tags(&["x"]),
                &BTreeSet::new(),
                &BTreeSet::new(),
                &cancel,
                &mut |progress| {
                    seen.push(progress);
                    trigger.cancel();
                },
            )
            .expect("edit");

        assert!(result.cancelled);
        assert_eq!(result.updated.len(), 1);
        assert_eq!(seen, vec![Progress::new(0, 2)]);
    }

    #[test]
    fn selection_summary_reports_coverage() {
        let selection = [record("/a.png", &["a", "b"]), record("/b.png", &["a"])];
        let summary = TagEditor::selection_summary(&selection, &tags(&["a", "b", "c"]));

        let coverage: Vec<_> = summary
            .iter()
            .map(|entry| (entry.tag.as_str(), entry.count, entry.coverage))
            .collect();
        assert_eq!(
            coverage,
            vec![
                ("a", 2, Coverage::All),
                ("b", 1, Coverage::Some),
                ("c", 0, Coverage::None),
            ]
        );
    }
}
