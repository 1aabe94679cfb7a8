use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use tagshelf_domain::{ImageRecord, TagFilter, TagId, TagState, TagVocabularyEntry};

use crate::{ApplicationError, TagEditResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagSort {
    #[default]
    Name,
    Count,
}

/// Result of one visibility pass over the library.
#[derive(Debug, Clone, PartialEq)]
pub struct Visibility<'a> {
    pub visible: Vec<&'a ImageRecord>,
    pub visible_counts: BTreeMap<TagId, usize>,
}

/// Tri-state tag vocabulary plus the visibility computation derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilterEngine {
    vocabulary: BTreeMap<TagId, TagVocabularyEntry>,
}

impl Default for TagFilterEngine {
    fn default() -> Self {
        Self::from_images(&[])
    }
}

impl TagFilterEngine {
    pub fn from_images(images: &[ImageRecord]) -> Self {
        let mut totals: BTreeMap<TagId, usize> = BTreeMap::new();
        totals.insert(TagId::Untagged, 0);
        for image in images {
            if image.is_untagged() {
                *totals.entry(TagId::Untagged).or_default() += 1;
            }
            for tag in &image.tags {
                *totals.entry(TagId::real(tag.as_str())).or_default() += 1;
            }
        }
        let vocabulary = totals
            .into_iter()
            .map(|(id, total)| (id.clone(), TagVocabularyEntry::new(id, total)))
            .collect();
        Self { vocabulary }
    }

    pub fn entry(&self, id: &TagId) -> Option<&TagVocabularyEntry> {
        self.vocabulary.get(id)
    }

    pub fn known_tags(&self) -> BTreeSet<String> {
        self.vocabulary
            .keys()
            .filter_map(|id| id.name().map(str::to_string))
            .collect()
    }

    /// Changes one entry's state. Visibility is stale until [`Self::recompute`].
    pub fn set_tag_state(&mut self, id: &TagId, state: TagState) -> Result<(), ApplicationError> {
        let entry = self
            .vocabulary
            .get_mut(id)
            .ok_or_else(|| ApplicationError::NotFound(format!("tag {id} is not in the library")))?;
        entry.state = state;
        Ok(())
    }

    pub fn clear_states(&mut self) {
        for entry in self.vocabulary.values_mut() {
            entry.state = TagState::Default;
        }
    }

    pub fn filter(&self) -> TagFilter {
        let mut filter = TagFilter::default();
        for entry in self.vocabulary.values() {
            match (&entry.id, entry.state) {
                (TagId::Untagged, state) => filter.untagged = state,
                (TagId::Real(name), TagState::Whitelisted) => {
                    filter.whitelist.insert(name.clone());
                }
                (TagId::Real(name), TagState::Blacklisted) => {
                    filter.blacklist.insert(name.clone());
                }
                (TagId::Real(_), TagState::Default) => {}
            }
        }
        filter
    }

    /// Visible images and per-tag visible counts; also stored on the entries.
    pub fn recompute<'a>(&mut self, images: &'a [ImageRecord]) -> Visibility<'a> {
        let filter = self.filter();
        let mut visible_counts: BTreeMap<TagId, usize> =
            self.vocabulary.keys().map(|id| (id.clone(), 0)).collect();

        let visible: Vec<&ImageRecord> = images
            .iter()
            .filter(|image| filter.accepts(&image.tags))
            .collect();
        for image in &visible {
            if image.is_untagged() {
                *visible_counts.entry(TagId::Untagged).or_default() += 1;
            }
            for tag in &image.tags {
                *visible_counts.entry(TagId::real(tag.as_str())).or_default() += 1;
            }
        }

        for (id, entry) in self.vocabulary.iter_mut() {
            entry.visible_count = visible_counts.get(id).copied().unwrap_or_default();
        }
        Visibility {
            visible,
            visible_counts,
        }
    }

    /// Folds a tag-edit diff into the totals. Call [`Self::recompute`] afterwards.
    pub fn apply_edit(&mut self, edit: &TagEditResult) {
        for (tag, delta) in &edit.per_tag_delta {
            let id = TagId::real(tag.as_str());
            let current = self
                .vocabulary
                .get(&id)
                .map(|entry| entry.total_count as i64 + delta);
            match current {
                Some(total) if total <= 0 => {
                    self.vocabulary.remove(&id);
                }
                Some(total) => {
                    if let Some(entry) = self.vocabulary.get_mut(&id) {
                        entry.total_count = total as usize;
                    }
                }
                None if edit.created_tags.contains(tag) && *delta > 0 => {
                    self.vocabulary
                        .insert(id.clone(), TagVocabularyEntry::new(id, *delta as usize));
                }
                None => {}
            }
        }

        let untagged = self
            .vocabulary
            .entry(TagId::Untagged)
            .or_insert_with(|| TagVocabularyEntry::new(TagId::Untagged, 0));
        untagged.total_count = (untagged.total_count as i64 + edit.untagged_delta).max(0) as usize;
    }

    /// `Untagged` first, then real tags by name or by descending total.
    pub fn entries(&self, sort: TagSort) -> Vec<&TagVocabularyEntry> {
        let (untagged, mut real): (Vec<_>, Vec<_>) = self
            .vocabulary
            .values()
            .partition(|entry| entry.id == TagId::Untagged);
        if sort == TagSort::Count {
            real.sort_by_key(|entry| Reverse(entry.total_count));
        }
        untagged.into_iter().chain(real).collect()
    }
}
