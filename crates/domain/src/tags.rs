use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use crate::DomainError;

/// Key of a vocabulary entry. `Untagged` is the pseudo-tag for images without tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagId {
    Untagged,
    Real(String),
}

impl TagId {
    pub fn real(name: impl Into<String>) -> Self {
        Self::Real(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Untagged => None,
            Self::Real(name) => Some(name),
        }
    }
}

impl Display for TagId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Untagged => write!(f, "<Untagged>"),
            Self::Real(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagState {
    #[default]
    Default,
    Whitelisted,
    Blacklisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagVocabularyEntry {
    pub id: TagId,
    pub total_count: usize,
    pub visible_count: usize,
    pub state: TagState,
}

impl TagVocabularyEntry {
    pub fn new(id: TagId, total_count: usize) -> Self {
        Self {
            id,
            total_count,
            visible_count: total_count,
            state: TagState::Default,
        }
    }
}

/// The visibility predicate derived from the vocabulary states.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagFilter {
    pub whitelist: BTreeSet<String>,
    pub blacklist: BTreeSet<String>,
    pub untagged: TagState,
}

impl TagFilter {
    /// An image is hidden when any of these holds:
    /// untagged is whitelisted and the image has tags; untagged is
    /// blacklisted and the image has none; the whitelist is not a subset of
    /// its tags; the blacklist intersects its tags.
    pub fn accepts(&self, tags: &BTreeSet<String>) -> bool {
        let hidden = (self.untagged == TagState::Whitelisted && !tags.is_empty())
            || (self.untagged == TagState::Blacklisted && tags.is_empty())
            || (!self.whitelist.is_empty() && !self.whitelist.is_subset(tags))
            || (!self.blacklist.is_empty() && !self.blacklist.is_disjoint(tags));
        !hidden
    }

    pub fn is_passthrough(&self) -> bool {
        self.whitelist.is_empty() && self.blacklist.is_empty() && self.untagged == TagState::Default
    }
}

/// Trims a user-supplied tag and rejects names that would collide with `Untagged`.
pub fn normalize_tag_name(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidTagName(raw.to_string()));
    }
    Ok(trimmed.to_string())
}
