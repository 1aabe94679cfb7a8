use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use tagshelf_domain::ImageRecord;

use crate::ThumbnailRequest;

#[derive(Debug, Clone, Default)]
pub struct StartIndexCommand {
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct CancelIndexCommand;

/// `wait: None` polls without blocking.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollEventQuery {
    pub wait: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadLibraryCommand {
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct EditTagsCommand {
    pub selection: Vec<ImageRecord>,
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
    pub known_tags: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TagSummaryQuery {
    pub selection: Vec<ImageRecord>,
    pub known_tags: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct ThumbnailCommand {
    pub path: PathBuf,
    pub force_regenerate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitThumbnailsCommand {
    pub requests: Vec<ThumbnailRequest>,
}
