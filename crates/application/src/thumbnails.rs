use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tagshelf_domain::{canonical_uri, thumbnail_file_name, thumbnail_key, Icon};
use tracing::{debug, warn};

use crate::{ApplicationError, ThumbnailGenerator};

/// Default icon cache budget: 256 MiB of decoded pixels.
pub const DEFAULT_ICON_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// In-memory path → icon map, evicting least recently used icons over budget.
struct IconCache {
    icons: HashMap<PathBuf, Icon>,
    usage: VecDeque<PathBuf>,
    used_bytes: usize,
    budget_bytes: usize,
}

impl IconCache {
    fn new(budget_bytes: usize) -> Self {
        Self {
            icons: HashMap::new(),
            usage: VecDeque::new(),
            used_bytes: 0,
            budget_bytes,
        }
    }

    fn get(&mut self, path: &Path) -> Option<Icon> {
        let icon = self.icons.get(path)?.clone();
        self.touch(path);
        Some(icon)
    }

    fn insert(&mut self, path: PathBuf, icon: Icon) {
        if icon.byte_len() > self.budget_bytes {
            return;
        }
        if let Some(previous) = self.icons.remove(&path) {
            self.used_bytes -= previous.byte_len();
            self.usage.retain(|used| used != &path);
        }
        self.used_bytes += icon.byte_len();
        self.usage.push_back(path.clone());
        self.icons.insert(path, icon);

        while self.used_bytes > self.budget_bytes {
            let Some(oldest) = self.usage.pop_front() else {
                break;
            };
            if let Some(evicted) = self.icons.remove(&oldest) {
                self.used_bytes -= evicted.byte_len();
                debug!(path = %oldest.display(), "evicted icon");
            }
        }
    }

    fn touch(&mut self, path: &Path) {
        if let Some(position) = self.usage.iter().position(|used| used == path) {
            if let Some(entry) = self.usage.remove(position) {
                self.usage.push_back(entry);
            }
        }
    }
}

/// Content-addressed thumbnail store in front of a [`ThumbnailGenerator`].
pub struct ThumbnailCache {
    generator: Arc<dyn ThumbnailGenerator>,
    thumbnail_dir: PathBuf,
    icons: Mutex<IconCache>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThumbnailCache {
    pub fn new(
        generator: Arc<dyn ThumbnailGenerator>,
        thumbnail_dir: PathBuf,
        icon_cache_bytes: usize,
    ) -> Self {
        Self {
            generator,
            thumbnail_dir,
            icons: Mutex::new(IconCache::new(icon_cache_bytes)),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn thumbnail_dir(&self) -> &Path {
        &self.thumbnail_dir
    }

    pub fn thumbnail_path(&self, canonical_uri: &[u8]) -> PathBuf {
        self.thumbnail_dir
            .join(thumbnail_file_name(&thumbnail_key(canonical_uri)))
    }

    /// [`Self::get_or_create`] with the canonical URI derived from `path`.
    pub fn icon_for(&self, path: &Path, force_regenerate: bool) -> Result<Icon, ApplicationError> {
        self.get_or_create(path, &canonical_uri(path), force_regenerate)
    }

    /// Errors only on poisoned locks; every decode or write failure yields the
    /// failure icon, which is never cached.
    pub fn get_or_create(
        &self,
        path: &Path,
        canonical_uri: &[u8],
        force_regenerate: bool,
    ) -> Result<Icon, ApplicationError> {
        if !force_regenerate {
            if let Some(icon) = self.lock_icons()?.get(path) {
                return Ok(icon);
            }
        }

        let key = thumbnail_key(canonical_uri);
        let thumb_path = self.thumbnail_dir.join(thumbnail_file_name(&key));
        let key_lock = self.key_lock(&key)?;
        let icon = {
            let _serialized = key_lock
                .lock()
                .map_err(|_| ApplicationError::Io("thumbnail key lock poisoned".to_string()))?;
            self.load_or_generate(path, canonical_uri, &thumb_path, force_regenerate)
        };
        self.release_key_lock(&key, key_lock)?;

        if !icon.is_failure() {
            self.lock_icons()?.insert(path.to_path_buf(), icon.clone());
        }
        Ok(icon)
    }

    fn load_or_generate(
        &self,
        path: &Path,
        canonical_uri: &[u8],
        thumb_path: &Path,
        force_regenerate: bool,
    ) -> Icon {
        if !force_regenerate {
            match self.generator.load_icon(thumb_path) {
                Ok(Some(icon)) => return icon,
                Ok(None) => {}
                Err(error) => {
                    warn!(thumbnail = %thumb_path.display(), %error, "cached thumbnail unreadable, regenerating");
                }
            }
        }

        if let Err(error) = self.generator.generate(path, canonical_uri, thumb_path) {
            warn!(path = %path.display(), %error, "thumbnail generation failed");
            return self.generator.failure_icon();
        }
        match self.generator.load_icon(thumb_path) {
            Ok(Some(icon)) => icon,
            Ok(None) => {
                warn!(thumbnail = %thumb_path.display(), "generated thumbnail is missing");
                self.generator.failure_icon()
            }
            Err(error) => {
                warn!(thumbnail = %thumb_path.display(), %error, "generated thumbnail unreadable");
                self.generator.failure_icon()
            }
        }
    }

    pub fn failure_icon(&self) -> Icon {
        self.generator.failure_icon()
    }

    /// Leaves the icon map poisoned, as if a holder had panicked.
    #[cfg(test)]
    pub(crate) fn poison_icons(&self) {
        std::thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _held = self.icons.lock();
                    panic!("icon map holder panicked");
                })
                .join();
        });
    }

    fn lock_icons(&self) -> Result<std::sync::MutexGuard<'_, IconCache>, ApplicationError> {
        self.icons
            .lock()
            .map_err(|_| ApplicationError::Io("icon cache lock poisoned".to_string()))
    }

    fn key_lock(&self, key: &str) -> Result<Arc<Mutex<()>>, ApplicationError> {
        let mut locks = self
            .key_locks
            .lock()
            .map_err(|_| ApplicationError::Io("thumbnail key locks poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(key.to_string()).or_default()))
    }

    fn release_key_lock(&self, key: &str, lock: Arc<Mutex<()>>) -> Result<(), ApplicationError> {
        let mut locks = self
            .key_locks
            .lock()
            .map_err(|_| ApplicationError::Io("thumbnail key locks poisoned".to_string()))?;
        // One reference in the map and ours: nobody else is waiting on this key.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
        Ok(())
    }
}
