use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tagshelf_application::DEFAULT_ICON_CACHE_BYTES;
use tracing::info;

const APP_DIR: &str = "tagshelf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub directories: Vec<PathBuf>,
    pub cache_path: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub exiv2_binary: PathBuf,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub icon_cache_bytes: usize,
    pub thumbnail_jobs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cache_dir = base_dir(dirs::cache_dir());
        Self {
            directories: Vec::new(),
            cache_path: cache_dir.join(APP_DIR).join("cache.json"),
            thumbnail_dir: cache_dir.join("thumbnails").join("normal"),
            exiv2_binary: PathBuf::from("exiv2"),
            thumbnail_width: 192,
            thumbnail_height: 128,
            icon_cache_bytes: DEFAULT_ICON_CACHE_BYTES,
            thumbnail_jobs: 2,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        base_dir(dirs::config_dir())
            .join(APP_DIR)
            .join("config.json")
    }

    /// Reads the config at `path`, writing the defaults there first when it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, String> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|error| format!("invalid config {}: {error}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(path)?;
                info!(path = %path.display(), "created default config");
                Ok(config)
            }
            Err(error) => Err(format!("cannot read config {}: {error}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| format!("cannot create {}: {error}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|error| error.to_string())?;
        fs::write(path, json).map_err(|error| format!("cannot write {}: {error}", path.display()))
    }

    /// Adds a library directory; returns false when it was already configured.
    pub fn add_directory(&mut self, directory: &Path) -> Result<bool, String> {
        let directory = canonical(directory)?;
        if self.directories.contains(&directory) {
            return Ok(false);
        }
        self.directories.push(directory);
        Ok(true)
    }

    pub fn remove_directory(&mut self, directory: &Path) -> bool {
        let canonical = directory.canonicalize().ok();
        let before = self.directories.len();
        self.directories
            .retain(|known| known != directory && Some(known) != canonical.as_ref());
        self.directories.len() != before
    }

    /// Command-line roots win over the configured directories.
    pub fn active_roots(&self, overrides: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
        if overrides.is_empty() {
            return Ok(self.directories.clone());
        }
        overrides.iter().map(|root| canonical(root)).collect()
    }
}

fn canonical(path: &Path) -> Result<PathBuf, String> {
    path.canonicalize()
        .map_err(|error| format!("{}: {error}", path.display()))
}

fn base_dir(preferred: Option<PathBuf>) -> PathBuf {
    preferred
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn first_load_writes_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("tagshelf/config.json");

        let config = AppConfig::load_or_create(&path).expect("load");

        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(AppConfig::load_or_create(&path).expect("reload"), config);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"directories": ["/photos"], "thumbnail_jobs": 4}"#).expect("write");

        let config = AppConfig::load_or_create(&path).expect("load");

        assert_eq!(config.directories, vec![PathBuf::from("/photos")]);
        assert_eq!(config.thumbnail_jobs, 4);
        assert_eq!(config.thumbnail_width, 192);
        assert_eq!(config.icon_cache_bytes, DEFAULT_ICON_CACHE_BYTES);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "[1, 2").expect("write");
        assert!(AppConfig::load_or_create(&path).is_err());
    }

    #[test]
    fn directories_are_canonical_and_unique() {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir(dir.path().join("photos")).expect("mkdir");
        let mut config = AppConfig::default();

        assert!(config
            .add_directory(&dir.path().join("photos"))
            .expect("add"));
        assert!(!config
            .add_directory(&dir.path().join("photos/../photos"))
            .expect("add again"));
        assert_eq!(config.directories.len(), 1);
        assert!(config.add_directory(&dir.path().join("absent")).is_err());

        assert!(config.remove_directory(&dir.path().join("photos")));
        assert!(config.directories.is_empty());
        assert!(!config.remove_directory(&dir.path().join("photos")));
    }

    #[test]
    fn overrides_replace_configured_roots() {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig {
            directories: vec![PathBuf::from("/configured")],
            ..AppConfig::default()
        };

        assert_eq!(
            config.active_roots(&[]).expect("roots"),
            vec![PathBuf::from("/configured")]
        );
        assert_eq!(
            config
                .active_roots(&[dir.path().to_path_buf()])
                .expect("roots"),
            vec![dir.path().canonicalize().expect("canonical")]
        );
    }
}
