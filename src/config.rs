//! Storage directory configuration
//!
//! The only input the core takes is the storage directory path. Production
//! vs. development defaults are a policy decision left to the embedding
//! application; this mirrors `pysql/conf.py`'s `DEFAULT_STORAGE_DIR`
//! without baking in an environment switch.

use std::path::{Path, PathBuf};

/// Configuration for a [`crate::StorageManager`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding `docstore.data`, `docstore.index.data`, and
    /// `docstore.delete.data`. Created on startup if absent.
    pub storage_dir: PathBuf,
}

impl StorageConfig {
    /// Create a config pointing at the given storage directory.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    /// Returns the storage directory path.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_data_dir() {
        let config = StorageConfig::default();
        assert_eq!(config.storage_dir(), Path::new("data"));
    }

    #[test]
    fn test_new_accepts_any_path_like() {
        let config = StorageConfig::new("/tmp/mystore");
        assert_eq!(config.storage_dir(), Path::new("/tmp/mystore"));
    }
}
