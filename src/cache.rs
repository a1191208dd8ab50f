use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::{DashboardError, LoadError};
use crate::loader;
use crate::models::Dataset;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn read(path: &Path) -> Result<Self, LoadError> {
        let metadata = fs::metadata(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                LoadError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

#[derive(Debug, Default)]
pub struct DatasetCache {
    stamp: Option<FileStamp>,
    dataset: Dataset,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, path: &Path) -> Result<&Dataset, DashboardError> {
        let stamp = FileStamp::read(path)?;

        if self.stamp.as_ref() != Some(&stamp) {
            debug!(path = %path.display(), "dataset cache miss");
            self.dataset = loader::load_dataset(path)?;
            self.stamp = Some(stamp);
        }

        Ok(&self.dataset)
    }

    pub fn invalidate(&mut self) {
        self.stamp = None;
        self.dataset = Dataset::default();
    }

    #[cfg(test)]
    pub fn is_cached(&self, path: &Path) -> bool {
        self.stamp.as_ref().is_some_and(|stamp| stamp.path == path)
    }
}
