// Local directory layout: every mapped dataset lives in `<base>/output/<name>`.

use std::path::{Path, PathBuf};

const OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    base_dir: PathBuf,
}

impl DataLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding all mapped datasets.
    pub fn output_dir(&self) -> PathBuf {
        self.base_dir.join(OUTPUT_DIR)
    }

    /// Mapped directory of one dataset.
    pub fn dataset_dir(&self, name: &str) -> PathBuf {
        self.output_dir().join(name)
    }

    /// Local file for a diff entry; a blank path puts it at the dataset root.
    pub fn resolve(&self, dataset: &str, relative_path: &str, file_name: &str) -> PathBuf {
        let dir = self.dataset_dir(dataset);
        let rel = relative_path.trim().trim_matches('/');
        if rel.is_empty() {
            dir.join(file_name)
        } else {
            dir.join(rel).join(file_name)
        }
    }
}
