use crate::{
    errors::{FileOperation, IoError},
    plan::PlanError,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Every data file under the package directory, relative to the repository root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub files: Vec<PathBuf>,
}
impl Manifest {
    /// Walks `root/package_dir`. Fails when the package directory is not below `root`,
    /// since its files could not be listed relative to it.
    pub fn collect(root: &Path, package_dir: &Path) -> Result<Self, PlanError> {
        let walk_root = root.join(package_dir);
        let mut files = vec![];

        for entry in WalkDir::new(&walk_root).sort_by_file_name() {
            let entry = entry.map_err(|error| IoError::from_walk(&walk_root, error))?;

            if entry.file_type().is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|error| PlanError::StripPrefix {
                    path: entry.path().to_path_buf(),
                    dir: root.to_path_buf(),
                    source: error,
                })?;

            files.push(relative.to_path_buf());
        }

        Ok(Self { files })
    }
    pub fn to_text(&self) -> String {
        self.files
            .iter()
            .map(|path| format!("{}\n", path.display()))
            .collect()
    }
    pub fn write_to(&self, path: &Path) -> Result<(), IoError> {
        fs::write(path, self.to_text())
            .map_err(|error| IoError::new(FileOperation::Write, path.to_path_buf(), error))
    }
}
