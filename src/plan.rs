use crate::{
    errors::{FileOperation, IoError},
    transactions::{Active, RollbackOperation, Transaction},
};
use miette::Diagnostic;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error, Diagnostic)]
pub enum PlanError {
    #[error("I/O error within plan domain")]
    #[diagnostic(code(dsp_pynq::plan::io))]
    Io(#[from] IoError),

    #[error("source directory {path} does not exist")]
    #[diagnostic(
        code(dsp_pynq::plan::source_missing),
        help("The package may be incomplete; rebuild it for your board")
    )]
    SourceMissing { path: PathBuf },

    #[error("unable to strip prefix from directory")]
    #[diagnostic(code(dsp_pynq::plan::strip_prefix))]
    StripPrefix {
        path: PathBuf,
        dir: PathBuf,
        source: std::path::StripPrefixError,
    },
}

/// A file or directory to be copied from `source` to `destination`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    pub source: PathBuf,
    /// Relative to the root the plan is applied to.
    pub destination: PathBuf,
    /// Indicates whether this entry is a file (`true`) or a directory (`false`).
    pub is_file: bool,
}
/// An ordered list of copies, built by walking source trees before anything
/// is written so that the whole set can be previewed or applied in one go.
#[derive(Debug, Clone, Default)]
pub struct TreePlan {
    pub entries: Vec<PlannedEntry>,
}
impl TreePlan {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
    /// Walks `source_root` in file name order and plans every entry below it
    /// under `prefix`. An empty `prefix` maps the tree onto the plan root.
    pub fn add_tree(&mut self, source_root: &Path, prefix: &Path) -> Result<(), PlanError> {
        if !source_root.is_dir() {
            return Err(PlanError::SourceMissing {
                path: source_root.to_path_buf(),
            });
        }

        // symlinks are copied as what they point to
        for entry in WalkDir::new(source_root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|error| IoError::from_walk(source_root, error))?;

            let full_path = entry.path();
            let relative = match full_path.strip_prefix(source_root) {
                Ok(r) => r,
                Err(error) => Err(PlanError::StripPrefix {
                    path: full_path.to_path_buf(),
                    dir: source_root.to_path_buf(),
                    source: error,
                })?,
            };

            let destination = prefix.join(relative);

            // the root of an unprefixed tree is the plan root itself
            if destination.as_os_str().is_empty() {
                continue;
            }

            self.entries.push(PlannedEntry {
                source: full_path.to_path_buf(),
                destination,
                is_file: !entry.file_type().is_dir(),
            });
        }

        Ok(())
    }
    pub fn files(&self) -> impl Iterator<Item = &PlannedEntry> {
        self.entries.iter().filter(|e| e.is_file)
    }
    /// Destinations of planned files, each listed once even when several
    /// trees write to it. The last planned entry for a destination wins on apply.
    pub fn file_destinations(&self) -> Vec<&Path> {
        let mut seen = HashSet::new();

        self.files()
            .map(|entry| entry.destination.as_path())
            .filter(|destination| seen.insert(*destination))
            .collect()
    }
    /// Copies every planned entry below `root`, directories first.
    ///
    /// Only paths that did not exist beforehand are registered on `trx`, so a
    /// rollback never deletes something the plan merely overwrote. Returns the
    /// destination of every copied file once.
    pub fn apply(
        &self,
        root: &Path,
        trx: &mut Transaction<Active>,
    ) -> Result<Vec<PathBuf>, PlanError> {
        for entry in self.entries.iter().filter(|e| !e.is_file) {
            create_directory(trx, &root.join(&entry.destination))?;
        }

        for entry in self.files() {
            let final_path = root.join(&entry.destination);

            if let Some(parent) = final_path.parent() {
                create_directory(trx, parent)?;
            }

            copy_file(trx, &entry.source, &final_path)?;
        }

        Ok(self
            .file_destinations()
            .into_iter()
            .map(|destination| root.join(destination))
            .collect())
    }
}

/// Creates all directories in the specified path if they do not exist,
/// registering a [`RollbackOperation::RemoveDir`] for the topmost one created.
fn create_directory(trx: &mut Transaction<Active>, path: &Path) -> Result<(), PlanError> {
    if path.is_dir() {
        return Ok(());
    }

    let topmost_missing = path
        .ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
        .last()
        .unwrap_or(path)
        .to_path_buf();

    fs::create_dir_all(path).map_err(|error| IoError::new(FileOperation::Mkdir, path.into(), error))?;

    trx.add_operation(RollbackOperation::RemoveDir(topmost_missing));

    Ok(())
}
fn copy_file(trx: &mut Transaction<Active>, source: &Path, path: &Path) -> Result<(), PlanError> {
    let existed = path.exists();

    fs::copy(source, path).map_err(|error| IoError::new(FileOperation::Copy, path.into(), error))?;

    log::debug!("copy {} -> {}", source.display(), path.display());

    if !existed {
        trx.add_operation(RollbackOperation::RemoveFile(path.to_path_buf()));
    }

    Ok(())
}
