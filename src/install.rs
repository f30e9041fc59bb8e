use crate::{
    config::{self, ConfigError},
    errors::{FileOperation, IoError},
    plan::{PlanError, TreePlan},
    transactions::{Active, RollbackOperation, Transaction},
};
use miette::Diagnostic;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Name of the directory created inside the notebook directory.
pub const PROJECT_DIR_NAME: &str = "dsp_pynq";
/// Subdirectory of the project directory receiving the bitstreams.
pub const ASSETS_DIR_NAME: &str = "assets";

const STAGING_PREFIX: &str = ".dsp_pynq-staging-";

#[derive(Debug, Error, Diagnostic)]
pub enum InstallError {
    #[error("I/O error within install domain")]
    #[diagnostic(code(dsp_pynq::install::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),
}

/// The notebook and bitstream trees shipped with a package.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub notebooks: PathBuf,
    pub bitstreams: PathBuf,
}
impl Bundle {
    /// A package data directory holds `notebooks/` and `bitstreams/` side by side.
    pub fn from_package_dir(package_dir: &Path) -> Self {
        Self {
            notebooks: package_dir.join("notebooks"),
            bitstreams: package_dir.join("bitstreams"),
        }
    }
    /// Plans the project directory contents: notebooks at the top, bitstreams under `assets/`.
    pub fn plan(&self) -> Result<TreePlan, InstallError> {
        let mut plan = TreePlan::new();

        plan.add_tree(&self.notebooks, Path::new(""))?;
        plan.add_tree(&self.bitstreams, Path::new(ASSETS_DIR_NAME))?;

        Ok(plan)
    }
}

/// Outcome of a successful install.
#[derive(Debug)]
pub struct InstallReport {
    pub project_dir: PathBuf,
    /// Every installed file, in plan order.
    pub files: Vec<PathBuf>,
    /// Whether a previous project directory was replaced.
    pub replaced: bool,
}

/// Resolves the notebook directory and plans the install without touching the filesystem.
///
/// Returns the project directory the plan would be applied to.
pub fn plan_install(
    bundle: &Bundle,
    destination: Option<&Path>,
) -> Result<(PathBuf, TreePlan), InstallError> {
    let notebook_dir =
        config::resolve_notebook_dir(destination, std::env::var_os(config::NOTEBOOKS_ENV))?;

    let plan = bundle.plan()?;

    Ok((notebook_dir.join(PROJECT_DIR_NAME), plan))
}

/// Installs `bundle` into `destination`, or into the directory named by
/// `PYNQ_JUPYTER_NOTEBOOKS` when no destination is given.
///
/// # Errors
///
/// Returns an [`InstallError`] if:
///
/// - No destination was given and the environment variable is unset.
/// - The destination is not an existing directory.
/// - The bundle's notebook or bitstream tree is missing.
/// - Staging, copying or swapping the project directory fails. The previous
///   project directory is left in place in that case.
pub fn install(bundle: &Bundle, destination: Option<&Path>) -> Result<InstallReport, InstallError> {
    let notebook_dir =
        config::resolve_notebook_dir(destination, std::env::var_os(config::NOTEBOOKS_ENV))?;

    install_into(bundle, &notebook_dir)
}

/// Installs `bundle` into an already resolved notebook directory.
///
/// The new tree is staged next to the project directory and renamed into
/// place, so the destination holds either the previous install or the new
/// one, never a partial copy.
pub fn install_into(bundle: &Bundle, notebook_dir: &Path) -> Result<InstallReport, InstallError> {
    let project_dir = notebook_dir.join(PROJECT_DIR_NAME);

    // validates both source trees before anything is written
    let plan = bundle.plan()?;

    log::info!(
        "installing {} file(s) into {}",
        plan.file_destinations().len(),
        project_dir.display()
    );

    remove_stale_staging(notebook_dir)?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(notebook_dir)
        .map_err(|error| IoError::new(FileOperation::Stage, notebook_dir.to_path_buf(), error))?;

    let staged = staging.path().join(PROJECT_DIR_NAME);

    fs::create_dir(&staged)
        .map_err(|error| IoError::new(FileOperation::Mkdir, staged.clone(), error))?;

    // whatever lands in staging is removed together with the TempDir
    let mut staging_trx = Transaction::<Active>::new();
    plan.apply(&staged, &mut staging_trx)?;
    staging_trx.commit();

    let mut trx = Transaction::<Active>::new();

    let replaced = project_dir.symlink_metadata().is_ok();

    if replaced {
        let previous = staging.path().join("previous");

        log::debug!("moving previous install aside: {}", project_dir.display());

        fs::rename(&project_dir, &previous)
            .map_err(|error| IoError::new(FileOperation::Rename, project_dir.clone(), error))?;

        trx.add_operation(RollbackOperation::Restore {
            from: previous,
            to: project_dir.clone(),
        });
    }

    fs::rename(&staged, &project_dir)
        .map_err(|error| IoError::new(FileOperation::Rename, project_dir.clone(), error))?;

    trx.commit();

    let files = plan
        .file_destinations()
        .into_iter()
        .map(|destination| project_dir.join(destination))
        .collect();

    Ok(InstallReport {
        project_dir,
        files,
        replaced,
    })
}

/// Removes staging directories left behind by an install that never finished.
fn remove_stale_staging(notebook_dir: &Path) -> Result<(), InstallError> {
    let entries = fs::read_dir(notebook_dir)
        .map_err(|error| IoError::new(FileOperation::Read, notebook_dir.to_path_buf(), error))?;

    for entry in entries {
        let entry = entry
            .map_err(|error| IoError::new(FileOperation::Read, notebook_dir.to_path_buf(), error))?;

        let path = entry.path();

        if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) || !path.is_dir() {
            continue;
        }

        log::warn!("removing leftover staging directory {}", path.display());

        fs::remove_dir_all(&path)
            .map_err(|error| IoError::new(FileOperation::Remove, path.clone(), error))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn make_bundle(root: &Path) -> Bundle {
        let bundle = Bundle::from_package_dir(root);

        fs::create_dir_all(bundle.notebooks.join("common")).unwrap();
        fs::create_dir_all(&bundle.bitstreams).unwrap();
        fs::write(bundle.notebooks.join("01_intro.ipynb"), "{\"cells\": []}").unwrap();
        fs::write(bundle.notebooks.join("common/plot.py"), "import plotly").unwrap();
        fs::write(bundle.bitstreams.join("dsp.bit"), [0xffu8, 0x00, 0xaa]).unwrap();
        fs::write(bundle.bitstreams.join("dsp.hwh"), "<xml/>").unwrap();

        bundle
    }

    fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(root).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_install_mirrors_bundle() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());

        let report = install(&bundle, Some(notebooks.path())).unwrap();

        assert!(!report.replaced);
        assert_eq!(report.files.len(), 4);

        let installed = snapshot(&notebooks.path().join(PROJECT_DIR_NAME));
        let mut expected = snapshot(&bundle.notebooks);
        for (path, content) in snapshot(&bundle.bitstreams) {
            expected.insert(Path::new(ASSETS_DIR_NAME).join(path), content);
        }

        assert_eq!(installed, expected);
    }

    #[test]
    fn test_install_twice_is_idempotent() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());
        let project_dir = notebooks.path().join(PROJECT_DIR_NAME);

        install(&bundle, Some(notebooks.path())).unwrap();
        let first = snapshot(&project_dir);

        fs::write(project_dir.join("stale.ipynb"), "old").unwrap();

        let report = install(&bundle, Some(notebooks.path())).unwrap();

        assert!(report.replaced);
        assert_eq!(snapshot(&project_dir), first);
    }

    #[test]
    fn test_install_leaves_no_staging_behind() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());

        install(&bundle, Some(notebooks.path())).unwrap();
        install(&bundle, Some(notebooks.path())).unwrap();

        let names: Vec<_> = fs::read_dir(notebooks.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(names, vec![std::ffi::OsString::from(PROJECT_DIR_NAME)]);
    }

    #[test]
    fn test_missing_destination_is_config_error() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());
        let missing = notebooks.path().join("missing");

        let result = install(&bundle, Some(&missing));

        assert!(matches!(
            result,
            Err(InstallError::Config(ConfigError::NotebookDirNotFound { .. }))
        ));
        assert!(!missing.exists());
    }

    #[test]
    fn test_missing_bitstreams_keeps_previous_install() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());
        let project_dir = notebooks.path().join(PROJECT_DIR_NAME);

        install(&bundle, Some(notebooks.path())).unwrap();
        let before = snapshot(&project_dir);

        fs::remove_dir_all(&bundle.bitstreams).unwrap();

        let result = install(&bundle, Some(notebooks.path()));

        assert!(matches!(
            result,
            Err(InstallError::Plan(PlanError::SourceMissing { .. }))
        ));
        assert_eq!(snapshot(&project_dir), before);
    }

    #[test]
    fn test_plan_install_does_not_write() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());

        let (project_dir, plan) = plan_install(&bundle, Some(notebooks.path())).unwrap();

        assert_eq!(project_dir, notebooks.path().join(PROJECT_DIR_NAME));
        assert_eq!(plan.files().count(), 4);
        assert!(!project_dir.exists());
    }

    #[test]
    fn test_install_removes_leftover_staging() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());
        let leftover = notebooks.path().join(".dsp_pynq-staging-abc123");
        fs::create_dir_all(leftover.join("previous")).unwrap();
        fs::write(leftover.join("previous/01_intro.ipynb"), "old").unwrap();

        install(&bundle, Some(notebooks.path())).unwrap();

        assert!(!leftover.exists());
        assert!(notebooks.path().join(PROJECT_DIR_NAME).is_dir());
    }

    #[test]
    fn test_report_lists_clashing_asset_once() {
        let package = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());
        fs::create_dir_all(bundle.notebooks.join(ASSETS_DIR_NAME)).unwrap();
        fs::write(bundle.notebooks.join("assets/dsp.bit"), "from notebooks").unwrap();

        let report = install(&bundle, Some(notebooks.path())).unwrap();

        assert_eq!(report.files.len(), 4);
        assert_eq!(
            fs::read(notebooks.path().join("dsp_pynq/assets/dsp.bit")).unwrap(),
            [0xffu8, 0x00, 0xaa]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_install_follows_symlinked_notebook_dir() {
        let package = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        let notebooks = TempDir::new().unwrap();
        let bundle = make_bundle(package.path());
        fs::remove_dir_all(bundle.notebooks.join("common")).unwrap();
        fs::write(shared.path().join("helper.py"), "import plotly").unwrap();
        std::os::unix::fs::symlink(shared.path(), bundle.notebooks.join("common")).unwrap();

        install(&bundle, Some(notebooks.path())).unwrap();

        assert_eq!(
            fs::read_to_string(notebooks.path().join("dsp_pynq/common/helper.py")).unwrap(),
            "import plotly"
        );
    }
}
