use crate::{
    config::{self, ConfigError},
    install::{self, Bundle, InstallError, InstallReport},
    package::{self, PackageError, PackageReport, PackageTarget},
    preview,
};
use std::path::Path;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DspPynqError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Package(#[from] PackageError),
}

fn locate_bundle(package_dir: Option<&Path>) -> Result<Bundle, ConfigError> {
    let exe = std::env::current_exe().ok();

    let package_dir = config::resolve_package_dir(
        package_dir,
        std::env::var_os(config::PACKAGE_DIR_ENV),
        exe.as_deref(),
    )?;

    log::debug!("package data directory: {}", package_dir.display());

    Ok(Bundle::from_package_dir(&package_dir))
}

/// Copies the bundled notebooks and bitstreams into `<destination>/dsp_pynq`.
///
/// `package_dir` overrides where the bundle is looked up; `destination`
/// falls back to `PYNQ_JUPYTER_NOTEBOOKS`.
///
/// # Errors
///
/// Returns a [`DspPynqError`] if:
///
/// - The package data directory cannot be located.
/// - The destination is missing or does not exist.
/// - A source tree is missing or a copy fails.
pub fn install_notebooks(
    package_dir: Option<&Path>,
    destination: Option<&Path>,
) -> Result<InstallReport, DspPynqError> {
    let bundle = locate_bundle(package_dir)?;

    Ok(install::install(&bundle, destination)?)
}

/// Prints what [`install_notebooks`] would install without writing anything.
pub fn preview_install(
    package_dir: Option<&Path>,
    destination: Option<&Path>,
) -> Result<(), DspPynqError> {
    let bundle = locate_bundle(package_dir)?;

    let (project_dir, plan) = install::plan_install(&bundle, destination)?;

    preview::preview_as_tree(&plan, &project_dir);

    Ok(())
}

/// Builds the artifacts for `board` (or `BOARD`) under `root` and copies them to `target`.
pub fn build_package(
    root: &Path,
    board: Option<&str>,
    target: &PackageTarget,
) -> Result<PackageReport, DspPynqError> {
    Ok(package::package(root, board, target)?)
}
