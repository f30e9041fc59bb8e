use crate::{
    config::{self, ConfigError, Layout},
    errors::IoError,
    install::{self, Bundle, InstallError},
    manifest::Manifest,
    plan::{PlanError, TreePlan},
    transactions::{Active, Transaction},
};
use miette::Diagnostic;
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum PackageError {
    #[error("I/O error within package domain")]
    #[diagnostic(code(dsp_pynq::package::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Install(#[from] InstallError),

    #[error("unable to start build command '{program}': {source}")]
    #[diagnostic(
        code(dsp_pynq::package::build_spawn),
        help("Make sure the build tool is installed and on PATH")
    )]
    BuildSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build for board {board} failed with exit code {code:?}")]
    #[diagnostic(
        code(dsp_pynq::package::build_failed),
        help("Check the build output above; nothing was copied")
    )]
    BuildFailed { board: String, code: Option<i32> },
}

/// Where the build artifacts end up.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageTarget {
    /// Into the package data directory, followed by a manifest.
    Package,
    /// Straight into the live notebook directory of the connected board.
    Deploy { notebook_dir: Option<PathBuf> },
}

#[derive(Debug)]
pub struct PackageReport {
    pub board: String,
    /// Every file copied by this run.
    pub files: Vec<PathBuf>,
    /// Written for [`PackageTarget::Package`] only.
    pub manifest: Option<(PathBuf, Manifest)>,
}

/// Builds the board's artifacts and copies them to `target`.
///
/// # Errors
///
/// Returns a [`PackageError`] if:
///
/// - The board is not given and `BOARD` is unset, or the board has no directory.
/// - The layout file cannot be read or parsed.
/// - The build command cannot be started or exits non-zero. Nothing is copied.
/// - Copying the artifacts or writing the manifest fails.
pub fn package(
    root: &Path,
    board: Option<&str>,
    target: &PackageTarget,
) -> Result<PackageReport, PackageError> {
    let layout = Layout::load(root)?;

    let board = config::resolve_board(board, std::env::var_os(config::BOARD_ENV))?;

    let board_dir = layout.board_dir(root, &board)?;

    // resolved up front so a bad notebook directory fails before the build
    let deploy_dir = match target {
        PackageTarget::Package => None,
        PackageTarget::Deploy { notebook_dir } => Some(config::resolve_notebook_dir(
            notebook_dir.as_deref(),
            std::env::var_os(config::NOTEBOOKS_ENV),
        )?),
    };

    run_build(&layout, root, &board)?;

    match deploy_dir {
        None => copy_into_package(&layout, root, &board, &board_dir),
        Some(notebook_dir) => {
            let bundle = Bundle {
                notebooks: notebooks_source(&layout, root),
                bitstreams: board_dir.join("bitstreams"),
            };

            let report = install::install_into(&bundle, &notebook_dir)?;

            Ok(PackageReport {
                board,
                files: report.files,
                manifest: None,
            })
        }
    }
}

fn notebooks_source(layout: &Layout, root: &Path) -> PathBuf {
    match &layout.notebooks_dir {
        Some(dir) => root.join(dir),
        None => root.join(&layout.package_dir).join("notebooks"),
    }
}

/// Runs `build_program build_args... -C boards/<board>` from `root`.
fn run_build(layout: &Layout, root: &Path, board: &str) -> Result<(), PackageError> {
    let board_dir = layout.boards_dir.join(board);

    log::info!(
        "building board {} with {} in {}",
        board,
        layout.build_program,
        root.join(&board_dir).display()
    );

    let status = Command::new(&layout.build_program)
        .args(&layout.build_args)
        .arg("-C")
        .arg(&board_dir)
        .current_dir(root)
        .status()
        .map_err(|error| PackageError::BuildSpawn {
            program: layout.build_program.clone(),
            source: error,
        })?;

    if !status.success() {
        return Err(PackageError::BuildFailed {
            board: board.to_string(),
            code: status.code(),
        });
    }

    Ok(())
}

fn copy_into_package(
    layout: &Layout,
    root: &Path,
    board: &str,
    board_dir: &Path,
) -> Result<PackageReport, PackageError> {
    let package_dir = root.join(&layout.package_dir);

    let mut plan = TreePlan::new();

    for subdir in &layout.board_subdirs {
        plan.add_tree(&board_dir.join(subdir), Path::new(subdir))?;
    }

    if let Some(notebooks_dir) = &layout.notebooks_dir {
        let source = root.join(notebooks_dir);

        if source != package_dir.join("notebooks") {
            plan.add_tree(&source, Path::new("notebooks"))?;
        }
    }

    let mut trx = Transaction::<Active>::new();

    let files = plan.apply(&package_dir, &mut trx)?;

    let manifest = Manifest::collect(root, &layout.package_dir)?;
    let manifest_path = root.join(&layout.manifest);
    manifest.write_to(&manifest_path)?;

    trx.commit();

    log::info!(
        "copied {} file(s) for {}, manifest lists {}",
        files.len(),
        board,
        manifest.files.len()
    );

    Ok(PackageReport {
        board: board.to_string(),
        files,
        manifest: Some((manifest_path, manifest)),
    })
}
