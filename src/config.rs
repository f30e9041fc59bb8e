use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Names the board whose artifacts get built and packaged.
pub const BOARD_ENV: &str = "BOARD";
/// Points at the notebook directory served on a running board.
pub const NOTEBOOKS_ENV: &str = "PYNQ_JUPYTER_NOTEBOOKS";
/// Overrides where the installed package data lives.
pub const PACKAGE_DIR_ENV: &str = "DSP_PYNQ_PACKAGE_DIR";
/// Optional layout file read from the repository root.
pub const LAYOUT_FILE: &str = "dsp-pynq.toml";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("I/O error within config domain")]
    #[diagnostic(code(dsp_pynq::config::io))]
    Io(#[from] IoError),

    #[error("environment variable {var} is not set")]
    #[diagnostic(
        code(dsp_pynq::config::missing_env),
        help("Export the variable or pass the value on the command line")
    )]
    MissingEnv { var: &'static str },

    #[error("directory {path} does not exist")]
    #[diagnostic(
        code(dsp_pynq::config::notebook_dir_not_found),
        help("Please supply an existing notebook directory as the destination argument")
    )]
    NotebookDirNotFound { path: PathBuf },

    #[error("board {board} is not supported")]
    #[diagnostic(
        code(dsp_pynq::config::unsupported_board),
        help("Supported boards are the directories under the boards directory")
    )]
    UnsupportedBoard { board: String, boards_dir: PathBuf },

    #[error("package data directory not found")]
    #[diagnostic(
        code(dsp_pynq::config::package_dir_not_found),
        help("Pass --package-dir or export DSP_PYNQ_PACKAGE_DIR")
    )]
    PackageDirNotFound { searched: Vec<PathBuf> },

    #[error("Unable to parse toml file at '{path}': {source}")]
    #[diagnostic(code(dsp_pynq::config::parse_toml), help("Review toml file"))]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Resolves the directory notebooks get installed into.
///
/// An explicit `destination` wins; otherwise `env_value` (the contents of
/// [`NOTEBOOKS_ENV`]) is used. Either way the result must be an existing directory.
pub fn resolve_notebook_dir(
    destination: Option<&Path>,
    env_value: Option<OsString>,
) -> Result<PathBuf, ConfigError> {
    let directory = match destination {
        Some(path) => path.to_path_buf(),
        None => env_value
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingEnv { var: NOTEBOOKS_ENV })?,
    };

    if !directory.is_dir() {
        return Err(ConfigError::NotebookDirNotFound { path: directory });
    }

    log::debug!("notebook directory: {}", directory.display());

    Ok(directory)
}

/// Picks the board from an explicit value or the contents of [`BOARD_ENV`].
pub fn resolve_board(board: Option<&str>, env_value: Option<OsString>) -> Result<String, ConfigError> {
    match board {
        Some(board) => Ok(board.to_string()),
        None => env_value
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string_lossy().into_owned())
            .ok_or(ConfigError::MissingEnv { var: BOARD_ENV }),
    }
}

/// A board identifier must be a single plain path component.
pub fn is_valid_board_name(board: &str) -> bool {
    lazy_static::lazy_static! {
        static ref BOARD_NAME_REGEX: regex::Regex =
            regex::Regex::new(r"^[A-Za-z0-9_.-]+$").expect("a valid regex pattern");
    }

    board != "." && board != ".." && BOARD_NAME_REGEX.is_match(board)
}

/// Locates the package data directory holding `notebooks/` and `bitstreams/`.
///
/// Order: explicit path, [`PACKAGE_DIR_ENV`], then `share/dsp_pynq` next to the
/// executable's parent directory.
pub fn resolve_package_dir(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    exe: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(value) = env_value.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(value));
    }

    let mut searched = vec![];

    if let Some(prefix) = exe.and_then(Path::parent).and_then(Path::parent) {
        let candidate = prefix.join("share").join("dsp_pynq");

        if candidate.is_dir() {
            return Ok(candidate);
        }

        searched.push(candidate);
    }

    Err(ConfigError::PackageDirNotFound { searched })
}

fn default_boards_dir() -> PathBuf {
    PathBuf::from("boards")
}
fn default_package_dir() -> PathBuf {
    PathBuf::from("dsp_pynq")
}
fn default_board_subdirs() -> Vec<String> {
    vec!["bitstreams".to_string()]
}
fn default_build_program() -> String {
    "make".to_string()
}
fn default_manifest() -> PathBuf {
    PathBuf::from("package-manifest.txt")
}

/// Repository layout used at package-build time. Paths are relative to the repository root.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    #[serde(default = "default_boards_dir")]
    pub boards_dir: PathBuf,
    #[serde(default = "default_package_dir")]
    pub package_dir: PathBuf,
    /// Build outputs copied from the board directory into the package.
    #[serde(default = "default_board_subdirs")]
    pub board_subdirs: Vec<String>,
    /// Repository-level notebooks copied into `<package_dir>/notebooks`.
    #[serde(default)]
    pub notebooks_dir: Option<PathBuf>,
    #[serde(default = "default_build_program")]
    pub build_program: String,
    #[serde(default)]
    pub build_args: Vec<String>,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}
impl Default for Layout {
    fn default() -> Self {
        Self {
            boards_dir: default_boards_dir(),
            package_dir: default_package_dir(),
            board_subdirs: default_board_subdirs(),
            notebooks_dir: None,
            build_program: default_build_program(),
            build_args: vec![],
            manifest: default_manifest(),
        }
    }
}
impl Layout {
    /// Reads `dsp-pynq.toml` from `root`, falling back to the defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let layout_file = root.join(LAYOUT_FILE);

        if !layout_file.exists() {
            log::debug!("no {} in {}, using default layout", LAYOUT_FILE, root.display());

            return Ok(Layout::default());
        }

        let content = fs::read_to_string(&layout_file)
            .map_err(|error| IoError::new(FileOperation::Read, layout_file.clone(), error))?;

        toml::from_str(&content).map_err(|err| ConfigError::ParseToml {
            path: layout_file,
            source: err,
        })
    }

    /// Returns the board's directory, failing when the board has no definition.
    pub fn board_dir(&self, root: &Path, board: &str) -> Result<PathBuf, ConfigError> {
        let boards_dir = root.join(&self.boards_dir);

        if !is_valid_board_name(board) || !boards_dir.join(board).is_dir() {
            return Err(ConfigError::UnsupportedBoard {
                board: board.to_string(),
                boards_dir,
            });
        }

        Ok(boards_dir.join(board))
    }
}
