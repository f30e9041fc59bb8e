use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FileOperation {
    #[error("reading a file")]
    Read,
    #[error("walking a directory")]
    Walk,
    #[error("copying a file")]
    Copy,
    #[error("writing a file")]
    Write,
    #[error("creating a directory")]
    Mkdir,
    #[error("removing a directory")]
    Remove,
    #[error("renaming a path")]
    Rename,
    #[error("creating a staging directory")]
    Stage,
}
#[derive(Debug, Error, Diagnostic)]
#[error("I/O error: {operation} on path '{path}'")]
#[diagnostic(
    code(dsp_pynq::io),
    help("Check file permissions, disk space, or that the path is correct.")
)]
pub struct IoError {
    pub operation: FileOperation,
    pub path: std::path::PathBuf,
    #[source]
    pub source: std::io::Error,
}
impl IoError {
    pub fn new(operation: FileOperation, path: std::path::PathBuf, error: std::io::Error) -> Self {
        Self {
            operation,
            path,
            source: error,
        }
    }
    /// Wraps a [`walkdir::Error`], keeping the path it failed on when walkdir reports one.
    pub fn from_walk(root: &std::path::Path, error: walkdir::Error) -> Self {
        let path = error
            .path()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| root.to_path_buf());

        Self::new(FileOperation::Walk, path, error.into())
    }
}
