//! Packages and installs the DSP-PYNQ tutorial notebooks and bitstreams.
//!
//! At package-build time [`build_package`] runs the board's build and copies
//! its artifacts into the package data directory. At install time
//! [`install_notebooks`] copies the bundled notebooks into
//! `<notebook dir>/dsp_pynq` and the bitstreams into `<notebook dir>/dsp_pynq/assets`.
pub mod api;
pub mod config;
pub mod errors;
pub mod install;
pub mod manifest;
pub mod package;
pub mod plan;
pub mod preview;
pub mod transactions;

pub use api::{build_package, install_notebooks, preview_install, DspPynqError};
pub use install::{Bundle, InstallReport};
pub use package::{PackageReport, PackageTarget};
