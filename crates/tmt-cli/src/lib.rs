//! TMT → CodeSystem converter
//!
//! Library half of the `tmt-codesystem` binary: configuration, the
//! build/locate/validate runs, and logging setup.

pub mod config;
pub mod logging;
pub mod pipeline;

pub use config::AppConfig;
pub use pipeline::{run_build, run_locate, run_validate, BuildOutcome, ExtractionWorkspace, LocateEntry};
