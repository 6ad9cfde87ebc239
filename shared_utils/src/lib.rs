//! Shared utilities for the heic2jpg converter
//!
//! - Batch file collection and result counting
//! - Summary reports and byte/duration formatting
//! - Safety checks (dangerous directory detection)
//! - Logging setup (tracing, rolling log files)
//! - Worker count defaults
//! - Progress bar and terminal colors
//! - File timestamp preservation
//! - Conversion error type

pub mod batch;
pub mod colors;
pub mod img_errors;
pub mod logging;
pub mod metadata;
pub mod report;
pub mod safety;
pub mod thread_manager;
pub mod unified_progress;

pub use batch::*;
pub use report::*;
pub use safety::*;
