//! Shared error type for the HEIC to JPG conversion pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Output directory {} already exists and reuse was declined", .0.display())]
    ConfirmationDeclined(PathBuf),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("{0}")]
    UnsafeDirectory(String),

    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),

    #[error("Failed to decode HEIC: {0}")]
    Decode(String),

    #[error("Color profile transform failed: {0}")]
    ColorProfile(String),

    #[error("Failed to encode JPEG: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
