//! mirror-op - mirror public container images into a private cloud registry
//!
//! Images are declared as `FROM <image>` Dockerfiles in a Git working tree.
//! This crate reconciles those declarations against an Aliyun Container
//! Registry namespace whose auto-build pipeline does the actual mirroring.

pub mod batch;
pub mod cli;
pub mod config;
pub mod git;
pub mod image;
pub mod mirror;
pub mod reconcile;
pub mod registry;
pub mod verify;

use thiserror::Error;

/// Main error type for mirror-op operations
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry API error ({status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid image reference: {0}")]
    InvalidImageRef(String),

    #[error("Image reference has no tag: {0}")]
    MissingTag(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, MirrorError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "mirror-op";
