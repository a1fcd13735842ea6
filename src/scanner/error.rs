//! Error types for repository discovery

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scanning for repositories
#[derive(Debug, Error)]
pub enum ScanError {
    /// A scan root could not be resolved or listed
    #[error("Cannot read scan root {}: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The caller cancelled the scan or its deadline passed
    #[error("Scan cancelled")]
    Cancelled,
}

/// Result type alias using ScanError
pub type Result<T> = std::result::Result<T, ScanError>;
