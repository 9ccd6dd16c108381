//! Error taxonomy for description synthesis
//!
//! Every failure is fatal for the run. Variants carry enough context
//! (paths, rendered positioned diagnostics) to act on without re-running.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a synthesis run
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Found no *.tbl files in the kernel dir {}", .0.display())]
    NoTableFilesFound(PathBuf),

    #[error("Failed to read syscall table {}: {source}", path.display())]
    TableRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Extraction tool failed: {0}")]
    ExtractionTool(String),

    #[error("Failed to parse descriptions\n{0}")]
    ParseFailure(String),

    #[error("Failed to typecheck descriptions\n{0}")]
    TypeCheckFailure(String),

    #[error("Failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for synthesis operations
pub type Result<T> = std::result::Result<T, Error>;
