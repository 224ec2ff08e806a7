//! Error types for the mockup renderer

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering or watching
#[derive(Error, Debug)]
pub enum Error {
    /// The page path could not be turned into an absolute path or file URL
    #[error("Invalid page path: {0}")]
    PathError(String),

    /// Failed to launch a browser (both channel attempts failed)
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    /// Failed to open or navigate a page
    #[error("Navigation failed: {0}")]
    NavigationError(String),

    /// Failed to capture a screenshot
    #[error("Screenshot capture failed: {0}")]
    CaptureError(String),

    /// Failed to set up or run the filesystem watcher
    #[error("File watch failed: {0}")]
    WatchError(String),

    /// Filesystem error (output directory creation, image write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
