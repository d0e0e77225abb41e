//! Error types for listing harvest operations

use thiserror::Error;

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Error types raised while paging listings, downloading images and tagging them
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Input/output errors (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote resource could not be retrieved (connection error or non-success status)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Remote payload did not match the expected listing schema
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Image lacks a readable or writable metadata container
    #[error("Metadata container error: {0}")]
    MetadataContainer(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HarvestError {
    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new metadata container error
    pub fn metadata_container<S: Into<String>>(msg: S) -> Self {
        Self::MetadataContainer(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a transport error wrapping a lower-level network error
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Transport(format!("{}: {}", context.into(), error))
    }

    /// Create a transport error for a non-success HTTP status
    pub fn http_status<S: std::fmt::Display>(status: S, url: &str) -> Self {
        Self::Transport(format!("HTTP error {} for {}", status, url))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Whether this error means "not retrievable" (transport or decode failure)
    #[must_use]
    pub fn is_transport_like(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Decode(_))
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}
