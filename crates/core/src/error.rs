//! Error types for stow-core
//!
//! A single error enum covers every backend. Only the kinds listed here are
//! interpreted by the core; vendor failures are carried through as
//! `Network`, `Auth` or `Io` with their original message.

use thiserror::Error;

/// Result type alias for stow-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by backends and the core algorithms
#[derive(Debug, Error)]
pub enum Error {
    /// The operation has no implementation for this backend
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A directory listing targeted a path that is a single object
    #[error("Prefix is an object: {0}")]
    PrefixIsAnObject(String),

    /// A rename destination already holds an object or a non-empty prefix
    #[error("New path is not empty: {0}")]
    NewPathNotEmpty(String),

    /// The requested path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional read was answered with "not modified"
    #[error("Not modified: {0}")]
    NotModified(String),

    /// A conditional read precondition did not hold
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Invalid object path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Malformed inbound request (headers that cannot be parsed)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure from the underlying client
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication or authorization failure from the underlying client
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No backend with this name in the configuration
    #[error("Backend not found: {0}")]
    BackendNotFound(String),

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether the error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Map an I/O error on `path`, keeping "not found" distinct
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_string())
        } else {
            Error::Io(err)
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
