//! Process exit codes
//!
//! Scripts can tell failure classes apart without parsing error output.

use stow_core::Error;

/// Exit codes returned by the `stow` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Invalid arguments or configuration
    UsageError = 2,
    NetworkError = 3,
    AuthError = 4,
    NotFound = 5,
    /// Destination already occupied
    Conflict = 6,
    /// Operation not supported by the backend
    UnsupportedFeature = 7,
}

impl ExitCode {
    /// Exit code for a backend error
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::NotFound(_) | Error::BackendNotFound(_) => ExitCode::NotFound,
            Error::NewPathNotEmpty(_) => ExitCode::Conflict,
            Error::NotImplemented(_) => ExitCode::UnsupportedFeature,
            Error::PrefixIsAnObject(_)
            | Error::InvalidPath(_)
            | Error::InvalidRequest(_)
            | Error::Config(_) => ExitCode::UsageError,
            Error::Network(_) => ExitCode::NetworkError,
            Error::Auth(_) => ExitCode::AuthError,
            _ => ExitCode::GeneralError,
        }
    }

    /// Exit code for an error raised at the binary edge
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        err.downcast_ref::<Error>()
            .map(Self::from_error)
            .unwrap_or(ExitCode::GeneralError)
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
