//! Output handling for human-readable and JSON formats

mod formatter;

pub use formatter::Formatter;

/// Output settings taken from the global flags
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Machine-readable JSON output
    pub json: bool,
    /// Disable colors
    pub no_color: bool,
    /// Suppress everything but errors
    pub quiet: bool,
}
