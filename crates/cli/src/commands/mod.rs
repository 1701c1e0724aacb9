//! Command implementations
//!
//! Each command exposes an `execute` function taking its arguments, the
//! selected backend name and the output configuration, and returning the
//! process exit code.

pub mod backend;
pub mod cat;
pub mod ls;
pub mod mv;
pub mod put;
pub mod rm;
pub mod watch;

use anyhow::Context;
use stow_core::{BackendConfig, ConfigManager, LocalFilesystemBackend, StreamingBackend};
use stow_s3::S3Backend;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Construct the named backend from the configuration file
pub async fn open_backend(name: &str) -> anyhow::Result<Box<dyn StreamingBackend>> {
    let manager = ConfigManager::new().context("failed to locate configuration")?;
    let config = manager
        .get(name)
        .with_context(|| format!("backend '{name}' is not configured"))?;

    let backend: Box<dyn StreamingBackend> = match &config {
        BackendConfig::Local { .. } => Box::new(
            LocalFilesystemBackend::from_config(&config)
                .with_context(|| format!("invalid local backend '{name}'"))?,
        ),
        BackendConfig::S3(s3) => Box::new(
            S3Backend::new(s3)
                .await
                .with_context(|| format!("failed to create S3 client for '{name}'"))?,
        ),
    };

    tracing::debug!(backend = name, kind = config.kind(), "Opened backend");
    Ok(backend)
}

/// Open a backend, reporting failure through the formatter
pub async fn open_or_report(
    name: &str,
    formatter: &Formatter,
) -> Result<Box<dyn StreamingBackend>, ExitCode> {
    open_backend(name).await.map_err(|e| {
        formatter.error(&format!("{e:#}"));
        ExitCode::from_anyhow(&e)
    })
}

/// Report a failed operation and return its exit code
pub fn report(formatter: &Formatter, action: &str, err: &stow_core::Error) -> ExitCode {
    formatter.error(&format!("{action}: {err}"));
    ExitCode::from_error(err)
}
