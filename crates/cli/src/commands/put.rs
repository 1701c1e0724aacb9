//! put command - Upload a file or stdin as an object

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use stow_core::ObjectReader;

use super::{open_or_report, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Store an object
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload, or `-` for stdin
    pub source: PathBuf,

    /// Destination path, relative to the backend root
    pub path: String,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    success: bool,
    path: String,
    backend: String,
}

/// Execute the put command
pub async fn execute(args: PutArgs, backend_name: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let content: ObjectReader = if args.source.as_os_str() == "-" {
        Box::pin(tokio::io::stdin())
    } else {
        match tokio::fs::File::open(&args.source).await {
            Ok(file) => Box::pin(file),
            Err(e) => {
                formatter.error(&format!("Failed to open '{}': {e}", args.source.display()));
                return if e.kind() == std::io::ErrorKind::NotFound {
                    ExitCode::NotFound
                } else {
                    ExitCode::GeneralError
                };
            }
        }
    };

    let backend = match open_or_report(backend_name, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    if let Err(e) = backend.put_object_stream(&args.path, content).await {
        return report(&formatter, &format!("Failed to store '{}'", args.path), &e);
    }

    if formatter.is_json() {
        formatter.json(&PutOutput {
            success: true,
            path: args.path,
            backend: backend_name.to_string(),
        });
    } else {
        let location = formatter.style_location(&format!("{backend_name}:{}", args.path));
        formatter.success(&format!("Stored {location}"));
    }
    ExitCode::Success
}
