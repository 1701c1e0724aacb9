//! rm command - Delete an object

use clap::Args;
use serde::Serialize;
use stow_core::Backend;

use super::{open_or_report, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Delete an object
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object path, relative to the backend root
    pub path: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    success: bool,
    path: String,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, backend_name: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let backend = match open_or_report(backend_name, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    if let Err(e) = backend.delete_object(&args.path).await {
        return report(&formatter, &format!("Failed to delete '{}'", args.path), &e);
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            success: true,
            path: args.path,
        });
    } else {
        formatter.success(&format!("Deleted {}", formatter.style_file(&args.path)));
    }
    ExitCode::Success
}
