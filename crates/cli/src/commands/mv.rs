//! mv command - Rename an object or a whole prefix
//!
//! Renames are copy-then-delete. The command refuses when the destination
//! already holds anything.

use clap::Args;
use serde::Serialize;
use stow_core::{Backend, Error};

use super::{open_or_report, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Rename an object or prefix
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Existing object or prefix
    pub path: String,

    /// New location, which must not exist yet
    pub new_path: String,
}

#[derive(Debug, Serialize)]
struct MvOutput {
    success: bool,
    from: String,
    to: String,
}

/// Execute the mv command
pub async fn execute(args: MvArgs, backend_name: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let backend = match open_or_report(backend_name, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    match backend
        .rename_prefix_or_object(&args.path, &args.new_path)
        .await
    {
        Ok(()) => {}
        Err(e @ Error::NotImplemented(_)) => {
            formatter.warning(&format!("Backend '{}' cannot rename", backend.name()));
            return report(&formatter, "Rename failed", &e);
        }
        Err(e) => {
            return report(
                &formatter,
                &format!("Failed to move '{}' to '{}'", args.path, args.new_path),
                &e,
            );
        }
    }

    if formatter.is_json() {
        formatter.json(&MvOutput {
            success: true,
            from: args.path,
            to: args.new_path,
        });
    } else {
        formatter.success(&format!(
            "Moved {} to {}",
            formatter.style_name(&args.path),
            formatter.style_name(&args.new_path)
        ));
    }
    ExitCode::Success
}
