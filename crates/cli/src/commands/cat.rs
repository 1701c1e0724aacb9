//! cat command - Write an object's content to stdout

use clap::Args;
use tokio::io::AsyncWriteExt;

use super::{open_or_report, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Print an object's content
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object path, relative to the backend root
    pub path: String,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, backend_name: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let backend = match open_or_report(backend_name, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    let mut stream = match backend.get_object_stream(&args.path).await {
        Ok(s) => s,
        Err(e) => return report(&formatter, &format!("Failed to read '{}'", args.path), &e),
    };

    let mut stdout = tokio::io::stdout();
    let copied = match tokio::io::copy(&mut stream.content, &mut stdout).await {
        Ok(n) => n,
        Err(e) => {
            formatter.error(&format!("Failed to write '{}': {e}", args.path));
            return ExitCode::GeneralError;
        }
    };
    if let Err(e) = stdout.flush().await {
        formatter.error(&format!("Failed to flush output: {e}"));
        return ExitCode::GeneralError;
    }

    tracing::debug!(path = %args.path, bytes = copied, "Object written to stdout");
    ExitCode::Success
}
