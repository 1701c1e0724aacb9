//! watch command - Report objects added, removed or updated under a prefix
//!
//! Takes a baseline listing, then polls the backend and prints the
//! difference between consecutive snapshots.

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use stow_core::{Backend, Object, ObjectSliceDiff, StreamingBackend, diff};

use super::{open_or_report, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Poll a prefix for changes
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Prefix to watch, relative to the backend root
    #[arg(default_value = "")]
    pub prefix: String,

    /// Seconds between polls
    #[arg(long, default_value_t = 5)]
    pub interval: u64,

    /// Timestamp moves up to this many seconds are not reported as updates
    #[arg(long, default_value_t = 0)]
    pub tolerance: u64,

    /// Stop after this many polls (runs until interrupted when omitted)
    #[arg(long)]
    pub count: Option<u32>,
}

/// One poll's changes, as emitted in JSON mode
#[derive(Debug, Serialize)]
struct ChangeReport {
    changed: bool,
    added: Vec<String>,
    removed: Vec<String>,
    updated: Vec<String>,
}

impl From<&ObjectSliceDiff> for ChangeReport {
    fn from(diff: &ObjectSliceDiff) -> Self {
        let paths = |objects: &[Object]| -> Vec<String> {
            objects.iter().map(|o| o.path.clone()).collect()
        };
        Self {
            changed: diff.changed,
            added: paths(&diff.added),
            removed: paths(&diff.removed),
            updated: paths(&diff.updated),
        }
    }
}

/// Execute the watch command
pub async fn execute(args: WatchArgs, backend_name: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let backend = match open_or_report(backend_name, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    let mut previous = match snapshot(backend.as_ref(), &args.prefix, &formatter).await {
        Ok(objects) => objects,
        Err(code) => return code,
    };
    tracing::debug!(prefix = %args.prefix, objects = previous.len(), "Baseline taken");

    let interval = Duration::from_secs(args.interval);
    let tolerance = Duration::from_secs(args.tolerance);
    let mut polls = 0u32;

    while args.count.is_none_or(|count| polls < count) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        polls += 1;

        let current = match snapshot(backend.as_ref(), &args.prefix, &formatter).await {
            Ok(objects) => objects,
            Err(code) => return code,
        };
        let changes = diff(&previous, &current, tolerance);
        print_changes(&changes, &formatter);
        previous = current;
    }

    ExitCode::Success
}

async fn snapshot(
    backend: &dyn StreamingBackend,
    prefix: &str,
    formatter: &Formatter,
) -> Result<Vec<Object>, ExitCode> {
    backend
        .list_objects(prefix)
        .await
        .map_err(|e| report(formatter, &format!("Failed to list '{prefix}'"), &e))
}

fn print_changes(changes: &ObjectSliceDiff, formatter: &Formatter) {
    if formatter.is_json() {
        formatter.json(&ChangeReport::from(changes));
        return;
    }

    for object in &changes.added {
        formatter.println(&formatter.change_line('+', &object.path));
    }
    for object in &changes.removed {
        formatter.println(&formatter.change_line('-', &object.path));
    }
    for object in &changes.updated {
        formatter.println(&formatter.change_line('~', &object.path));
    }
}
