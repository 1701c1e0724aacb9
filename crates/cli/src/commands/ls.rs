//! ls command - List a directory of a backend
//!
//! Walks the paged depth-one listing to the end, releasing each page's
//! entries once printed. `--flat` uses the single-call object listing
//! instead.

use clap::Args;
use serde::Serialize;
use stow_core::{Backend, Metadata, StreamingBackend};

use super::{open_or_report, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List objects and directories
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Directory to list, relative to the backend root
    #[arg(default_value = "")]
    pub path: String,

    /// Entries requested per page (0 lets the backend decide)
    #[arg(long, default_value_t = 0)]
    pub limit: i32,

    /// List files only, in a single call
    #[arg(long)]
    pub flat: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    directories: Vec<Metadata>,
    files: Vec<Metadata>,
    pages: usize,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, backend_name: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let backend = match open_or_report(backend_name, &formatter).await {
        Ok(b) => b,
        Err(code) => return code,
    };

    if args.flat {
        list_flat(backend.as_ref(), &args.path, &formatter).await
    } else {
        list_paged(backend.as_ref(), &args, &formatter).await
    }
}

async fn list_flat(backend: &dyn StreamingBackend, path: &str, formatter: &Formatter) -> ExitCode {
    let objects = match backend.list_objects(path).await {
        Ok(o) => o,
        Err(e) => return report(formatter, &format!("Failed to list '{path}'"), &e),
    };

    if formatter.is_json() {
        formatter.json(&LsOutput {
            directories: Vec::new(),
            files: objects.iter().map(|o| o.metadata()).collect(),
            pages: 1,
        });
    } else {
        for object in &objects {
            let date = formatter.style_date(Some(object.last_modified));
            let name = formatter.style_file(&object.path);
            formatter.println(&format!("{date} {name}"));
        }
    }
    ExitCode::Success
}

async fn list_paged(backend: &dyn StreamingBackend, args: &LsArgs, formatter: &Formatter) -> ExitCode {
    let mut page = match backend
        .list_objects_from_directory(&args.path, args.limit)
        .await
    {
        Ok(p) => p,
        Err(e) => return report(formatter, &format!("Failed to list '{}'", args.path), &e),
    };

    let mut collected = LsOutput {
        directories: Vec::new(),
        files: Vec::new(),
        pages: 0,
    };

    loop {
        collected.pages += 1;
        if formatter.is_json() {
            collected.directories.extend(page.take_directories());
            collected.files.extend(page.take_files());
        } else {
            print_page(page.directories(), page.files(), formatter);
            page.free_entries();
        }

        if !page.is_truncated() {
            break;
        }
        page = match page.next_page().await {
            Ok(p) => p,
            Err(e) => return report(formatter, "Failed to fetch next page", &e),
        };
    }

    tracing::debug!(path = %args.path, pages = collected.pages, "Listing complete");
    if formatter.is_json() {
        formatter.json(&collected);
    }
    ExitCode::Success
}

fn print_page(directories: &[Metadata], files: &[Metadata], formatter: &Formatter) {
    for dir in directories {
        let date = formatter.style_date(None);
        let name = formatter.style_dir(&format!("{}/", dir.path));
        formatter.println(&format!("{date} {name}"));
    }
    for file in files {
        let date = formatter.style_date(file.last_modified);
        let name = formatter.style_file(&file.path);
        formatter.println(&format!("{date} {name}"));
    }
}
