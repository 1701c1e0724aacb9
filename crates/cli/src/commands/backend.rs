//! Backend management commands
//!
//! Backends are named storage locations kept in the configuration file,
//! together with their connection details and credentials.

use std::path::PathBuf;

use clap::Subcommand;
use comfy_table::{Table, presets};
use serde::Serialize;
use stow_core::{BackendConfig, ConfigManager, S3Config};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Backend subcommands
#[derive(Subcommand, Debug)]
pub enum BackendCommands {
    /// Add or update a local filesystem backend
    SetLocal(SetLocalArgs),

    /// Add or update an S3 backend
    SetS3(SetS3Args),

    /// List configured backends
    List,

    /// Remove a backend
    Remove(RemoveArgs),
}

/// Arguments for `backend set-local`
#[derive(clap::Args, Debug)]
pub struct SetLocalArgs {
    /// Backend name
    pub name: String,

    /// Root directory for stored objects
    pub root_directory: PathBuf,
}

/// Arguments for `backend set-s3`
#[derive(clap::Args, Debug)]
pub struct SetS3Args {
    /// Backend name
    pub name: String,

    /// Bucket name
    pub bucket: String,

    /// Root prefix inside the bucket
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// Endpoint URL for S3-compatible services (e.g., `http://localhost:9000`)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Access key ID (default credential chain when omitted)
    #[arg(long, requires = "secret_key")]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(long, requires = "access_key")]
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    #[arg(long)]
    pub session_token: Option<String>,

    /// Server-side encryption for uploads (e.g., AES256)
    #[arg(long)]
    pub sse: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long)]
    pub force_path_style: bool,
}

/// Arguments for `backend remove`
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the backend to remove
    pub name: String,
}

/// Backend information for JSON output (without credentials)
#[derive(Debug, Serialize)]
struct BackendInfo {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    location: String,
}

impl BackendInfo {
    fn new(name: &str, config: &BackendConfig) -> Self {
        Self {
            name: name.to_string(),
            kind: config.kind(),
            location: config.location(),
        }
    }
}

#[derive(Serialize)]
struct BackendListOutput {
    backends: Vec<BackendInfo>,
}

#[derive(Serialize)]
struct BackendOperationOutput {
    success: bool,
    backend: String,
    message: String,
}

impl From<SetS3Args> for S3Config {
    fn from(args: SetS3Args) -> Self {
        Self {
            bucket: args.bucket,
            prefix: args.prefix,
            region: args.region,
            endpoint: args.endpoint,
            access_key: args.access_key,
            secret_key: args.secret_key,
            session_token: args.session_token,
            sse: args.sse,
            force_path_style: args.force_path_style,
        }
    }
}

/// Execute a backend subcommand
pub async fn execute(cmd: BackendCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match ConfigManager::new() {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to locate configuration: {e}"));
            return ExitCode::GeneralError;
        }
    };

    match cmd {
        BackendCommands::SetLocal(args) => {
            let name = args.name;
            let config = BackendConfig::Local {
                root_directory: args.root_directory,
            };
            execute_set(&name, config, &manager, &formatter)
        }
        BackendCommands::SetS3(args) => {
            let name = args.name.clone();
            execute_set(&name, BackendConfig::S3(args.into()), &manager, &formatter)
        }
        BackendCommands::List => execute_list(&manager, &formatter),
        BackendCommands::Remove(args) => execute_remove(&args.name, &manager, &formatter),
    }
}

fn execute_set(
    name: &str,
    config: BackendConfig,
    manager: &ConfigManager,
    formatter: &Formatter,
) -> ExitCode {
    match manager.set(name, config) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&BackendOperationOutput {
                    success: true,
                    backend: name.to_string(),
                    message: format!("Backend '{name}' configured successfully"),
                });
            } else {
                let styled_name = formatter.style_name(name);
                formatter.success(&format!("Backend '{styled_name}' configured successfully."));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

fn execute_list(manager: &ConfigManager, formatter: &Formatter) -> ExitCode {
    let backends = match manager.list() {
        Ok(b) => b,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    if formatter.is_json() {
        formatter.json(&BackendListOutput {
            backends: backends
                .iter()
                .map(|(name, config)| BackendInfo::new(name, config))
                .collect(),
        });
    } else if backends.is_empty() {
        formatter.println("No backends configured.");
    } else {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_header(vec!["NAME", "TYPE", "LOCATION"]);
        for (name, config) in &backends {
            table.add_row(vec![name.clone(), config.kind().to_string(), config.location()]);
        }
        formatter.println(&table.to_string());
    }
    ExitCode::Success
}

fn execute_remove(name: &str, manager: &ConfigManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(name) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&BackendOperationOutput {
                    success: true,
                    backend: name.to_string(),
                    message: format!("Backend '{name}' removed successfully"),
                });
            } else {
                let styled_name = formatter.style_name(name);
                formatter.success(&format!("Backend '{styled_name}' removed successfully."));
            }
            ExitCode::Success
        }
        Err(stow_core::Error::BackendNotFound(_)) => {
            formatter.error(&format!("Backend '{name}' not found"));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}
