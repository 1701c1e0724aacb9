//! stow - command-line client for object stores and local directories
//!
//! Every command works against a named backend from the configuration file,
//! selected with `--backend` or `STOW_BACKEND`.

mod commands;
mod exit_code;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{backend, cat, ls, mv, put, rm, watch};
use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "stow", version, about, long_about = None)]
struct Cli {
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Backend to operate on
    #[arg(short, long, global = true, env = "STOW_BACKEND", default_value = "default")]
    backend: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage configured backends
    #[command(subcommand)]
    Backend(backend::BackendCommands),

    /// List a directory
    Ls(ls::LsArgs),

    /// Print an object's content
    Cat(cat::CatArgs),

    /// Store a file or stdin as an object
    Put(put::PutArgs),

    /// Delete an object
    Rm(rm::RmArgs),

    /// Rename an object or prefix
    Mv(mv::MvArgs),

    /// Report changes under a prefix
    Watch(watch::WatchArgs),
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color || std::env::var_os("NO_COLOR").is_some(),
        quiet: cli.quiet,
    };
    let backend_name = cli.backend.as_str();

    let code = match cli.command {
        Commands::Backend(cmd) => backend::execute(cmd, output_config).await,
        Commands::Ls(args) => ls::execute(args, backend_name, output_config).await,
        Commands::Cat(args) => cat::execute(args, backend_name, output_config).await,
        Commands::Put(args) => put::execute(args, backend_name, output_config).await,
        Commands::Rm(args) => rm::execute(args, backend_name, output_config).await,
        Commands::Mv(args) => mv::execute(args, backend_name, output_config).await,
        Commands::Watch(args) => watch::execute(args, backend_name, output_config).await,
    };

    tracing::debug!(code = code as i32, "Command finished");
    code.into()
}
