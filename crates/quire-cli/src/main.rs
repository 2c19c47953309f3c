//! Quire CLI - write and sync blog articles from the terminal
//!
//! Works against the local store and keeps the hosted table in step
//! whenever it is reachable.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{open_storage, resolve_config_path, StorageOptions};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::export::{run_export, run_import};
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::sync::{run_conflicts, run_status, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {}", user_facing_message(&error));
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quire=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Completions { shell, output } => {
            return run_completions(*shell, output.as_deref());
        }
        Commands::Config(args) => {
            return run_config(args, &resolve_config_path(cli.config.clone()));
        }
        _ => {}
    }

    let options = StorageOptions::resolve(cli.db_path, cli.config, cli.offline);
    let storage = open_storage(&options)?;
    storage.initialize().await;

    match cli.command {
        Commands::Add(args) => run_add(args, &storage).await?,
        Commands::List(args) => run_list(&args, &storage).await?,
        Commands::Show { id, json } => run_show(&id, json, &storage).await?,
        Commands::Edit(args) => run_edit(args, &storage).await?,
        Commands::Delete { id } => run_delete(&id, &storage).await?,
        Commands::Sync { json } => run_sync(json, &storage).await?,
        Commands::Status { json } => run_status(json, &storage)?,
        Commands::Conflicts { json } => run_conflicts(json, &storage).await?,
        Commands::Export { format, output } => run_export(format, output.as_deref(), &storage)?,
        Commands::Import { path } => run_import(&path, &storage)?,
        Commands::Completions { .. } | Commands::Config(_) => {}
    }

    Ok(())
}

/// Core errors carry a short message meant for people; everything else
/// prints as-is.
fn user_facing_message(error: &CliError) -> String {
    match error {
        CliError::Core(core) => match core {
            quire_core::Error::Validation(_) | quire_core::Error::InvalidInput(_) => {
                core.to_string()
            }
            _ => format!("{} ({core})", core.user_message()),
        },
        other => other.to_string(),
    }
}
