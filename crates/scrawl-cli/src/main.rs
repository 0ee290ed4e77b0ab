//! Scrawl CLI - draft notes from the terminal
//!
//! Edits are kept in a local draft and sent to the notes API whenever the
//! network allows.

mod cli;
mod commands;
mod context;
mod error;
mod keyring_store;
mod probe;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::draft::run_draft;
use crate::commands::notes::{run_delete, run_list, run_search};
use crate::commands::write::{run_sync, run_write};
use crate::context::CliContext;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive: tracing_subscriber::filter::Directive = "scrawl=info"
        .parse()
        .map_err(|error| CliError::Config(format!("Invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Config { command } => run_config(command, cli.config),
        command => {
            let context = CliContext::load(cli.config)?;
            dispatch(command, &context).await
        }
    }
}

async fn dispatch(command: Commands, context: &CliContext) -> Result<(), CliError> {
    match command {
        Commands::Write { title, id, stream } => {
            run_write(context, title, id.as_deref(), stream).await
        }
        Commands::List { limit, json } => run_list(context, limit, json).await,
        Commands::Search { query, limit, json } => run_search(context, &query, limit, json).await,
        Commands::Delete { id } => run_delete(context, &id).await,
        Commands::Sync => run_sync(context).await,
        Commands::Draft { command } => run_draft(context, command),
        Commands::Auth { command } => run_auth(context, command).await,
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),
    }
}
