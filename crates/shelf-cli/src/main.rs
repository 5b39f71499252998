//! Shelf CLI - offline-first textbook listings from the terminal
//!
//! Every command works against the local database first and talks to the
//! remote store only when one is configured and reachable.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use shelf_core::ShelfConfig;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{open_session, SessionOptions};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::get::run_get;
use crate::commands::list::run_list;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
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

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelf=info".parse().expect("valid log directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let config = ShelfConfig::load()?;
    let options = SessionOptions::resolve(&cli, &config);
    let session = open_session(&config, &options).await?;

    let result = match cli.command {
        Commands::Add { title, fields } => run_add(&session, &title, &fields).await,
        Commands::List { pending, json } => {
            run_list(&session, cli.owner.as_deref(), pending, json).await
        }
        Commands::Get { id, json } => run_get(&session, &id, json).await,
        Commands::Edit { id, title, fields } => {
            run_edit(&session, &id, title.as_deref(), &fields).await
        }
        Commands::Delete { id } => run_delete(&session, &id).await,
        Commands::Sync => run_sync(&session).await,
        Commands::Watch => run_watch(&session, &config).await,
        Commands::Completions { .. } => Ok(()),
    };

    session.close().await;
    result
}
