//! Apoteka CLI - session migrations and operational checks.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table
//! apoteka-cli migrate
//!
//! # Check the commerce backend credentials
//! apoteka-cli commerce check
//!
//! # Snapshot a customer's remote reminders, then restore them
//! apoteka-cli sync pull --user jo@example.com --out jo.json
//! apoteka-cli sync push --user jo@example.com --file jo.json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "apoteka-cli")]
#[command(author, version, about = "Apoteka CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the session store schema
    Migrate,
    /// Commerce backend tools
    Commerce {
        #[command(subcommand)]
        action: CommerceAction,
    },
    /// Reminder sync tools
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
}

#[derive(Subcommand)]
enum CommerceAction {
    /// Verify credentials by listing categories and one product
    Check,
}

#[derive(Subcommand)]
enum SyncAction {
    /// Fetch a customer's remote reminders and report them
    Pull {
        /// Customer email (the sync user id)
        #[arg(short, long)]
        user: String,

        /// Write the fetched rows to this JSON file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Upload a JSON snapshot for a customer
    Push {
        /// Customer email (the sync user id)
        #[arg(short, long)]
        user: String,

        /// Snapshot file produced by `sync pull --out`
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::session_store().await?,
        Commands::Commerce { action } => match action {
            CommerceAction::Check => commands::commerce::check().await?,
        },
        Commands::Sync { action } => match action {
            SyncAction::Pull { user, out } => commands::sync::pull(&user, out.as_deref()).await?,
            SyncAction::Push { user, file } => commands::sync::push(&user, &file).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_push() {
        let cli = Cli::try_parse_from([
            "apoteka-cli",
            "sync",
            "push",
            "--user",
            "jo@example.com",
            "--file",
            "jo.json",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Sync {
                action: SyncAction::Push { .. }
            })
        ));
    }

    #[test]
    fn test_push_requires_file() {
        let cli = Cli::try_parse_from(["apoteka-cli", "sync", "push", "--user", "jo@example.com"]);
        assert!(cli.is_err());
    }
}
