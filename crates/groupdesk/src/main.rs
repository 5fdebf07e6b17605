// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Groupdesk - relay between Telegram groups and Intercom conversations.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod admin;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use groupdesk_config::GroupdeskConfig;
use groupdesk_core::RelayError;
use groupdesk_storage::SqliteStore;

/// Groupdesk - relay between Telegram groups and Intercom conversations.
#[derive(Parser, Debug)]
#[command(name = "groupdesk", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay.
    Serve,
    /// Inspect or clear pending message queues.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Inspect group to conversation bindings.
    Binding {
        #[command(subcommand)]
        action: BindingAction,
    },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Groups with pending messages.
    List,
    /// Pending message count for a group.
    Length {
        #[arg(allow_negative_numbers = true)]
        group_id: String,
    },
    /// Discard every pending message for a group.
    Clear {
        #[arg(allow_negative_numbers = true)]
        group_id: String,
    },
    /// Messages that exceeded the retry ceiling.
    DeadLetters {
        #[arg(allow_negative_numbers = true)]
        group_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum BindingAction {
    /// Every bound group.
    List,
    /// The conversation bound to a group.
    Show {
        #[arg(allow_negative_numbers = true)]
        group_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => groupdesk_config::load_and_validate_path(path),
        None => groupdesk_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            groupdesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Queue { action }) => run_queue(&config, action).await,
        Some(Commands::Binding { action }) => run_binding(&config, action).await,
        None => {
            println!("groupdesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("groupdesk: {e}");
        std::process::exit(1);
    }
}

async fn open_store(config: &GroupdeskConfig) -> Result<SqliteStore, RelayError> {
    SqliteStore::open(&config.storage, config.relay.lock_ttl()).await
}

async fn run_queue(config: &GroupdeskConfig, action: QueueAction) -> Result<(), RelayError> {
    let store = open_store(config).await?;
    let output = match action {
        QueueAction::List => admin::queue_list(&store).await?,
        QueueAction::Length { group_id } => admin::queue_length(&store, &group_id).await?,
        QueueAction::Clear { group_id } => admin::queue_clear(&store, &group_id).await?,
        QueueAction::DeadLetters { group_id } => admin::dead_letters(&store, &group_id).await?,
    };
    println!("{output}");
    Ok(())
}

async fn run_binding(config: &GroupdeskConfig, action: BindingAction) -> Result<(), RelayError> {
    let store = open_store(config).await?;
    let output = match action {
        BindingAction::List => admin::binding_list(&store).await?,
        BindingAction::Show { group_id } => admin::binding_show(&store, &group_id).await?,
    };
    println!("{output}");
    Ok(())
}
