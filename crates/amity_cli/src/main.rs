//! Amity CLI
//!
//! Drives the relationship engine against a JSON snapshot of the store.
//!
//! # Commands
//!
//! - `init` - Create an empty store file
//! - `signup` - Register a user record
//! - `users` - List users, or discover them as a given user
//! - `send` / `accept` / `reject` / `unfriend` - Relationship transitions
//! - `inspect` - Show a user's projected relationship state
//! - `verify` - Audit relationship symmetry across all records

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Friend-relationship tools over a store snapshot.
#[derive(Parser)]
#[command(name = "amity")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store snapshot file
    #[arg(global = true, short, long, default_value = "amity.json")]
    store: PathBuf,

    /// Answer yes to confirmation prompts
    #[arg(global = true, short, long)]
    yes: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty store file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Register a user record for an email
    Signup {
        /// Email of the new user
        email: String,

        /// Authentication user id
        #[arg(long)]
        uid: Option<String>,

        /// Avatar URL (defaults to the configured avatar)
        #[arg(long)]
        avatar: Option<String>,
    },

    /// List users
    Users {
        /// List the other users as seen by this email, with relationship status
        #[arg(long = "as")]
        viewer: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Send a friend request
    Send {
        /// Email of the acting user
        #[arg(long = "as")]
        actor: String,

        /// Email of the peer
        peer: String,
    },

    /// Accept a pending friend request
    Accept {
        /// Email of the acting user
        #[arg(long = "as")]
        actor: String,

        /// Email of the requestor
        peer: String,
    },

    /// Reject a pending friend request
    Reject {
        /// Email of the acting user
        #[arg(long = "as")]
        actor: String,

        /// Email of the requestor
        peer: String,
    },

    /// Remove a friend
    Unfriend {
        /// Email of the acting user
        #[arg(long = "as")]
        actor: String,

        /// Email of the friend
        peer: String,
    },

    /// Show a user's requests and friends
    Inspect {
        /// Email of the user
        email: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Report pairs of records that violate relationship symmetry
    Verify,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let store = cli.store.as_path();
    let yes = cli.yes;
    runtime.block_on(async {
        match cli.command {
            Commands::Init { force } => commands::init::run(store, force),
            Commands::Signup { email, uid, avatar } => {
                commands::signup::run(store, &email, uid, avatar).await
            }
            Commands::Users { viewer, format } => {
                commands::users::run(store, viewer.as_deref(), &format).await
            }
            Commands::Send { actor, peer } => commands::relationship::send(store, &actor, &peer).await,
            Commands::Accept { actor, peer } => {
                commands::relationship::accept(store, &actor, &peer).await
            }
            Commands::Reject { actor, peer } => {
                commands::relationship::reject(store, &actor, &peer, yes).await
            }
            Commands::Unfriend { actor, peer } => {
                commands::relationship::unfriend(store, &actor, &peer, yes).await
            }
            Commands::Inspect { email, format } => {
                commands::inspect::run(store, &email, &format).await
            }
            Commands::Verify => commands::verify::run(store).await,
        }
    })
}
