//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Directory management
//! follows a noun-verb pattern (e.g., `parley user add alice`,
//! `parley group member-add <group> alice`).

pub mod group;
pub mod token;
pub mod user;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Real-time messaging gateway.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and WebSocket gateway.
    Serve {
        /// Port to listen on (overrides config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config.toml).
        #[arg(long)]
        host: Option<String>,

        /// Export trace spans to stdout via OpenTelemetry.
        #[arg(long)]
        otel: bool,
    },

    /// Mint a bearer credential for a user.
    Token {
        /// Username to issue the credential for.
        username: String,
    },

    /// Manage the user directory.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Manage groups and their members.
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a new user.
    Add {
        username: String,
    },

    /// List registered users.
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create a group.
    Add {
        name: String,
    },

    /// List groups with their member counts.
    #[command(alias = "ls")]
    List,

    /// Add a user to a group.
    #[command(name = "member-add")]
    MemberAdd {
        /// Group id.
        group: String,

        /// Username to add.
        username: String,
    },

    /// Remove a user from a group.
    #[command(name = "member-remove")]
    MemberRemove {
        /// Group id.
        group: String,

        /// Username to remove.
        username: String,
    },
}
