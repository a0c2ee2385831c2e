use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "keepsake",
    about = "Durable, optionally encrypted blob storage over interchangeable backends",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; help is printed when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write a stored blob to stdout (or a file).
    Get {
        /// Resource key; defaults to the configured data file name.
        key: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Store a blob read from stdin (or a file), replacing any previous one.
    Put {
        key: Option<String>,
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Remove a stored blob.
    Delete { key: Option<String> },
    /// Print whether a blob is stored under the key.
    Exists { key: Option<String> },
    /// Round-trip a probe blob through the configured storage.
    Health,
    /// Inspect the encryption key.
    #[command(subcommand)]
    Key(KeyCommand),
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    /// Resolve (loading or generating) the key and print a redacted preview.
    Show,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
