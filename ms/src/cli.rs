//! CLI argument parsing for markerstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ms")]
#[command(author, version, about = "Durable recovery marker store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a marker value
    Get {
        /// Marker key
        #[arg(required = true)]
        key: String,
    },

    /// Set a marker value
    Set {
        /// Marker key
        #[arg(required = true)]
        key: String,

        /// Marker value
        #[arg(required = true)]
        value: String,
    },

    /// Remove a marker
    Clear {
        /// Marker key
        #[arg(required = true)]
        key: String,
    },

    /// List all markers
    List,
}
