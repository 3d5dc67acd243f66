//! Command-line interface

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "seedload")]
#[command(author, version, about = "Load seed and reference data into PostgreSQL", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug logging to the console
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the given groups and everything they depend on
    Load {
        /// Comma-separated group names, e.g. `ref,sample`
        groups: String,
    },

    /// Load the groups listed in DATALOADER_AUTOLOAD
    Autoload,

    /// Print the groups a request would load, without loading anything
    Resolve {
        /// Comma-separated group names
        groups: String,
    },

    /// Print the load history of a table
    History {
        table: String,
    },
}
