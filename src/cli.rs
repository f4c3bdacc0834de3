// src/cli.rs
//! CLI definitions for mdapi
//!
//! - `database` - synchronize every tracked repository
//! - `serve` - run the HTTP API
//! - `branches` - print the branch catalog

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mdapi")]
#[command(author, version, about = "Repository metadata cache and query API", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the metadata databases of every tracked repository
    Database,
    /// Serve the query API
    #[cfg(feature = "server")]
    Serve,
    /// Print the tracked branches and their repodata URLs
    Branches,
}
