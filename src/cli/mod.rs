//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{EditCommand, SchemasCommand, StepsCommand, ValidateCommand};
use std::ffi::OsString;

/// Configure pipeline steps from the terminal
#[derive(Debug, Parser, Clone)]
#[command(name = "stepform")]
#[command(author = "stepform Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Schema-driven configuration forms for pipeline steps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a step schema catalog (YAML); the built-in catalog is used otherwise
    #[arg(long, global = true)]
    pub catalog: Option<String>,

    /// Path to a message catalog (YAML) used for labels
    #[arg(long, global = true)]
    pub messages: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List step schemas or show one of them
    Schemas(SchemasCommand),

    /// Check a step's values without saving
    Validate(ValidateCommand),

    /// Edit a step and save it
    Edit(EditCommand),

    /// Show the steps saved for a job
    Steps(StepsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
