//! CLI command definitions

use clap::Args;

/// List step schemas or show one of them
#[derive(Debug, Args, Clone)]
pub struct SchemasCommand {
    /// Step type to show in detail, e.g. sink-iotdb
    #[arg(short = 't', long)]
    pub step_type: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Check a step's values without saving
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the job graph JSON file
    #[arg(short, long)]
    pub graph: String,

    /// Id of the step to check
    #[arg(short, long)]
    pub step: String,

    /// Field values to apply first (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,
}

/// Edit a step and save it
#[derive(Debug, Args, Clone)]
pub struct EditCommand {
    /// Path to the job graph JSON file
    #[arg(short, long)]
    pub graph: String,

    /// Id of the job owning the graph
    #[arg(short, long)]
    pub job_id: String,

    /// Id of the step to edit
    #[arg(short, long)]
    pub step: String,

    /// Field values (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Fields to empty
    #[arg(long)]
    pub clear: Vec<String>,

    /// SQLite database to save into (defaults to the user data directory)
    #[arg(long, conflicts_with = "in_memory")]
    pub db: Option<String>,

    /// Save into a throwaway in-memory store
    #[arg(long)]
    pub in_memory: bool,

    /// Write the updated graph back to the graph file
    #[arg(long)]
    pub write_back: bool,
}

/// Show the steps saved for a job
#[derive(Debug, Args, Clone)]
pub struct StepsCommand {
    /// Job id
    #[arg(short, long)]
    pub job_id: String,

    /// Only this step
    #[arg(short, long)]
    pub step: Option<String>,

    /// SQLite database to read (defaults to the user data directory)
    #[arg(long)]
    pub db: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
