//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

/// Deployment approval policy engine - offline evaluation harness
#[derive(Parser, Debug)]
#[command(name = "deploy-warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the policy document (YAML)
    #[arg(short, long, env = "DEPLOY_WARDEN_POLICY_FILE")]
    pub policy: PathBuf,

    /// Path to the deployment snapshot (JSON or YAML)
    #[arg(short, long, env = "DEPLOY_WARDEN_CONTEXT_FILE")]
    pub context: Option<PathBuf>,

    /// Path to a roster fixture (YAML) supplying org/team memberships
    #[arg(short, long, env = "DEPLOY_WARDEN_ROSTERS_FILE")]
    pub rosters: Option<PathBuf>,

    /// Validate the policy document and exit without evaluating
    #[arg(long)]
    pub check: bool,

    /// Print per-rule outcomes as JSON instead of a single word
    #[arg(long)]
    pub explain: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DEPLOY_WARDEN_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "DEPLOY_WARDEN_LOG_FORMAT")]
    pub log_format: Option<String>,
}
