//! deploy-warden - deployment approval policy engine
//!
//! Offline evaluation harness: load a policy document, a deployment
//! snapshot, and a roster fixture, run one evaluation, and report the
//! decision. Exit code 0 means approved, 1 denied, 2 a configuration or
//! upstream error.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use deploy_warden::cli::Cli;
use deploy_warden::config::PolicyConfig;
use deploy_warden::context::PolicyContext;
use deploy_warden::membership::StaticRosters;
use deploy_warden::policy::PolicyEngine;
use deploy_warden::{Result, setup_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::from(2);
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli) -> Result<bool> {
    let config = PolicyConfig::load(&cli.policy)?;

    if cli.check {
        info!(
            policy = %cli.policy.display(),
            rules = config.approval_rules.len(),
            "policy document is valid"
        );
        println!("ok");
        return Ok(true);
    }

    let Some(context_path) = &cli.context else {
        return Err(deploy_warden::Error::Config(
            "--context is required unless --check is set".into(),
        ));
    };
    // YAML is a superset of JSON, so one parser covers both snapshot formats.
    let raw = std::fs::read_to_string(context_path)?;
    let context: PolicyContext = serde_yaml::from_str(&raw)?;

    let rosters = match &cli.rosters {
        Some(path) => StaticRosters::load(path)?,
        None => StaticRosters::default(),
    };

    info!(
        policy = %cli.policy.display(),
        commits = context.commits.len(),
        reviews = context.reviews.len(),
        "evaluating deployment"
    );

    let engine = PolicyEngine::new(config, Arc::new(rosters))?;
    let evaluation = engine.evaluate_explained(&context).await?;
    let approved = evaluation.approved();

    if cli.explain {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        println!("{}", if approved { "approved" } else { "denied" });
    }

    Ok(approved)
}
