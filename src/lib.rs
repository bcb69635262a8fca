//! Deployment approval policy engine.
//!
//! Decides whether a proposed deployment (a commit to an environment)
//! satisfies a declarative policy of approval rules.
//!
//! # Features
//!
//! - **Three-valued rules**: pass / fail / skipped over nested AND/OR groups
//!   and named rule references; skipped rules drop out of reductions
//! - **Conditional gating**: environment, signature, and authorship
//!   predicates decide whether a rule applies
//! - **Review filtering**: commit binding, self-review exclusion, and
//!   approval methods (explicit approvals or comment patterns in regex and
//!   glob dialects)
//! - **Identity resolution**: user / organization / team membership through
//!   a host-supplied roster source, memoized per evaluation with
//!   single-flight fetches
//!
//! The engine is pure: it holds no persistent state, trusts
//! provider-computed signature verification, and never calls a hosting
//! provider API itself.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod membership;
pub mod pattern;
pub mod policy;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
