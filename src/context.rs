//! Evaluation snapshot types
//!
//! The immutable facts a single evaluation runs against: the commits under
//! deployment, the reviews submitted for them, and the target environment.
//! Field names follow the hosting provider's payloads; the webhook host
//! builds one [`PolicyContext`] per proposed deployment and hands it to the
//! engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the engine may consult during one evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyContext {
    /// Commits included in the proposed deployment, in history order
    #[serde(default)]
    pub commits: Vec<Commit>,
    /// Reviews submitted for the change, in submission order
    #[serde(default)]
    pub reviews: Vec<Review>,
    /// Target environment, when already resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    /// Pending deployment, when the evaluation is deployment-bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
}

impl PolicyContext {
    /// The sha reviews must be bound to, when a deployment is pending.
    #[must_use]
    pub fn deployment_sha(&self) -> Option<&str> {
        self.deployment.as_ref().map(|d| d.commit.sha.as_str())
    }
}

/// A commit in the deployment's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// Commit sha
    pub sha: String,
    /// Commit author, when the provider resolved one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Actor>,
    /// Commit committer, when the provider resolved one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committer: Option<Actor>,
    /// Provider-computed signature verification result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl Commit {
    /// Author login, or the empty string when the provider resolved none.
    /// The empty login never matches an identity set.
    #[must_use]
    pub fn author_login(&self) -> &str {
        self.author.as_ref().map_or("", |a| a.login.as_str())
    }

    /// Committer login, or the empty string when unresolved.
    #[must_use]
    pub fn committer_login(&self) -> &str {
        self.committer.as_ref().map_or("", |a| a.login.as_str())
    }

    /// Whether the provider verified this commit's signature.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verification.as_ref().is_some_and(|v| v.verified)
    }
}

/// A user account referenced by commits and reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable numeric account id
    pub id: u64,
    /// Account login; identity comparisons are exact on this field
    pub login: String,
}

/// Signature verification metadata as reported by the provider.
///
/// The engine trusts `verified` as computed upstream; it performs no
/// cryptographic checks of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    /// Whether the provider verified the signature
    pub verified: bool,
    /// Provider reason code (e.g. `valid`, `unsigned`, `bad_email`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A submitted review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Review id, unique per change
    pub id: u64,
    /// Reviewer
    pub user: Actor,
    /// Review state as reported by the provider
    pub state: ReviewState,
    /// Review body, present for comment reviews
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Submission timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Sha of the commit the review was submitted against
    pub commit_id: String,
}

/// Review states the provider reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    /// Explicit approval
    Approved,
    /// Changes requested
    ChangesRequested,
    /// Comment-only review
    Commented,
    /// Review was dismissed
    Dismissed,
    /// Review drafted but not submitted
    Pending,
}

/// Target environment of the proposed deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Environment name (e.g. `production`, `staging`)
    pub name: String,
}

/// A pending deployment awaiting approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Environment the deployment targets
    pub environment: String,
    /// Triggering event (e.g. `push`, `workflow_dispatch`)
    pub event: String,
    /// Commit being deployed
    pub commit: DeploymentCommit,
}

/// The commit a pending deployment points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentCommit {
    /// Deployed commit sha; reviews must be bound to it to count
    pub sha: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_state_uses_provider_casing() {
        let state: ReviewState = serde_json::from_str("\"CHANGES_REQUESTED\"").unwrap();
        assert_eq!(state, ReviewState::ChangesRequested);
        assert_eq!(
            serde_json::to_string(&ReviewState::Approved).unwrap(),
            "\"APPROVED\""
        );
    }

    #[test]
    fn missing_author_login_is_empty() {
        let commit = Commit {
            sha: "abc".into(),
            author: None,
            committer: None,
            verification: None,
        };
        assert_eq!(commit.author_login(), "");
        assert_eq!(commit.committer_login(), "");
        assert!(!commit.is_verified());
    }

    #[test]
    fn deployment_sha_requires_deployment() {
        let ctx = PolicyContext::default();
        assert_eq!(ctx.deployment_sha(), None);

        let ctx = PolicyContext {
            deployment: Some(Deployment {
                environment: "production".into(),
                event: "push".into(),
                commit: DeploymentCommit { sha: "deadbeef".into() },
            }),
            ..Default::default()
        };
        assert_eq!(ctx.deployment_sha(), Some("deadbeef"));
    }
}
