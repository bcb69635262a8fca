//! Gate condition evaluation.
//!
//! A rule's `if:` block gates whether the rule applies at all. Every
//! predicate present must hold; a condition with no predicates is vacuously
//! true. An unmet condition skips the rule rather than failing it.

use crate::config::{EnvironmentCondition, IdentitySet, RuleCondition};
use crate::context::PolicyContext;
use crate::membership::MembershipResolver;
use crate::Result;

/// Whether every predicate of `condition` holds against the context.
pub(crate) async fn holds(
    condition: &RuleCondition,
    context: &PolicyContext,
    members: &MembershipResolver,
) -> Result<bool> {
    if let Some(environment) = &condition.environment {
        if !environment_holds(environment, context) {
            return Ok(false);
        }
    }
    if let Some(signers) = &condition.has_valid_signatures_by {
        if !signatures_hold(signers, context, members).await? {
            return Ok(false);
        }
    }
    if let Some(authors) = &condition.was_authored_by {
        if !authorship_holds(authors, context, members).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The environment predicate fails when no environment is bound, when a
/// whitelist excludes the name, or when a blacklist includes it.
fn environment_holds(condition: &EnvironmentCondition, context: &PolicyContext) -> bool {
    let Some(environment) = &context.environment else {
        return false;
    };
    let name = environment.name.as_str();

    if let Some(matches) = &condition.matches {
        if !matches.iter().any(|m| m == name) {
            return false;
        }
    }
    if let Some(not_matches) = &condition.not_matches {
        if not_matches.iter().any(|m| m == name) {
            return false;
        }
    }
    true
}

/// Every commit must carry a provider-verified signature and a committer
/// covered by the identity set. The verification flag is checked before any
/// roster lookup.
async fn signatures_hold(
    signers: &IdentitySet,
    context: &PolicyContext,
    members: &MembershipResolver,
) -> Result<bool> {
    for commit in &context.commits {
        if !commit.is_verified() {
            return Ok(false);
        }
        let authorized = members
            .is_user_in_any(
                commit.committer_login(),
                &signers.users,
                &signers.organizations,
                &signers.teams,
            )
            .await?;
        if !authorized {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Every commit's author must be covered by the identity set. An empty
/// commit list fails the predicate; a missing author login never matches.
async fn authorship_holds(
    authors: &IdentitySet,
    context: &PolicyContext,
    members: &MembershipResolver,
) -> Result<bool> {
    if context.commits.is_empty() {
        return Ok(false);
    }
    for commit in &context.commits {
        let authorized = members
            .is_user_in_any(
                commit.author_login(),
                &authors.users,
                &authors.organizations,
                &authors.teams,
            )
            .await?;
        if !authorized {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::context::{Actor, Commit, Environment, Verification};
    use crate::membership::StaticRosters;

    fn members() -> MembershipResolver {
        MembershipResolver::new(Arc::new(StaticRosters::default()))
    }

    fn commit(author: &str, committer: &str, verified: bool) -> Commit {
        Commit {
            sha: "abc".into(),
            author: Some(Actor {
                id: 1,
                login: author.into(),
            }),
            committer: Some(Actor {
                id: 2,
                login: committer.into(),
            }),
            verification: Some(Verification {
                verified,
                reason: None,
            }),
        }
    }

    fn users(logins: &[&str]) -> IdentitySet {
        IdentitySet {
            users: logins.iter().map(|s| (*s).to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_condition_is_vacuously_true() {
        let ctx = PolicyContext::default();
        assert!(holds(&RuleCondition::default(), &ctx, &members())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn environment_requires_a_bound_environment() {
        let condition = RuleCondition {
            environment: Some(EnvironmentCondition {
                matches: Some(vec!["production".into()]),
                not_matches: None,
            }),
            ..Default::default()
        };
        let ctx = PolicyContext::default();
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());

        let ctx = PolicyContext {
            environment: Some(Environment {
                name: "production".into(),
            }),
            ..Default::default()
        };
        assert!(holds(&condition, &ctx, &members()).await.unwrap());

        let ctx = PolicyContext {
            environment: Some(Environment {
                name: "staging".into(),
            }),
            ..Default::default()
        };
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());
    }

    #[tokio::test]
    async fn environment_blacklist_excludes() {
        let condition = RuleCondition {
            environment: Some(EnvironmentCondition {
                matches: None,
                not_matches: Some(vec!["production".into()]),
            }),
            ..Default::default()
        };
        let ctx = PolicyContext {
            environment: Some(Environment {
                name: "production".into(),
            }),
            ..Default::default()
        };
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());
    }

    #[tokio::test]
    async fn unverified_commit_fails_signature_predicate() {
        let condition = RuleCondition {
            has_valid_signatures_by: Some(users(&["alice"])),
            ..Default::default()
        };
        let ctx = PolicyContext {
            commits: vec![commit("alice", "alice", true), commit("alice", "alice", false)],
            ..Default::default()
        };
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());
    }

    #[tokio::test]
    async fn unauthorized_committer_fails_signature_predicate() {
        let condition = RuleCondition {
            has_valid_signatures_by: Some(users(&["alice"])),
            ..Default::default()
        };
        let ctx = PolicyContext {
            commits: vec![commit("alice", "alice", true), commit("bob", "bob", true)],
            ..Default::default()
        };
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());
    }

    #[tokio::test]
    async fn authorship_over_no_commits_is_false() {
        let condition = RuleCondition {
            was_authored_by: Some(users(&["alice"])),
            ..Default::default()
        };
        let ctx = PolicyContext::default();
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());
    }

    #[tokio::test]
    async fn authorship_is_a_conjunction_over_commits() {
        let condition = RuleCondition {
            was_authored_by: Some(users(&["alice", "bob"])),
            ..Default::default()
        };
        let ctx = PolicyContext {
            commits: vec![commit("alice", "alice", true), commit("bob", "bob", true)],
            ..Default::default()
        };
        assert!(holds(&condition, &ctx, &members()).await.unwrap());

        let ctx = PolicyContext {
            commits: vec![commit("alice", "alice", true), commit("mallory", "m", true)],
            ..Default::default()
        };
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());
    }

    #[tokio::test]
    async fn missing_author_never_matches() {
        let condition = RuleCondition {
            was_authored_by: Some(users(&["alice"])),
            ..Default::default()
        };
        let ctx = PolicyContext {
            commits: vec![Commit {
                sha: "abc".into(),
                author: None,
                committer: None,
                verification: None,
            }],
            ..Default::default()
        };
        assert!(!holds(&condition, &ctx, &members()).await.unwrap());
    }
}
