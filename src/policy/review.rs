//! Review filtering.
//!
//! Reduces the raw review list to the reviews that may count toward an
//! approval requirement. A review survives only if it is bound to the
//! pending deployment's commit (when one is bound), was not written by any
//! author or committer of the change, and qualifies under at least one
//! configured approval method.

use std::collections::HashSet;

use crate::config::ApprovalMethods;
use crate::context::{Commit, Review, ReviewState};
use crate::pattern::Pattern;
use crate::Result;

/// Approval methods with their comment patterns compiled.
///
/// Absent `methods:` compiles to a matcher that accepts nothing: without a
/// configured method, no review can count.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompiledMethods {
    github_review: bool,
    comment_patterns: Vec<Pattern>,
}

impl CompiledMethods {
    /// Compile the methods block of a rule.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a comment pattern fails to
    /// compile in its dialect.
    pub(crate) fn compile(methods: Option<&ApprovalMethods>) -> Result<Self> {
        let Some(methods) = methods else {
            return Ok(Self::default());
        };
        let comment_patterns = methods
            .github_review_comment_patterns
            .iter()
            .map(|p| Pattern::compile(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            github_review: methods.github_review,
            comment_patterns,
        })
    }

    fn matches(&self, review: &Review) -> bool {
        if self.github_review && review.state == ReviewState::Approved {
            return true;
        }
        if !self.comment_patterns.is_empty() && review.state == ReviewState::Commented {
            if let Some(body) = &review.body {
                return self.comment_patterns.iter().any(|p| p.matches(body));
            }
        }
        false
    }
}

/// Filter `reviews` down to the method-valid set, preserving input order.
pub(crate) fn valid_reviews<'a>(
    reviews: &'a [Review],
    commits: &[Commit],
    deployment_sha: Option<&str>,
    methods: &CompiledMethods,
) -> Vec<&'a Review> {
    let change_participants: HashSet<u64> = commits
        .iter()
        .flat_map(|c| c.author.iter().chain(c.committer.iter()))
        .map(|actor| actor.id)
        .collect();

    reviews
        .iter()
        .filter(|review| {
            if let Some(sha) = deployment_sha {
                if review.commit_id != sha {
                    return false;
                }
            }
            if change_participants.contains(&review.user.id) {
                return false;
            }
            methods.matches(review)
        })
        .collect()
}
