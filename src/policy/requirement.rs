//! Approval requirement checking.
//!
//! Counts the method-valid reviews whose reviewers are authorized by the
//! requirement's identity set and compares against the threshold. A
//! reviewer counts at most once, keyed by account id; membership checks for
//! distinct reviewers run concurrently against the shared roster cache.

use std::collections::HashSet;

use futures::future;

use crate::config::ApprovalRequirement;
use crate::context::Review;
use crate::membership::MembershipResolver;
use crate::Result;

/// Whether at least `count` distinct authorized reviewers approve.
pub(crate) async fn met(
    requirement: &ApprovalRequirement,
    valid_reviews: &[&Review],
    members: &MembershipResolver,
) -> Result<bool> {
    if requirement.count == 0 {
        return Ok(true);
    }

    // Distinct by reviewer id; first review wins.
    let mut seen = HashSet::new();
    let distinct: Vec<&Review> = valid_reviews
        .iter()
        .copied()
        .filter(|r| seen.insert(r.user.id))
        .collect();

    let checks = distinct.iter().map(|review| {
        members.is_user_in_any(
            &review.user.login,
            &requirement.from.users,
            &requirement.from.organizations,
            &requirement.from.teams,
        )
    });
    let authorized = future::try_join_all(checks)
        .await?
        .into_iter()
        .filter(|hit| *hit)
        .count();

    Ok(authorized >= requirement.count as usize)
}
