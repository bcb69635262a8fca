//! Rule evaluation and the policy engine.
//!
//! Rules evaluate to a three-valued [`RuleOutcome`]. `Skipped` is the
//! neutral element of group reduction: skipped children drop out of AND/OR
//! groups, a group whose children all skipped is itself skipped, and a
//! policy that produces only skipped rules at the top level denies the
//! deployment. Sibling rules evaluate concurrently; the reduction is by
//! input position, so the outcome never depends on completion order.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ApprovalRequirement, ApprovalRule, PolicyConfig, RuleCondition};
use crate::context::PolicyContext;
use crate::membership::{MembershipResolver, RosterClient};
use crate::policy::review::CompiledMethods;
use crate::policy::{condition, requirement, review};
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────────────────────────────────────

/// Three-valued result of evaluating a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOutcome {
    /// The rule's requirement is satisfied
    Pass,
    /// The rule applies but its requirement is not satisfied
    Fail,
    /// The rule's gate does not apply; neutral in group reductions
    Skipped,
}

/// Outcome of one named rule within an evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct RuleRecord {
    /// Rule name
    pub name: String,
    /// Outcome of this rule
    pub outcome: RuleOutcome,
}

/// A full evaluation result: the top-level outcome plus per-rule records,
/// in policy order.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    /// Reduced top-level outcome; only `Pass` approves
    pub outcome: RuleOutcome,
    /// Every named rule reached, with its outcome
    pub rules: Vec<RuleRecord>,
}

impl Evaluation {
    /// Whether this evaluation approves the deployment.
    #[must_use]
    pub fn approved(&self) -> bool {
        self.outcome == RuleOutcome::Pass
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupOp {
    And,
    Or,
}

/// Reduce child outcomes, discarding `Skipped` first.
fn reduce(op: GroupOp, outcomes: &[RuleOutcome]) -> RuleOutcome {
    let remaining: Vec<RuleOutcome> = outcomes
        .iter()
        .copied()
        .filter(|o| *o != RuleOutcome::Skipped)
        .collect();
    if remaining.is_empty() {
        return RuleOutcome::Skipped;
    }
    let pass = match op {
        GroupOp::And => remaining.iter().all(|o| *o == RuleOutcome::Pass),
        GroupOp::Or => remaining.iter().any(|o| *o == RuleOutcome::Pass),
    };
    if pass {
        RuleOutcome::Pass
    } else {
        RuleOutcome::Fail
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// A named rule with its comment patterns compiled.
#[derive(Debug, Clone)]
struct CompiledRule {
    condition: Option<RuleCondition>,
    requires: Option<ApprovalRequirement>,
    methods: CompiledMethods,
}

/// The deployment approval policy engine.
///
/// Build once per policy with [`PolicyEngine::new`], then call
/// [`PolicyEngine::evaluate`] per proposed deployment. The engine holds no
/// mutable state; each evaluation gets a fresh roster cache.
pub struct PolicyEngine {
    approval: Vec<ApprovalRule>,
    rules: HashMap<String, CompiledRule>,
    client: Arc<dyn RosterClient>,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("approval", &self.approval)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl PolicyEngine {
    /// Validate the policy document and compile it into an engine.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for duplicate or unknown rule names,
    /// malformed team entries, or patterns that fail to compile. A
    /// malformed policy fails loudly here, before any evaluation.
    pub fn new(config: PolicyConfig, client: Arc<dyn RosterClient>) -> Result<Self> {
        config.validate()?;

        let mut rules = HashMap::new();
        for rule in &config.approval_rules {
            rules.insert(
                rule.name.clone(),
                CompiledRule {
                    condition: rule.condition.clone(),
                    requires: rule.requires.clone(),
                    methods: CompiledMethods::compile(rule.methods.as_ref())?,
                },
            );
        }

        Ok(Self {
            approval: config.policy.approval,
            rules,
            client,
        })
    }

    /// Evaluate the policy against one deployment snapshot.
    ///
    /// Returns `Ok(true)` when the policy approves, `Ok(false)` when it
    /// denies (including the all-skipped case). Configuration and roster
    /// errors propagate; they are never folded into a denial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRule`] for dangling references and
    /// [`Error::RosterFetch`] when a membership lookup fails.
    pub async fn evaluate(&self, context: &PolicyContext) -> Result<bool> {
        Ok(self.evaluate_explained(context).await?.approved())
    }

    /// Evaluate and return the per-rule outcomes alongside the decision.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyEngine::evaluate`].
    pub async fn evaluate_explained(&self, context: &PolicyContext) -> Result<Evaluation> {
        if self.approval.is_empty() {
            warn!("policy lists no approval rules; denying by default");
            return Ok(Evaluation {
                outcome: RuleOutcome::Skipped,
                rules: Vec::new(),
            });
        }

        let members = MembershipResolver::new(Arc::clone(&self.client));
        let (outcome, rules) = self
            .eval_group(GroupOp::Or, &self.approval, context, &members)
            .await?;

        match outcome {
            RuleOutcome::Pass => {
                info!(rules = rules.len(), "deployment approved by policy");
            }
            RuleOutcome::Fail => warn!("policy not satisfied; denying deployment"),
            RuleOutcome::Skipped => {
                warn!("no approval rule applied to this deployment; denying");
            }
        }
        Ok(Evaluation { outcome, rules })
    }

    /// Evaluate one rule expression. Boxed for recursion through groups.
    fn eval_rule<'a>(
        &'a self,
        rule: &'a ApprovalRule,
        context: &'a PolicyContext,
        members: &'a MembershipResolver,
    ) -> BoxFuture<'a, Result<(RuleOutcome, Vec<RuleRecord>)>> {
        Box::pin(async move {
            match rule {
                ApprovalRule::Name(name) => {
                    let compiled = self
                        .rules
                        .get(name)
                        .ok_or_else(|| Error::UnknownRule(name.clone()))?;
                    let outcome = self.eval_named(name, compiled, context, members).await?;
                    Ok((
                        outcome,
                        vec![RuleRecord {
                            name: name.clone(),
                            outcome,
                        }],
                    ))
                }
                ApprovalRule::And { and } => {
                    self.eval_group(GroupOp::And, and, context, members).await
                }
                ApprovalRule::Or { or } => self.eval_group(GroupOp::Or, or, context, members).await,
                ApprovalRule::List(rules) => {
                    self.eval_group(GroupOp::Or, rules, context, members).await
                }
            }
        })
    }

    /// Evaluate children concurrently, then reduce by input position.
    async fn eval_group(
        &self,
        op: GroupOp,
        children: &[ApprovalRule],
        context: &PolicyContext,
        members: &MembershipResolver,
    ) -> Result<(RuleOutcome, Vec<RuleRecord>)> {
        let results = future::try_join_all(
            children
                .iter()
                .map(|child| self.eval_rule(child, context, members)),
        )
        .await?;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut records = Vec::new();
        for (outcome, mut child_records) in results {
            outcomes.push(outcome);
            records.append(&mut child_records);
        }
        Ok((reduce(op, &outcomes), records))
    }

    /// Evaluate a named leaf rule: gate, then requirement.
    async fn eval_named(
        &self,
        name: &str,
        rule: &CompiledRule,
        context: &PolicyContext,
        members: &MembershipResolver,
    ) -> Result<RuleOutcome> {
        if let Some(gate) = &rule.condition {
            if !condition::holds(gate, context, members).await? {
                debug!(rule = %name, "gate condition unmet; rule skipped");
                return Ok(RuleOutcome::Skipped);
            }
        }

        let Some(requires) = &rule.requires else {
            debug!(rule = %name, "no requirement; rule passes");
            return Ok(RuleOutcome::Pass);
        };
        if requires.count == 0 {
            debug!(rule = %name, "zero-count requirement; rule passes");
            return Ok(RuleOutcome::Pass);
        }

        let valid = review::valid_reviews(
            &context.reviews,
            &context.commits,
            context.deployment_sha(),
            &rule.methods,
        );
        let met = requirement::met(requires, &valid, members).await?;
        let outcome = if met {
            RuleOutcome::Pass
        } else {
            RuleOutcome::Fail
        };
        debug!(rule = %name, valid = valid.len(), ?outcome, "evaluated requirement");
        Ok(outcome)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use RuleOutcome::{Fail, Pass, Skipped};

    // ── reduction ────────────────────────────────────────────────────────────

    #[test]
    fn and_passes_only_when_all_remaining_pass() {
        assert_eq!(reduce(GroupOp::And, &[Pass, Pass]), Pass);
        assert_eq!(reduce(GroupOp::And, &[Pass, Fail]), Fail);
        assert_eq!(reduce(GroupOp::And, &[Pass, Skipped]), Pass);
        assert_eq!(reduce(GroupOp::And, &[Fail, Skipped]), Fail);
    }

    #[test]
    fn or_passes_when_any_remaining_passes() {
        assert_eq!(reduce(GroupOp::Or, &[Fail, Pass]), Pass);
        assert_eq!(reduce(GroupOp::Or, &[Fail, Fail]), Fail);
        assert_eq!(reduce(GroupOp::Or, &[Skipped, Fail]), Fail);
        assert_eq!(reduce(GroupOp::Or, &[Skipped, Pass]), Pass);
    }

    #[test]
    fn all_skipped_groups_are_skipped() {
        assert_eq!(reduce(GroupOp::And, &[Skipped, Skipped]), Skipped);
        assert_eq!(reduce(GroupOp::Or, &[Skipped]), Skipped);
        assert_eq!(reduce(GroupOp::And, &[]), Skipped);
    }

    #[test]
    fn reduction_is_permutation_invariant() {
        let outcomes = [Pass, Fail, Skipped, Pass, Skipped];
        let permutations: [[usize; 5]; 4] = [
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [2, 0, 4, 1, 3],
            [1, 4, 0, 3, 2],
        ];
        for op in [GroupOp::And, GroupOp::Or] {
            let baseline = reduce(op, &outcomes);
            for perm in &permutations {
                let shuffled: Vec<RuleOutcome> = perm.iter().map(|&i| outcomes[i]).collect();
                assert_eq!(reduce(op, &shuffled), baseline);
            }
        }
    }

    // ── construction ─────────────────────────────────────────────────────────

    #[test]
    fn construction_rejects_invalid_documents() {
        use crate::membership::StaticRosters;

        let config: PolicyConfig = serde_yaml::from_str(
            r"
policy:
  approval: [ghost]
approval_rules: []
",
        )
        .unwrap();
        let err = PolicyEngine::new(config, Arc::new(StaticRosters::default())).unwrap_err();
        assert!(matches!(err, Error::UnknownRule(name) if name == "ghost"));
    }
}
