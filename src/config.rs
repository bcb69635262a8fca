//! Policy document model and loading.
//!
//! A policy file declares the approval expression evaluated for each
//! proposed deployment:
//!
//! ```yaml
//! policy:
//!   approval:
//!     - or:
//!         - production_signoff
//!         - and: [staging_env, team_review]
//! approval_rules:
//!   - name: production_signoff
//!     if:
//!       environment:
//!         matches: [production]
//!     requires:
//!       count: 2
//!       organizations: [acme]
//!     methods:
//!       github_review: true
//! ```
//!
//! The top-level `policy.approval` list combines with OR. Inline expressions
//! nest `and:` / `or:` groups and bare lists (treated as OR) around string
//! references into `approval_rules`. Named rules are leaf definitions, so
//! reference cycles cannot be expressed; validation still rejects unknown
//! and duplicate names up front.

use std::collections::HashSet;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::pattern::Pattern;
use crate::{Error, Result};

/// A complete policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// The approval expression evaluated per deployment
    #[serde(default)]
    pub policy: PolicySection,
    /// Named leaf rules referenced from the expression
    #[serde(default)]
    pub approval_rules: Vec<NamedApprovalRule>,
}

/// The `policy:` section of a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySection {
    /// Top-level rule list, combined with OR
    #[serde(default)]
    pub approval: Vec<ApprovalRule>,
}

/// An approval rule expression.
///
/// Either a reference to a named rule, an explicit `and:`/`or:` group, or a
/// bare list (treated as OR). The typed tree makes malformed shapes a
/// deserialization error rather than a runtime fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApprovalRule {
    /// Reference to a [`NamedApprovalRule`] by name
    Name(String),
    /// Conjunction of child rules
    And {
        /// Children; skipped children drop out of the reduction
        and: Vec<ApprovalRule>,
    },
    /// Disjunction of child rules
    Or {
        /// Children; skipped children drop out of the reduction
        or: Vec<ApprovalRule>,
    },
    /// Bare list, evaluated as OR
    List(Vec<ApprovalRule>),
}

/// A named leaf rule: an optional gate, a review requirement, and the
/// methods by which reviews count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedApprovalRule {
    /// Unique rule name
    pub name: String,
    /// Gate condition; unmet means the rule is skipped, not failed
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<RuleCondition>,
    /// Review requirement; absent or zero-count rules pass whenever the
    /// gate holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<ApprovalRequirement>,
    /// How a review qualifies as approving; absent means no review can
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<ApprovalMethods>,
}

/// Gate condition on a named rule. All provided predicates must hold;
/// absent predicates are vacuously true.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Predicate on the target environment name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentCondition>,
    /// Every commit must carry a provider-verified signature from one of
    /// these identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_valid_signatures_by: Option<IdentitySet>,
    /// Every commit's author must be one of these identities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_authored_by: Option<IdentitySet>,
}

impl RuleCondition {
    /// Whether any predicate is set at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.environment.is_none()
            && self.has_valid_signatures_by.is_none()
            && self.was_authored_by.is_none()
    }
}

/// Whitelist/blacklist predicate on the environment name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentCondition {
    /// Allowed environment names; when set, the name must be listed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<String>>,
    /// Disallowed environment names; when set, the name must not be listed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_matches: Option<Vec<String>>,
}

/// Threshold of authorized approving reviews.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    /// Number of distinct valid approving reviews required
    #[serde(default)]
    pub count: u32,
    /// Who may approve
    #[serde(flatten)]
    pub from: IdentitySet,
}

/// A union of user logins, organizations, and teams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySet {
    /// Direct user logins
    #[serde(default)]
    pub users: Vec<String>,
    /// Organizations whose members qualify
    #[serde(default)]
    pub organizations: Vec<String>,
    /// Teams whose members qualify, formatted `org/slug`
    #[serde(default)]
    pub teams: Vec<String>,
}

impl IdentitySet {
    /// Whether the set names nobody at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.organizations.is_empty() && self.teams.is_empty()
    }
}

/// Mechanisms by which a review counts as approving.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalMethods {
    /// Count reviews in the `APPROVED` state
    #[serde(default)]
    pub github_review: bool,
    /// Count `COMMENTED` reviews whose body matches any of these patterns
    /// (regex `/…/` sigil or glob; see [`crate::pattern`])
    #[serde(default)]
    pub github_review_comment_patterns: Vec<String>,
}

impl PolicyConfig {
    /// Load a policy document from a YAML file, merged with
    /// `DEPLOY_WARDEN_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or
    /// fails [`PolicyConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Policy file not found: {}",
                path.display()
            )));
        }

        let config: Self = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("DEPLOY_WARDEN_").split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the document without evaluating anything.
    ///
    /// Checks rule-name uniqueness, reference resolution, team entry
    /// format, and that every comment pattern compiles in its dialect.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error encountered.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for rule in &self.approval_rules {
            if rule.name.trim().is_empty() {
                return Err(Error::Config("approval rule name must be non-empty".into()));
            }
            if !names.insert(rule.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate approval rule name: '{}'",
                    rule.name
                )));
            }
        }

        for reference in self.references() {
            if !names.contains(reference) {
                return Err(Error::UnknownRule(reference.to_string()));
            }
        }

        for rule in &self.approval_rules {
            rule.validate()?;
        }

        Ok(())
    }

    /// All named references in the top-level approval expression.
    fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for rule in &self.policy.approval {
            rule.collect_references(&mut out);
        }
        out
    }

    /// Look up a named rule.
    #[must_use]
    pub fn named_rule(&self, name: &str) -> Option<&NamedApprovalRule> {
        self.approval_rules.iter().find(|r| r.name == name)
    }
}

impl ApprovalRule {
    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Name(name) => out.push(name),
            Self::And { and: children }
            | Self::Or { or: children }
            | Self::List(children) => {
                for child in children {
                    child.collect_references(out);
                }
            }
        }
    }
}

impl NamedApprovalRule {
    fn validate(&self) -> Result<()> {
        let identity_sets = [
            self.condition
                .as_ref()
                .and_then(|c| c.has_valid_signatures_by.as_ref()),
            self.condition
                .as_ref()
                .and_then(|c| c.was_authored_by.as_ref()),
            self.requires.as_ref().map(|r| &r.from),
        ];
        for set in identity_sets.into_iter().flatten() {
            for team in &set.teams {
                if team.split_once('/').is_none() {
                    return Err(Error::Config(format!(
                        "rule '{}': team '{team}' is not formatted org/slug",
                        self.name
                    )));
                }
            }
        }

        if let Some(methods) = &self.methods {
            for pattern in &methods.github_review_comment_patterns {
                Pattern::compile(pattern)?;
            }
        }

        Ok(())
    }
}
