//! Identity membership resolution.
//!
//! Approval requirements and conditions authorize identities against a union
//! of user logins, organizations, and teams. Direct logins compare by exact
//! string equality; organization and team membership joins against rosters
//! fetched through a host-supplied [`RosterClient`].
//!
//! Roster lookups are memoized for the duration of one evaluation, keyed by
//! `org` or `(org, slug)`, with single-flight semantics: concurrent sibling
//! evaluations sharing a [`MembershipResolver`] trigger at most one in-flight
//! fetch per key. A fetch failure is surfaced as [`Error::RosterFetch`] so
//! the caller can retry the evaluation; it is never treated as
//! non-membership.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Host-supplied roster source
// ─────────────────────────────────────────────────────────────────────────────

/// A member of an organization or team roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Account login
    pub login: String,
}

/// Source of organization and team rosters.
///
/// The webhook host implements this against the hosting provider's API;
/// tests and the offline CLI use [`StaticRosters`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be stored in
/// `Arc<dyn RosterClient>` and shared across concurrent rule evaluations.
#[async_trait]
pub trait RosterClient: Send + Sync + 'static {
    /// List the members of an organization.
    ///
    /// # Errors
    ///
    /// Returns an error when the roster cannot be fetched; the engine
    /// propagates it rather than assuming non-membership.
    async fn list_organization_members(&self, org: &str) -> Result<Vec<Member>>;

    /// List the members of a team within an organization.
    ///
    /// # Errors
    ///
    /// Returns an error when the roster cannot be fetched.
    async fn list_team_members(&self, org: &str, slug: &str) -> Result<Vec<Member>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-evaluation resolver
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RosterKey {
    Org(String),
    Team(String, String),
}

impl RosterKey {
    fn display(&self) -> String {
        match self {
            Self::Org(org) => org.clone(),
            Self::Team(org, slug) => format!("{org}/{slug}"),
        }
    }
}

/// Membership checks with a per-evaluation roster cache.
///
/// Create one resolver per `evaluate` call and drop it afterwards; the cache
/// never outlives the evaluation.
pub struct MembershipResolver {
    client: Arc<dyn RosterClient>,
    rosters: DashMap<RosterKey, Arc<OnceCell<Arc<HashSet<String>>>>>,
}

impl MembershipResolver {
    /// Create a resolver with an empty cache.
    #[must_use]
    pub fn new(client: Arc<dyn RosterClient>) -> Self {
        Self {
            client,
            rosters: DashMap::new(),
        }
    }

    /// Whether `login` is covered by any of the given identity lists.
    ///
    /// Checks in order: exact membership in `users`, then each organization
    /// roster, then each team roster (entries formatted `org/slug`).
    /// Short-circuits on the first hit. Empty lists contribute nothing; an
    /// empty login never matches.
    ///
    /// # Errors
    ///
    /// Propagates roster fetch failures and malformed team entries.
    pub async fn is_user_in_any(
        &self,
        login: &str,
        users: &[String],
        organizations: &[String],
        teams: &[String],
    ) -> Result<bool> {
        if login.is_empty() {
            return Ok(false);
        }

        if users.iter().any(|u| u == login) {
            return Ok(true);
        }

        for org in organizations {
            let roster = self.roster(RosterKey::Org(org.clone())).await?;
            if roster.contains(login) {
                return Ok(true);
            }
        }

        for team in teams {
            let (org, slug) = team.split_once('/').ok_or_else(|| {
                Error::Config(format!("team '{team}' is not formatted org/slug"))
            })?;
            let roster = self
                .roster(RosterKey::Team(org.to_string(), slug.to_string()))
                .await?;
            if roster.contains(login) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Fetch a roster through the cache.
    ///
    /// The per-key `OnceCell` guarantees at most one in-flight fetch even
    /// under concurrent sibling evaluations; later callers await the first
    /// fetch instead of issuing their own.
    async fn roster(&self, key: RosterKey) -> Result<Arc<HashSet<String>>> {
        let cell = self
            .rosters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let roster = cell
            .get_or_try_init(|| async {
                let members = match &key {
                    RosterKey::Org(org) => self.client.list_organization_members(org).await,
                    RosterKey::Team(org, slug) => {
                        self.client.list_team_members(org, slug).await
                    }
                }
                .map_err(|e| Error::RosterFetch {
                    key: key.display(),
                    reason: e.to_string(),
                })?;
                Ok::<_, Error>(Arc::new(
                    members.into_iter().map(|m| m.login).collect::<HashSet<_>>(),
                ))
            })
            .await?;

        Ok(Arc::clone(roster))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Static rosters (tests, offline CLI)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory rosters loaded from a fixture file.
///
/// ```yaml
/// organizations:
///   acme: [alice, bob]
/// teams:
///   acme/deployers: [alice]
/// ```
///
/// Unknown organizations and teams resolve to empty rosters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticRosters {
    /// Organization rosters keyed by org name
    #[serde(default)]
    pub organizations: HashMap<String, Vec<String>>,
    /// Team rosters keyed by `org/slug`
    #[serde(default)]
    pub teams: HashMap<String, Vec<String>>,
}

impl StaticRosters {
    /// Load rosters from a YAML (or JSON) fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    fn members(logins: Option<&Vec<String>>) -> Vec<Member> {
        logins
            .map(|logins| {
                logins
                    .iter()
                    .map(|login| Member {
                        login: login.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl RosterClient for StaticRosters {
    async fn list_organization_members(&self, org: &str) -> Result<Vec<Member>> {
        Ok(Self::members(self.organizations.get(org)))
    }

    async fn list_team_members(&self, org: &str, slug: &str) -> Result<Vec<Member>> {
        Ok(Self::members(self.teams.get(&format!("{org}/{slug}"))))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingClient {
        inner: StaticRosters,
        fetches: AtomicUsize,
    }

    impl CountingClient {
        fn new(inner: StaticRosters) -> Self {
            Self {
                inner,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RosterClient for CountingClient {
        async fn list_organization_members(&self, org: &str) -> Result<Vec<Member>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.list_organization_members(org).await
        }

        async fn list_team_members(&self, org: &str, slug: &str) -> Result<Vec<Member>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.list_team_members(org, slug).await
        }
    }

    fn fixture() -> StaticRosters {
        StaticRosters {
            organizations: HashMap::from([(
                "acme".to_string(),
                vec!["alice".to_string(), "bob".to_string()],
            )]),
            teams: HashMap::from([(
                "acme/deployers".to_string(),
                vec!["carol".to_string()],
            )]),
        }
    }

    fn resolver(client: Arc<dyn RosterClient>) -> MembershipResolver {
        MembershipResolver::new(client)
    }

    #[tokio::test]
    async fn direct_user_match_needs_no_fetch() {
        let client = Arc::new(CountingClient::new(fixture()));
        let r = resolver(client.clone());

        let hit = r
            .is_user_in_any("alice", &["alice".into()], &["acme".into()], &[])
            .await
            .unwrap();

        assert!(hit);
        assert_eq!(client.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn organization_roster_match() {
        let r = resolver(Arc::new(fixture()));
        assert!(r
            .is_user_in_any("bob", &[], &["acme".into()], &[])
            .await
            .unwrap());
        assert!(!r
            .is_user_in_any("mallory", &[], &["acme".into()], &[])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn team_roster_match() {
        let r = resolver(Arc::new(fixture()));
        assert!(r
            .is_user_in_any("carol", &[], &[], &["acme/deployers".into()])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn empty_identity_sets_never_match() {
        let r = resolver(Arc::new(fixture()));
        assert!(!r.is_user_in_any("alice", &[], &[], &[]).await.unwrap());
    }

    #[tokio::test]
    async fn empty_login_never_matches() {
        let r = resolver(Arc::new(fixture()));
        assert!(!r
            .is_user_in_any("", &[String::new()], &["acme".into()], &[])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn malformed_team_entry_is_a_configuration_error() {
        let r = resolver(Arc::new(fixture()));
        let err = r
            .is_user_in_any("carol", &[], &[], &["deployers".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn rosters_are_fetched_at_most_once_per_key() {
        let client = Arc::new(CountingClient::new(fixture()));
        let r = resolver(client.clone());

        for login in ["alice", "bob", "mallory"] {
            r.is_user_in_any(login, &[], &["acme".into()], &[])
                .await
                .unwrap();
        }

        assert_eq!(client.fetches.load(Ordering::SeqCst), 1);
    }
}
