//! The per-snippet sharing ledger: explicit user grants layered on top of
//! snippet visibility.
//!
//! Grants name either a resolved user or a raw email for someone who has not
//! registered yet. Matching always runs against the current identity store,
//! so a pending email grant starts working the moment a matching user exists,
//! with no ledger mutation required.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{IdentityStore, User};
use crate::storage::snippets::Snippet;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    View,
    Edit,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: Uuid,
    /// Resolved target; `None` while the grant is pending on an email.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Lowercased; kept for display and for pending-grant matching.
    pub email: String,
    pub permission: SharePermission,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
}

/// True when the grant names the given user, by resolved id or by the email
/// it was created with.
pub fn grant_matches(grant: &ShareGrant, user: &User) -> bool {
    grant.user_id == Some(user.id) || grant.email.eq_ignore_ascii_case(&user.email)
}

/// The grant applying to the given user, if any.
pub fn find_for_user<'a>(snippet: &'a Snippet, user: &User) -> Option<&'a ShareGrant> {
    snippet.grants.iter().find(|g| grant_matches(g, user))
}

/// Grant with display fields resolved against the identity store at call time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrantView {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub permission: SharePermission,
    pub granted_at: DateTime<Utc>,
}

/// Every input target lands in exactly one of the three lists, so callers can
/// report precisely what was processed.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GrantOutcome {
    pub granted: Vec<GrantView>,
    pub already_shared: Vec<String>,
    pub not_found: Vec<String>,
}

/// Append grants for the given targets. Duplicates are absorbed into
/// `already_shared` and unknown usernames into `not_found`; neither is an
/// error. Usernames resolve within the granter's organization only.
pub fn grant(
    snippet: &mut Snippet,
    identities: &IdentityStore,
    granter: &User,
    emails: &[String],
    usernames: &[String],
    permission: SharePermission,
) -> GrantOutcome {
    let mut outcome = GrantOutcome::default();

    for raw in emails {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            outcome.not_found.push(raw.clone());
            continue;
        }
        match identities.find_by_email(&email) {
            Some(user) => {
                if snippet.grants.iter().any(|g| grant_matches(g, user)) {
                    outcome.already_shared.push(email);
                } else {
                    let view = append_grant(snippet, identities, granter, Some(user.id), user.email.clone(), permission);
                    outcome.granted.push(view);
                }
            }
            None => {
                if snippet.grants.iter().any(|g| g.email == email) {
                    outcome.already_shared.push(email);
                } else {
                    let view = append_grant(snippet, identities, granter, None, email, permission);
                    outcome.granted.push(view);
                }
            }
        }
    }

    for raw in usernames {
        let username = raw.trim();
        let target = identities
            .find_by_username(username)
            .filter(|u| u.organization == granter.organization);
        match target {
            None => outcome.not_found.push(raw.clone()),
            Some(user) => {
                if snippet.grants.iter().any(|g| grant_matches(g, user)) {
                    outcome.already_shared.push(raw.clone());
                } else {
                    let view = append_grant(snippet, identities, granter, Some(user.id), user.email.clone(), permission);
                    outcome.granted.push(view);
                }
            }
        }
    }

    outcome
}

fn append_grant(
    snippet: &mut Snippet,
    identities: &IdentityStore,
    granter: &User,
    user_id: Option<Uuid>,
    email: String,
    permission: SharePermission,
) -> GrantView {
    let grant = ShareGrant {
        id: Uuid::new_v4(),
        user_id,
        email,
        permission,
        granted_by: granter.id,
        granted_at: Utc::now(),
    };
    let view = grant_view(&grant, identities);
    snippet.grants.push(grant);
    view
}

/// Remove a grant by its internal id. Missing ids are a normal `false`,
/// never an error.
pub fn revoke(snippet: &mut Snippet, grant_id: Uuid) -> bool {
    let before = snippet.grants.len();
    snippet.grants.retain(|g| g.id != grant_id);
    snippet.grants.len() != before
}

/// The ledger with display fields resolved now. Does not mutate the ledger.
pub fn list(snippet: &Snippet, identities: &IdentityStore) -> Vec<GrantView> {
    snippet
        .grants
        .iter()
        .map(|g| grant_view(g, identities))
        .collect()
}

fn grant_view(grant: &ShareGrant, identities: &IdentityStore) -> GrantView {
    let user = grant
        .user_id
        .and_then(|id| identities.get(id))
        .or_else(|| identities.find_by_email(&grant.email));
    GrantView {
        id: grant.id,
        email: user.map(|u| u.email.clone()).unwrap_or_else(|| grant.email.clone()),
        username: user.map(|u| u.username.clone()),
        display_name: user.map(|u| u.display_name.clone()),
        permission: grant.permission,
        granted_at: grant.granted_at,
    }
}
