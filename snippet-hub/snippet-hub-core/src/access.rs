//! The single source of truth for snippet access decisions.
//!
//! Every call site, handlers and query filters alike, goes through
//! [`decide`]. The function is pure: it inspects a snapshot of the snippet
//! and the requester and returns a tagged decision, leaving logging and
//! status mapping to the caller.

use crate::identity::User;
use crate::sharing::{self, SharePermission};
use crate::storage::snippets::{Snippet, Visibility};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
    Delete,
    ManageSharing,
    JoinPresence,
}

/// How the snippet was looked up. Private snippets are reachable through the
/// share link by the owner's organization, but not by direct id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    ById,
    ByShareId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    /// The caller must not learn the snippet exists.
    NotFound,
    /// The snippet is known to exist for this caller, but the operation is denied.
    Forbidden,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Evaluate the access rules in precedence order; the first matching rule
/// wins. `requester` is `None` for anonymous callers.
pub fn decide(
    snippet: &Snippet,
    requester: Option<&User>,
    operation: Operation,
    lookup: Lookup,
) -> Decision {
    // Soft-deleted snippets are indistinguishable from absent ones.
    if !snippet.active {
        return Decision::Deny(DenyReason::NotFound);
    }

    if let Some(user) = requester {
        if user.id == snippet.owner_id {
            return Decision::Allow;
        }
    }

    // Strictly owner-only, regardless of visibility or grants.
    if matches!(operation, Operation::ManageSharing | Operation::Delete) {
        return Decision::Deny(DenyReason::Forbidden);
    }

    if let Some(user) = requester {
        if let Some(grant) = sharing::find_for_user(snippet, user) {
            match operation {
                Operation::Read | Operation::JoinPresence => return Decision::Allow,
                Operation::Update if grant.permission == SharePermission::Edit => {
                    return Decision::Allow
                }
                _ => {}
            }
        }
    }

    // Visibility tiers only ever grant read-class access.
    if matches!(operation, Operation::Read | Operation::JoinPresence) {
        match snippet.visibility {
            Visibility::Public => return Decision::Allow,
            Visibility::Organization => {
                if let Some(user) = requester {
                    if user.organization == snippet.organization {
                        return Decision::Allow;
                    }
                }
            }
            Visibility::Private => {
                // Share links are the intended distribution channel for
                // private snippets inside the organization; direct-id
                // browsing is not.
                if lookup == Lookup::ByShareId {
                    if let Some(user) = requester {
                        if user.organization == snippet.organization {
                            return Decision::Allow;
                        }
                    }
                }
            }
        }
    }

    Decision::Deny(DenyReason::Forbidden)
}
