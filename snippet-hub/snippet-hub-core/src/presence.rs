//! Ephemeral "currently viewing" tracking, embedded on the snippet record.
//!
//! There is no background sweep: entries expire by recency alone and are
//! pruned lazily whenever a join or list touches the snippet's presence set.
//! Re-joining is the heartbeat; clients re-invoke join well inside the
//! staleness window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::User;
use crate::storage::snippets::Snippet;

/// Entries older than this are expired and excluded from every result.
pub const STALENESS_WINDOW_SECS: i64 = 5 * 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: Uuid,
    pub username: String,
    /// Opaque client/session token; never returned to other viewers.
    pub session: String,
    pub last_seen: DateTime<Utc>,
}

/// Presence projection returned to clients (session token withheld).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceView {
    pub user_id: Uuid,
    pub username: String,
    pub last_seen: DateTime<Utc>,
}

impl From<&PresenceEntry> for PresenceView {
    fn from(entry: &PresenceEntry) -> Self {
        Self {
            user_id: entry.user_id,
            username: entry.username.clone(),
            last_seen: entry.last_seen,
        }
    }
}

fn expired(entry: &PresenceEntry, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(entry.last_seen) >= Duration::seconds(STALENESS_WINDOW_SECS)
}

/// Replace any prior entry for the viewer with a fresh one, prune expired
/// entries, and return the resulting set. Re-joining is also the keep-alive.
pub fn join(snippet: &mut Snippet, viewer: &User, session: &str, now: DateTime<Utc>) -> Vec<PresenceView> {
    snippet.presence.retain(|e| e.user_id != viewer.id);
    snippet.presence.push(PresenceEntry {
        user_id: viewer.id,
        username: viewer.username.clone(),
        session: session.to_string(),
        last_seen: now,
    });
    prune(snippet, now);
    snippet.presence.iter().map(PresenceView::from).collect()
}

/// Remove the viewer's entry unconditionally. Absence is not an error.
pub fn leave(snippet: &mut Snippet, viewer_id: Uuid) {
    snippet.presence.retain(|e| e.user_id != viewer_id);
}

/// Drop expired entries from storage.
pub fn prune(snippet: &mut Snippet, now: DateTime<Utc>) {
    snippet.presence.retain(|e| !expired(e, now));
}

/// Prune, then return the remaining set. The only strongly authoritative read.
pub fn active(snippet: &mut Snippet, now: DateTime<Utc>) -> Vec<PresenceView> {
    prune(snippet, now);
    snippet.presence.iter().map(PresenceView::from).collect()
}
