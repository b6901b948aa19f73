//! Snippet records and the on-disk snippet store.
//!
//! Snippets are stored individually on disk and loaded at startup. Share
//! grants and presence entries are embedded in the snippet record, so a
//! mutation touching either is a whole-record update under the store lock.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use uuid::Uuid;

use crate::identity::User;
use crate::presence::PresenceEntry;
use crate::sharing::{self, ShareGrant};

/// Upper bound on snippet content, in bytes.
pub const MAX_CONTENT_BYTES: usize = 100_000;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Organization,
    Public,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snippet {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub organization: String,
    /// Unguessable link token. Immutable after creation, never reused.
    pub share_id: String,
    pub visibility: Visibility,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub view_count: u64,
    pub active: bool,
    #[serde(default)]
    pub grants: Vec<ShareGrant>,
    #[serde(default)]
    pub presence: Vec<PresenceEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted on snippet creation.
#[derive(Clone, Debug)]
pub struct SnippetDraft {
    pub title: String,
    pub content: String,
    pub language: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub tags: Vec<String>,
}

/// Trimmed, lowercased, de-duplicated; order is irrelevant to the model.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

pub struct SnippetStore {
    dir: PathBuf,
    snippets: HashMap<Uuid, Snippet>,
    /// Includes soft-deleted snippets so their share ids stay reserved.
    share_ids: HashMap<String, Uuid>,
}

impl SnippetStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let mut snippets = HashMap::new();
        let mut share_ids = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let snippet: Snippet = serde_json::from_slice(&bytes)
                .map_err(|e| anyhow!("corrupt snippet record {}: {e}", path.display()))?;
            share_ids.insert(snippet.share_id.clone(), snippet.id);
            snippets.insert(snippet.id, snippet);
        }
        Ok(Self {
            dir,
            snippets,
            share_ids,
        })
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Write the record back to disk.
    pub fn save(&self, id: Uuid) -> Result<()> {
        let snippet = self
            .snippets
            .get(&id)
            .ok_or_else(|| anyhow!("unknown snippet {id}"))?;
        std::fs::write(self.path(id), serde_json::to_vec_pretty(snippet)?)?;
        Ok(())
    }

    pub fn create(&mut self, owner: &User, draft: SnippetDraft) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let snippet = Snippet {
            id,
            title: draft.title,
            content: draft.content,
            language: draft.language,
            description: draft.description,
            owner_id: owner.id,
            organization: owner.organization.clone(),
            share_id: self.new_share_id(),
            visibility: draft.visibility,
            tags: normalize_tags(&draft.tags),
            view_count: 0,
            active: true,
            grants: Vec::new(),
            presence: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.share_ids.insert(snippet.share_id.clone(), id);
        self.snippets.insert(id, snippet);
        self.save(id)?;
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Snippet> {
        self.snippets.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Snippet> {
        self.snippets.get_mut(&id)
    }

    pub fn resolve_share_id(&self, share_id: &str) -> Option<Uuid> {
        self.share_ids.get(share_id).copied()
    }

    /// Generate a share token, retrying on the (astronomically unlikely)
    /// collision with any token ever issued by this store.
    fn new_share_id(&self) -> String {
        loop {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut bytes);
            let token = URL_SAFE_NO_PAD.encode(bytes);
            if !self.share_ids.contains_key(&token) {
                return token;
            }
        }
    }

    /// Active snippets owned by the given user, most recently updated first.
    pub fn owned_by(&self, owner: Uuid) -> Vec<&Snippet> {
        let mut out: Vec<&Snippet> = self
            .snippets
            .values()
            .filter(|s| s.active && s.owner_id == owner)
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    /// Active snippets visible to the whole organization (organization or
    /// public visibility), most recently updated first.
    pub fn org_visible(&self, organization: &str) -> Vec<&Snippet> {
        let mut out: Vec<&Snippet> = self
            .snippets
            .values()
            .filter(|s| {
                s.active
                    && s.organization == organization
                    && matches!(s.visibility, Visibility::Organization | Visibility::Public)
            })
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    /// Active snippets carrying a grant for the given user, most recently
    /// updated first. Grants are matched against the current identity, so
    /// pending email grants start matching as soon as the user exists.
    pub fn shared_with(&self, user: &User) -> Vec<&Snippet> {
        let mut out: Vec<&Snippet> = self
            .snippets
            .values()
            .filter(|s| {
                s.active
                    && s.owner_id != user.id
                    && s.grants.iter().any(|g| sharing::grant_matches(g, user))
            })
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    /// All active snippets in the given organization, unordered. Callers
    /// apply their own access filtering.
    pub fn org_snippets<'a>(&'a self, organization: &'a str) -> impl Iterator<Item = &'a Snippet> + 'a {
        self.snippets
            .values()
            .filter(move |s| s.active && s.organization == organization)
    }
}
