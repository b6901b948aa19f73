//! Snippet lifecycle orchestration.
//!
//! Every boundary operation funnels through here: resolve the snippet, ask
//! the access evaluator for a decision, and on allow apply the operation
//! against the store, the sharing ledger, or the presence tracker. Deny
//! reasons are surfaced exactly as the evaluator produced them; any
//! concealment happens at the HTTP boundary.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::access::{self, Decision, DenyReason, Lookup, Operation};
use crate::error::ServiceError;
use crate::identity::{IdentityStore, User};
use crate::presence::{self, PresenceView};
use crate::sharing::{self, GrantOutcome, GrantView, SharePermission};
use crate::storage::snippets::{
    normalize_tags, Snippet, SnippetDraft, SnippetStore, Visibility, MAX_CONTENT_BYTES,
};

/// 1-based pagination window, clamped to sane bounds.
#[derive(Clone, Copy, Debug)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;

    pub fn new(page: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnerView {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnippetView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub language: String,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub share_id: String,
    pub owner: OwnerView,
    pub organization: String,
    pub view_count: u64,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// The requesting viewer's own standing on the snippet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewerAccess {
    pub is_owner: bool,
    pub permission: Option<SharePermission>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnippetDetail {
    #[serde(flatten)]
    pub snippet: SnippetView,
    pub access: ViewerAccess,
    pub viewers: Vec<PresenceView>,
    pub shared_user_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SnippetPage {
    pub snippets: Vec<SnippetView>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ShareReport {
    #[serde(flatten)]
    pub outcome: GrantOutcome,
    pub total_shared_users: usize,
}

/// Whitelisted update fields; absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SnippetPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    pub query: Option<String>,
    pub language: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrgStats {
    pub languages: Vec<TermCount>,
    pub tags: Vec<TermCount>,
}

const STATS_TOP_N: usize = 10;

#[derive(Clone)]
pub struct SnippetService {
    store: Arc<RwLock<SnippetStore>>,
    identities: Arc<RwLock<IdentityStore>>,
}

fn deny(reason: DenyReason) -> ServiceError {
    match reason {
        DenyReason::NotFound => ServiceError::NotFound,
        DenyReason::Forbidden => ServiceError::Forbidden,
    }
}

fn authorize(
    snippet: &Snippet,
    requester: Option<&User>,
    operation: Operation,
    lookup: Lookup,
) -> Result<(), ServiceError> {
    match access::decide(snippet, requester, operation, lookup) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => Err(deny(reason)),
    }
}

fn validate_title(title: &str) -> Result<String, ServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::invalid("title must not be empty"));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<(), ServiceError> {
    if content.is_empty() {
        return Err(ServiceError::invalid("content must not be empty"));
    }
    if content.len() > MAX_CONTENT_BYTES {
        return Err(ServiceError::invalid(format!(
            "content exceeds {MAX_CONTENT_BYTES} bytes"
        )));
    }
    Ok(())
}

fn validate_language(language: &str) -> Result<String, ServiceError> {
    let language = language.trim().to_lowercase();
    if language.is_empty() {
        return Err(ServiceError::invalid("language must not be empty"));
    }
    Ok(language)
}

impl SnippetService {
    pub fn new(store: Arc<RwLock<SnippetStore>>, identities: Arc<RwLock<IdentityStore>>) -> Self {
        Self { store, identities }
    }

    pub async fn create(
        &self,
        owner: &User,
        mut draft: SnippetDraft,
    ) -> Result<SnippetView, ServiceError> {
        draft.title = validate_title(&draft.title)?;
        validate_content(&draft.content)?;
        draft.language = validate_language(&draft.language)?;

        let mut store = self.store.write().await;
        let identities = self.identities.read().await;
        let id = store.create(owner, draft)?;
        tracing::info!(snippet = %id, owner = %owner.username, "snippet created");
        let snippet = store.get(id).expect("just created");
        Ok(view(snippet, &identities))
    }

    pub async fn get(&self, requester: &User, id: Uuid) -> Result<SnippetDetail, ServiceError> {
        let mut store = self.store.write().await;
        let identities = self.identities.read().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::Read, Lookup::ById)?;
        let viewers = presence::active(snippet, Utc::now());
        Ok(detail(snippet, requester, viewers, &identities))
    }

    /// Share-link read path. Bumps the view counter best-effort.
    pub async fn get_by_share_id(
        &self,
        requester: Option<&User>,
        share_id: &str,
    ) -> Result<SnippetView, ServiceError> {
        let mut store = self.store.write().await;
        let identities = self.identities.read().await;
        let id = store.resolve_share_id(share_id).ok_or(ServiceError::NotFound)?;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, requester, Operation::Read, Lookup::ByShareId)?;
        snippet.view_count += 1;
        let result = view(snippet, &identities);
        if let Err(e) = store.save(id) {
            tracing::warn!(snippet = %id, error = %e, "failed to persist view count");
        }
        Ok(result)
    }

    pub async fn update(
        &self,
        requester: &User,
        id: Uuid,
        patch: SnippetPatch,
    ) -> Result<SnippetView, ServiceError> {
        // Validate the whole patch before touching the record, so a bad
        // field cannot leave a half-applied snippet in memory.
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        if let Some(content) = patch.content.as_deref() {
            validate_content(content)?;
        }
        let language = patch.language.as_deref().map(validate_language).transpose()?;

        let mut store = self.store.write().await;
        let identities = self.identities.read().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::Update, Lookup::ById)?;

        if let Some(title) = title {
            snippet.title = title;
        }
        if let Some(content) = patch.content {
            snippet.content = content;
        }
        if let Some(language) = language {
            snippet.language = language;
        }
        if let Some(description) = patch.description {
            snippet.description = if description.trim().is_empty() {
                None
            } else {
                Some(description)
            };
        }
        if let Some(visibility) = patch.visibility {
            snippet.visibility = visibility;
        }
        if let Some(tags) = patch.tags {
            snippet.tags = normalize_tags(&tags);
        }
        snippet.updated_at = Utc::now();
        let result = view(snippet, &identities);
        store.save(id)?;
        Ok(result)
    }

    pub async fn soft_delete(&self, requester: &User, id: Uuid) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::Delete, Lookup::ById)?;
        snippet.active = false;
        snippet.updated_at = Utc::now();
        store.save(id)?;
        tracing::info!(snippet = %id, "snippet soft-deleted");
        Ok(())
    }

    pub async fn share(
        &self,
        requester: &User,
        id: Uuid,
        emails: &[String],
        usernames: &[String],
        permission: SharePermission,
    ) -> Result<ShareReport, ServiceError> {
        let mut store = self.store.write().await;
        let identities = self.identities.read().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::ManageSharing, Lookup::ById)?;
        let outcome = sharing::grant(snippet, &identities, requester, emails, usernames, permission);
        let total_shared_users = snippet.grants.len();
        store.save(id)?;
        Ok(ShareReport {
            outcome,
            total_shared_users,
        })
    }

    /// Revoke a grant by id. A missing grant id reports `NotFound`, never a
    /// hard failure.
    pub async fn unshare(
        &self,
        requester: &User,
        id: Uuid,
        grant_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::ManageSharing, Lookup::ById)?;
        if !sharing::revoke(snippet, grant_id) {
            return Err(ServiceError::NotFound);
        }
        store.save(id)?;
        Ok(())
    }

    pub async fn sharing_details(
        &self,
        requester: &User,
        id: Uuid,
    ) -> Result<Vec<GrantView>, ServiceError> {
        let store = self.store.read().await;
        let identities = self.identities.read().await;
        let snippet = store.get(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::ManageSharing, Lookup::ById)?;
        Ok(sharing::list(snippet, &identities))
    }

    pub async fn join_view(
        &self,
        requester: &User,
        id: Uuid,
        session: &str,
    ) -> Result<Vec<PresenceView>, ServiceError> {
        let mut store = self.store.write().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::JoinPresence, Lookup::ById)?;
        let viewers = presence::join(snippet, requester, session, Utc::now());
        if let Err(e) = store.save(id) {
            tracing::warn!(snippet = %id, error = %e, "failed to persist presence join");
        }
        Ok(viewers)
    }

    /// Leaving only requires the snippet to exist; removing an absent entry
    /// is a no-op.
    pub async fn leave_view(&self, requester: &User, id: Uuid) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        if !snippet.active {
            return Err(ServiceError::NotFound);
        }
        presence::leave(snippet, requester.id);
        if let Err(e) = store.save(id) {
            tracing::warn!(snippet = %id, error = %e, "failed to persist presence leave");
        }
        Ok(())
    }

    pub async fn viewers(
        &self,
        requester: &User,
        id: Uuid,
    ) -> Result<Vec<PresenceView>, ServiceError> {
        let mut store = self.store.write().await;
        let snippet = store.get_mut(id).ok_or(ServiceError::NotFound)?;
        authorize(snippet, Some(requester), Operation::Read, Lookup::ById)?;
        Ok(presence::active(snippet, Utc::now()))
    }

    pub async fn list_mine(&self, requester: &User, page: Page) -> Result<SnippetPage, ServiceError> {
        let store = self.store.read().await;
        let identities = self.identities.read().await;
        Ok(paginate(store.owned_by(requester.id), page, &identities))
    }

    pub async fn list_organization(
        &self,
        requester: &User,
        page: Page,
    ) -> Result<SnippetPage, ServiceError> {
        let store = self.store.read().await;
        let identities = self.identities.read().await;
        Ok(paginate(
            store.org_visible(&requester.organization),
            page,
            &identities,
        ))
    }

    pub async fn list_shared_with_me(
        &self,
        requester: &User,
        page: Page,
    ) -> Result<SnippetPage, ServiceError> {
        let store = self.store.read().await;
        let identities = self.identities.read().await;
        Ok(paginate(store.shared_with(requester), page, &identities))
    }

    /// Organization-scoped search. Filtering goes through the access
    /// evaluator per record, so the result set is exactly what the requester
    /// could read one by one.
    pub async fn search(
        &self,
        requester: &User,
        filter: SearchFilter,
        page: Page,
    ) -> Result<SnippetPage, ServiceError> {
        let store = self.store.read().await;
        let identities = self.identities.read().await;

        let author_id = match &filter.author {
            Some(author) => match identities.find_by_username(author) {
                Some(user) => Some(user.id),
                // Unknown author matches nothing.
                None => {
                    return Ok(SnippetPage {
                        snippets: Vec::new(),
                        total: 0,
                        page: page.page,
                        limit: page.limit,
                    })
                }
            },
            None => None,
        };
        let query = filter.query.as_deref().map(str::to_lowercase);
        let language = filter.language.as_deref().map(str::to_lowercase);
        let tags = normalize_tags(&filter.tags);

        let mut matches: Vec<&Snippet> = store
            .org_snippets(&requester.organization)
            .filter(|s| access::decide(s, Some(requester), Operation::Read, Lookup::ById).allowed())
            .filter(|s| author_id.map_or(true, |id| s.owner_id == id))
            .filter(|s| language.as_deref().map_or(true, |l| s.language == l))
            .filter(|s| tags.iter().all(|t| s.tags.contains(t)))
            .filter(|s| {
                query.as_deref().map_or(true, |q| {
                    s.title.to_lowercase().contains(q)
                        || s.content.to_lowercase().contains(q)
                        || s.description
                            .as_deref()
                            .map_or(false, |d| d.to_lowercase().contains(q))
                })
            })
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(paginate(matches, page, &identities))
    }

    /// Top languages and tags across the snippets the requester can read in
    /// their organization.
    pub async fn stats(&self, requester: &User) -> Result<OrgStats, ServiceError> {
        let store = self.store.read().await;
        let mut languages: std::collections::HashMap<String, usize> = Default::default();
        let mut tags: std::collections::HashMap<String, usize> = Default::default();
        for snippet in store
            .org_snippets(&requester.organization)
            .filter(|s| access::decide(s, Some(requester), Operation::Read, Lookup::ById).allowed())
        {
            *languages.entry(snippet.language.clone()).or_default() += 1;
            for tag in &snippet.tags {
                *tags.entry(tag.clone()).or_default() += 1;
            }
        }
        Ok(OrgStats {
            languages: top_terms(languages),
            tags: top_terms(tags),
        })
    }
}

fn top_terms(counts: std::collections::HashMap<String, usize>) -> Vec<TermCount> {
    let mut terms: Vec<TermCount> = counts
        .into_iter()
        .map(|(term, count)| TermCount { term, count })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(STATS_TOP_N);
    terms
}

fn view(snippet: &Snippet, identities: &IdentityStore) -> SnippetView {
    let owner = identities.get(snippet.owner_id);
    SnippetView {
        id: snippet.id,
        title: snippet.title.clone(),
        content: snippet.content.clone(),
        language: snippet.language.clone(),
        description: snippet.description.clone(),
        visibility: snippet.visibility,
        tags: snippet.tags.clone(),
        share_id: snippet.share_id.clone(),
        owner: OwnerView {
            id: snippet.owner_id,
            username: owner.map(|u| u.username.clone()).unwrap_or_default(),
            display_name: owner.map(|u| u.display_name.clone()).unwrap_or_default(),
        },
        organization: snippet.organization.clone(),
        view_count: snippet.view_count,
        created_at: snippet.created_at,
        updated_at: snippet.updated_at,
    }
}

fn detail(
    snippet: &Snippet,
    requester: &User,
    viewers: Vec<PresenceView>,
    identities: &IdentityStore,
) -> SnippetDetail {
    let is_owner = snippet.owner_id == requester.id;
    let permission = sharing::find_for_user(snippet, requester).map(|g| g.permission);
    SnippetDetail {
        snippet: view(snippet, identities),
        access: ViewerAccess {
            is_owner,
            permission,
        },
        viewers,
        shared_user_count: snippet.grants.len(),
    }
}

fn paginate(matches: Vec<&Snippet>, page: Page, identities: &IdentityStore) -> SnippetPage {
    let total = matches.len();
    let snippets = matches
        .into_iter()
        .skip((page.page - 1) * page.limit)
        .take(page.limit)
        .map(|s| view(s, identities))
        .collect();
    SnippetPage {
        snippets,
        total,
        page: page.page,
        limit: page.limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    struct Fixture {
        service: SnippetService,
        identities: Arc<RwLock<IdentityStore>>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RwLock::new(
            SnippetStore::new(dir.path().join("snippets")).unwrap(),
        ));
        let identities = Arc::new(RwLock::new(
            IdentityStore::new(dir.path().join("users")).unwrap(),
        ));
        Fixture {
            service: SnippetService::new(store, identities.clone()),
            identities,
            _dir: dir,
        }
    }

    async fn add_user(fixture: &Fixture, username: &str, org: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@{org}.test"),
            display_name: username.to_string(),
            password_hash: None,
            external_subject: None,
            organization: org.to_string(),
            role: Role::User,
            active: true,
            created_at: Utc::now(),
        };
        fixture
            .identities
            .write()
            .await
            .insert(user.clone())
            .unwrap();
        user
    }

    fn draft(title: &str, language: &str, visibility: Visibility, tags: &[&str]) -> SnippetDraft {
        SnippetDraft {
            title: title.to_string(),
            content: format!("// {title}"),
            language: language.to_string(),
            description: None,
            visibility,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn create_resolves_owner_display_name() {
        let fx = fixture().await;
        let owner = add_user(&fx, "jdoe", "acme").await;
        let created = fx
            .service
            .create(&owner, draft("hello", "rust", Visibility::Private, &[]))
            .await
            .unwrap();
        assert_eq!(created.owner.username, "jdoe");
        assert_eq!(created.view_count, 0);
        assert!(!created.share_id.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let fx = fixture().await;
        let owner = add_user(&fx, "jdoe", "acme").await;
        let result = fx
            .service
            .create(&owner, draft("  ", "rust", Visibility::Private, &[]))
            .await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));

        let mut oversized = draft("big", "rust", Visibility::Private, &[]);
        oversized.content = "x".repeat(MAX_CONTENT_BYTES + 1);
        let result = fx.service.create(&owner, oversized).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn soft_delete_hides_snippet_from_everyone_including_owner() {
        let fx = fixture().await;
        let owner = add_user(&fx, "jdoe", "acme").await;
        let created = fx
            .service
            .create(&owner, draft("hello", "rust", Visibility::Public, &[]))
            .await
            .unwrap();

        fx.service.soft_delete(&owner, created.id).await.unwrap();
        assert!(matches!(
            fx.service.get(&owner, created.id).await,
            Err(ServiceError::NotFound)
        ));
        assert!(matches!(
            fx.service
                .get_by_share_id(Some(&owner), &created.share_id)
                .await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn edit_grant_allows_update_for_grantee_only() {
        let fx = fixture().await;
        let owner = add_user(&fx, "owner", "acme").await;
        let editor = add_user(&fx, "editor", "acme").await;
        let bystander = add_user(&fx, "bystander", "acme").await;
        let created = fx
            .service
            .create(&owner, draft("hello", "rust", Visibility::Private, &[]))
            .await
            .unwrap();

        fx.service
            .share(
                &owner,
                created.id,
                &["editor@acme.test".to_string()],
                &[],
                SharePermission::Edit,
            )
            .await
            .unwrap();

        let patch = SnippetPatch {
            content: Some("updated".to_string()),
            ..Default::default()
        };
        let updated = fx
            .service
            .update(&editor, created.id, patch.clone())
            .await
            .unwrap();
        assert_eq!(updated.content, "updated");

        assert!(matches!(
            fx.service.update(&bystander, created.id, patch).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn share_link_read_increments_view_count() {
        let fx = fixture().await;
        let owner = add_user(&fx, "owner", "acme").await;
        let colleague = add_user(&fx, "colleague", "acme").await;
        let created = fx
            .service
            .create(&owner, draft("hello", "rust", Visibility::Private, &[]))
            .await
            .unwrap();

        let first = fx
            .service
            .get_by_share_id(Some(&colleague), &created.share_id)
            .await
            .unwrap();
        assert_eq!(first.view_count, 1);
        let second = fx
            .service
            .get_by_share_id(Some(&colleague), &created.share_id)
            .await
            .unwrap();
        assert_eq!(second.view_count, 2);
    }

    #[tokio::test]
    async fn search_filters_by_language_author_and_access() {
        let fx = fixture().await;
        let owner = add_user(&fx, "jdoe", "acme").await;
        let other = add_user(&fx, "msmith", "acme").await;
        let searcher = add_user(&fx, "searcher", "acme").await;

        fx.service
            .create(&owner, draft("py one", "python", Visibility::Organization, &["script"]))
            .await
            .unwrap();
        fx.service
            .create(&owner, draft("rs one", "rust", Visibility::Organization, &[]))
            .await
            .unwrap();
        fx.service
            .create(&other, draft("py two", "python", Visibility::Organization, &[]))
            .await
            .unwrap();
        // Private to the owner, must not appear for the searcher.
        fx.service
            .create(&owner, draft("py secret", "python", Visibility::Private, &[]))
            .await
            .unwrap();

        let filter = SearchFilter {
            language: Some("python".to_string()),
            author: Some("jdoe".to_string()),
            ..Default::default()
        };
        let result = fx
            .service
            .search(&searcher, filter, Page::new(None, None))
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.snippets[0].title, "py one");

        let unknown_author = SearchFilter {
            author: Some("ghost".to_string()),
            ..Default::default()
        };
        let result = fx
            .service
            .search(&searcher, unknown_author, Page::new(None, None))
            .await
            .unwrap();
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn stats_count_languages_and_tags_within_reach() {
        let fx = fixture().await;
        let owner = add_user(&fx, "owner", "acme").await;
        let viewer = add_user(&fx, "viewer", "acme").await;

        fx.service
            .create(&owner, draft("a", "python", Visibility::Organization, &["cli", "tooling"]))
            .await
            .unwrap();
        fx.service
            .create(&owner, draft("b", "python", Visibility::Organization, &["cli"]))
            .await
            .unwrap();
        fx.service
            .create(&owner, draft("c", "rust", Visibility::Private, &["cli"]))
            .await
            .unwrap();

        let stats = fx.service.stats(&viewer).await.unwrap();
        assert_eq!(stats.languages.len(), 1);
        assert_eq!(stats.languages[0].term, "python");
        assert_eq!(stats.languages[0].count, 2);
        assert_eq!(stats.tags[0].term, "cli");
        assert_eq!(stats.tags[0].count, 2);

        // The owner sees their private snippet reflected as well.
        let stats = fx.service.stats(&owner).await.unwrap();
        assert_eq!(stats.languages.len(), 2);
    }

    #[tokio::test]
    async fn pagination_windows_the_result_set() {
        let fx = fixture().await;
        let owner = add_user(&fx, "owner", "acme").await;
        for i in 0..5 {
            fx.service
                .create(&owner, draft(&format!("s{i}"), "rust", Visibility::Private, &[]))
                .await
                .unwrap();
        }
        let page = fx
            .service
            .list_mine(&owner, Page::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.snippets.len(), 2);
        assert_eq!(page.page, 2);
    }
}
