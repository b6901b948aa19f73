//! HTTP API layer exposing the snippet, sharing and presence endpoints.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use snippet_hub_core::auth::{Claims, Hs256Verifier, JwksVerifier, TokenIssuer, TokenVerifier};
use snippet_hub_core::config::{AuthMode, InstanceConfig};
use snippet_hub_core::identity::{IdentityStore, Role, User};
use snippet_hub_core::presence::PresenceView;
use snippet_hub_core::services::snippets::{
    OrgStats, Page, SearchFilter, ShareReport, SnippetDetail, SnippetPage, SnippetPatch,
    SnippetService, SnippetView,
};
use snippet_hub_core::sharing::{GrantView, SharePermission};
use snippet_hub_core::storage::snippets::{SnippetDraft, SnippetStore, Visibility};

mod auth;
mod error;

pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub snippets: SnippetService,
    pub identities: Arc<RwLock<IdentityStore>>,
    pub config: Arc<RwLock<InstanceConfig>>,
    pub config_path: PathBuf,
    pub verifier: Arc<dyn TokenVerifier>,
    pub issuer: Arc<TokenIssuer>,
}

impl AppState {
    /// Load configuration and stores from the data directory and wire the
    /// verifier matching the configured auth mode.
    pub fn init(data_dir: &FsPath) -> anyhow::Result<Self> {
        let config_path = data_dir.join("config.json");
        let config = InstanceConfig::load_or_create(&config_path)?;
        let verifier: Arc<dyn TokenVerifier> = match config.auth_mode {
            AuthMode::Local => Arc::new(Hs256Verifier::new(&config.token_secret)),
            AuthMode::External => {
                Arc::new(JwksVerifier::new(config.require_jwks_url()?.to_string()))
            }
        };
        let issuer = Arc::new(TokenIssuer::new(&config.token_secret, config.token_ttl_secs));
        let store = Arc::new(RwLock::new(SnippetStore::new(data_dir.join("snippets"))?));
        let identities = Arc::new(RwLock::new(IdentityStore::new(data_dir.join("users"))?));
        Ok(Self {
            snippets: SnippetService::new(store, identities.clone()),
            identities,
            config: Arc::new(RwLock::new(config)),
            config_path,
            verifier,
            issuer,
        })
    }
}

/// Authenticated requester extracted from the bearer token and resolved
/// against the identity store.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user: User,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_bearer(parts, state)
            .await
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Self { user })
    }
}

/// Optional authentication for the share-link route: a missing or invalid
/// token degrades to an anonymous request instead of rejecting it.
pub struct MaybeAuthContext(pub Option<User>);

impl FromRequestParts<AppState> for MaybeAuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_bearer(parts, state).await))
    }
}

async fn resolve_bearer(parts: &Parts, state: &AppState) -> Option<User> {
    let token = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?;
    let claims = state.verifier.verify(token).await?;
    resolve_identity(state, &claims).await
}

async fn resolve_identity(state: &AppState, claims: &Claims) -> Option<User> {
    {
        let identities = state.identities.read().await;
        if let Ok(id) = Uuid::parse_str(&claims.sub) {
            if let Some(user) = identities.get(id) {
                return user.active.then(|| user.clone());
            }
        }
        if let Some(user) = identities.find_by_external_subject(&claims.sub) {
            return user.active.then(|| user.clone());
        }
    }

    // First sight of an externally issued subject: provision an identity in
    // the default organization.
    let config = state.config.read().await;
    if config.auth_mode != AuthMode::External {
        return None;
    }
    let mut identities = state.identities.write().await;
    if let Some(user) = identities.find_by_external_subject(&claims.sub) {
        return user.active.then(|| user.clone());
    }
    let id = Uuid::new_v4();
    let email = claims
        .email
        .clone()
        .unwrap_or_else(|| format!("{}@external.invalid", claims.sub))
        .to_lowercase();
    let base = email.split('@').next().unwrap_or("user").to_string();
    let username = if identities.find_by_username(&base).is_none() {
        base
    } else {
        format!("{base}-{}", &id.simple().to_string()[..8])
    };
    let user = User {
        id,
        username: username.clone(),
        email,
        display_name: claims.name.clone().unwrap_or(username),
        password_hash: None,
        external_subject: Some(claims.sub.clone()),
        organization: config.default_organization.clone(),
        role: Role::User,
        active: true,
        created_at: Utc::now(),
    };
    if let Err(e) = identities.insert(user.clone()) {
        tracing::error!(subject = %claims.sub, error = %e, "failed to provision external identity");
        return None;
    }
    tracing::info!(username = %user.username, "provisioned external identity");
    Some(user)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/admin/config", get(auth::get_config).put(auth::update_config))
        .route("/snippets", get(list_mine).post(create_snippet))
        .route("/snippets/organization", get(list_organization))
        .route("/snippets/shared", get(list_shared_with_me))
        .route(
            "/snippets/{id}",
            get(get_snippet).put(update_snippet).delete(delete_snippet),
        )
        .route("/snippets/{id}/share", post(share_snippet))
        .route("/snippets/{id}/share/{grant_id}", delete(unshare_snippet))
        .route("/snippets/{id}/sharing", get(sharing_details))
        .route(
            "/snippets/{id}/view",
            post(join_view).delete(leave_view),
        )
        .route("/snippets/{id}/viewers", get(get_viewers))
        .route("/share/{share_id}", get(get_by_share_id))
        .route("/search", get(search_snippets))
        .route("/stats", get(org_stats))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateSnippetRequest {
    title: String,
    content: String,
    language: String,
    description: Option<String>,
    visibility: Option<Visibility>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct ShareRequest {
    #[serde(default)]
    emails: Vec<String>,
    #[serde(default)]
    usernames: Vec<String>,
    permission: Option<SharePermission>,
}

#[derive(Deserialize)]
struct JoinViewRequest {
    session: Option<String>,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    language: Option<String>,
    /// Comma-separated tag list.
    tags: Option<String>,
    author: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

async fn create_snippet(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateSnippetRequest>,
) -> Result<Json<SnippetView>, ApiError> {
    let draft = SnippetDraft {
        title: req.title,
        content: req.content,
        language: req.language,
        description: req.description,
        visibility: req.visibility.unwrap_or(Visibility::Private),
        tags: req.tags,
    };
    let created = state.snippets.create(&auth.user, draft).await?;
    Ok(Json(created))
}

async fn get_snippet(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<SnippetDetail>, ApiError> {
    let detail = state.snippets.get(&auth.user, id).await?;
    Ok(Json(detail))
}

async fn get_by_share_id(
    State(state): State<AppState>,
    MaybeAuthContext(user): MaybeAuthContext,
    Path(share_id): Path<String>,
) -> Result<Json<SnippetView>, ApiError> {
    let snippet = state
        .snippets
        .get_by_share_id(user.as_ref(), &share_id)
        .await?;
    Ok(Json(snippet))
}

async fn update_snippet(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(patch): Json<SnippetPatch>,
) -> Result<Json<SnippetView>, ApiError> {
    let updated = state
        .snippets
        .update(&auth.user, id, patch)
        .await
        .map_err(ApiError::concealed)?;
    Ok(Json(updated))
}

async fn delete_snippet(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .snippets
        .soft_delete(&auth.user, id)
        .await
        .map_err(ApiError::concealed)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn share_snippet(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ShareRequest>,
) -> Result<Json<ShareReport>, ApiError> {
    let report = state
        .snippets
        .share(
            &auth.user,
            id,
            &req.emails,
            &req.usernames,
            req.permission.unwrap_or(SharePermission::View),
        )
        .await
        .map_err(ApiError::concealed)?;
    Ok(Json(report))
}

async fn unshare_snippet(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((id, grant_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .snippets
        .unshare(&auth.user, id, grant_id)
        .await
        .map_err(ApiError::concealed)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sharing_details(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GrantView>>, ApiError> {
    let grants = state
        .snippets
        .sharing_details(&auth.user, id)
        .await
        .map_err(ApiError::concealed)?;
    Ok(Json(grants))
}

async fn join_view(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinViewRequest>,
) -> Result<Json<Vec<PresenceView>>, ApiError> {
    let session = req.session.unwrap_or_default();
    let viewers = state.snippets.join_view(&auth.user, id, &session).await?;
    Ok(Json(viewers))
}

async fn leave_view(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.snippets.leave_view(&auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_viewers(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PresenceView>>, ApiError> {
    let viewers = state
        .snippets
        .viewers(&auth.user, id)
        .await
        .map_err(ApiError::concealed)?;
    Ok(Json(viewers))
}

async fn list_mine(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<SnippetPage>, ApiError> {
    let page = Page::new(query.page, query.limit);
    Ok(Json(state.snippets.list_mine(&auth.user, page).await?))
}

async fn list_organization(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<SnippetPage>, ApiError> {
    let page = Page::new(query.page, query.limit);
    Ok(Json(
        state.snippets.list_organization(&auth.user, page).await?,
    ))
}

async fn list_shared_with_me(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<SnippetPage>, ApiError> {
    let page = Page::new(query.page, query.limit);
    Ok(Json(
        state.snippets.list_shared_with_me(&auth.user, page).await?,
    ))
}

async fn search_snippets(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SnippetPage>, ApiError> {
    let page = Page::new(query.page, query.limit);
    let filter = SearchFilter {
        query: query.q,
        language: query.language,
        tags: query
            .tags
            .map(|t| t.split(',').map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        author: query.author,
    };
    Ok(Json(state.snippets.search(&auth.user, filter, page).await?))
}

async fn org_stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<OrgStats>, ApiError> {
    Ok(Json(state.snippets.stats(&auth.user).await?))
}
