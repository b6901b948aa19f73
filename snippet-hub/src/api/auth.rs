//! Registration, login and instance administration endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use snippet_hub_core::auth::{hash_password, verify_password};
use snippet_hub_core::config::AuthMode;
use snippet_hub_core::identity::{Role, User, UserView};

use super::{ApiError, AppState, AuthContext};

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    display_name: Option<String>,
    organization: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    token: String,
    user: UserView,
}

fn validate_username(username: &str) -> Result<&str, ApiError> {
    let username = username.trim();
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::bad_request(
            "username must be between 3 and 32 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ApiError::bad_request(
            "username may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(username)
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let config = state.config.read().await;
    if config.auth_mode != AuthMode::Local {
        return Err(ApiError::forbidden(
            "registration is handled by the external identity provider",
        ));
    }
    if !config.registration_enabled {
        return Err(ApiError::forbidden("registration is disabled"));
    }
    let default_organization = config.default_organization.clone();
    drop(config);

    let username = validate_username(&req.username)?.to_string();
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::bad_request("email is not valid"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }

    let mut identities = state.identities.write().await;
    if identities.find_by_username(&username).is_some() {
        return Err(ApiError::bad_request("username already taken"));
    }
    if identities.find_by_email(&email).is_some() {
        return Err(ApiError::bad_request("email already registered"));
    }

    // The first account on a fresh instance becomes the administrator.
    let role = if identities.is_empty() {
        Role::Admin
    } else {
        Role::User
    };
    let user = User {
        id: Uuid::new_v4(),
        display_name: req.display_name.unwrap_or_else(|| username.clone()),
        username,
        email,
        password_hash: Some(hash_password(&req.password).map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "could not process registration",
            )
        })?),
        external_subject: None,
        organization: req
            .organization
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .unwrap_or(default_organization),
        role,
        active: true,
        created_at: Utc::now(),
    };
    identities
        .insert(user.clone())
        .map_err(|e| ApiError::from(snippet_hub_core::ServiceError::Unavailable(e)))?;
    tracing::info!(username = %user.username, "user registered");

    let token = state
        .issuer
        .issue(&user)
        .map_err(|e| ApiError::from(snippet_hub_core::ServiceError::Unavailable(e)))?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let config = state.config.read().await;
    if config.auth_mode != AuthMode::Local {
        return Err(ApiError::forbidden(
            "local login is disabled; authenticate with the identity provider",
        ));
    }
    drop(config);

    let identities = state.identities.read().await;
    let user = identities
        .find_by_username(req.username.trim())
        .filter(|u| u.active)
        .filter(|u| {
            u.password_hash
                .as_deref()
                .map_or(false, |hash| verify_password(hash, &req.password))
        })
        .cloned()
        .ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "invalid credentials")
        })?;
    drop(identities);

    let token = state
        .issuer
        .issue(&user)
        .map_err(|e| ApiError::from(snippet_hub_core::ServiceError::Unavailable(e)))?;
    Ok(Json(AuthResponse {
        token,
        user: UserView::from(&user),
    }))
}

pub async fn me(auth: AuthContext) -> Json<UserView> {
    Json(UserView::from(&auth.user))
}

/// Configuration projection without the token secret.
#[derive(Serialize)]
pub struct ConfigView {
    auth_mode: AuthMode,
    registration_enabled: bool,
    token_ttl_secs: u64,
    jwks_url: Option<String>,
    default_organization: String,
}

#[derive(Deserialize)]
pub struct ConfigUpdate {
    auth_mode: Option<AuthMode>,
    registration_enabled: Option<bool>,
    token_ttl_secs: Option<u64>,
    jwks_url: Option<String>,
    default_organization: Option<String>,
}

fn require_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.user.role != Role::Admin {
        return Err(ApiError::forbidden("administrator role required"));
    }
    Ok(())
}

pub async fn get_config(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ConfigView>, ApiError> {
    require_admin(&auth)?;
    let config = state.config.read().await;
    Ok(Json(ConfigView {
        auth_mode: config.auth_mode,
        registration_enabled: config.registration_enabled,
        token_ttl_secs: config.token_ttl_secs,
        jwks_url: config.jwks_url.clone(),
        default_organization: config.default_organization.clone(),
    }))
}

pub async fn update_config(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigView>, ApiError> {
    require_admin(&auth)?;
    let mut config = state.config.write().await;
    // The token verifier is wired at startup; an auth_mode change is
    // persisted here and takes effect on the next start.
    if let Some(auth_mode) = update.auth_mode {
        config.auth_mode = auth_mode;
    }
    if let Some(enabled) = update.registration_enabled {
        config.registration_enabled = enabled;
    }
    if let Some(ttl) = update.token_ttl_secs {
        config.token_ttl_secs = ttl;
    }
    if let Some(jwks_url) = update.jwks_url {
        config.jwks_url = if jwks_url.trim().is_empty() {
            None
        } else {
            Some(jwks_url)
        };
    }
    if let Some(org) = update.default_organization {
        config.default_organization = org;
    }
    config
        .save(&state.config_path)
        .map_err(|e| ApiError::from(snippet_hub_core::ServiceError::Unavailable(e)))?;
    tracing::info!(admin = %auth.user.username, "instance configuration updated");
    Ok(Json(ConfigView {
        auth_mode: config.auth_mode,
        registration_enabled: config.registration_enabled,
        token_ttl_secs: config.token_ttl_secs,
        jwks_url: config.jwks_url.clone(),
        default_organization: config.default_organization.clone(),
    }))
}
