//! Token verification and local credential handling.
//!
//! Two verifier implementations cover the two authentication modes: HS256
//! tokens issued by this instance, and RS256 tokens from an external identity
//! provider verified against its JWKS endpoint.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::identity::User;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Claims>;
}

/// Verifies tokens issued by this instance.
pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<Claims>(token, &self.key, &validation)
            .ok()
            .map(|d| d.claims)
    }
}

/// Verifies RS256 tokens against a JWKS endpoint, caching the key set after
/// the first fetch.
pub struct JwksVerifier {
    jwks_url: String,
    client: reqwest::Client,
    keys: Mutex<Option<Jwks>>,
}

#[derive(Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

impl JwksVerifier {
    pub fn new(jwks_url: String) -> Self {
        Self {
            jwks_url,
            client: reqwest::Client::new(),
            keys: Mutex::new(None),
        }
    }

    async fn fetch_keys(&self) -> reqwest::Result<Jwks> {
        self.client.get(&self.jwks_url).send().await?.json().await
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let header = decode_header(token).ok()?;
        let kid = header.kid?;
        let mut guard = self.keys.lock().await;
        if guard.is_none() {
            if let Ok(jwks) = self.fetch_keys().await {
                *guard = Some(jwks);
            } else {
                return None;
            }
        }
        let jwks = guard.as_ref()?;
        let jwk = jwks.keys.iter().find(|k| k.kid == kid)?;
        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).ok()?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<Claims>(token, &key, &validation)
            .ok()
            .map(|d| d.claims)
    }
}

/// Issues HS256 tokens for locally authenticated users.
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let claims = Claims {
            sub: user.id.to_string(),
            exp: now + self.ttl_secs,
            iat: now,
            email: Some(user.email.clone()),
            name: Some(user.display_name.clone()),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.key)?)
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            email: "jdoe@acme.test".to_string(),
            display_name: "J. Doe".to_string(),
            password_hash: None,
            external_subject: None,
            organization: "acme".to_string(),
            role: Role::User,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn issued_tokens_round_trip() {
        let user = sample_user();
        let issuer = TokenIssuer::new("secret", 3600);
        let token = issuer.issue(&user).unwrap();
        let claims = Hs256Verifier::new("secret").verify(&token).await.unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email.as_deref(), Some("jdoe@acme.test"));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let issuer = TokenIssuer::new("secret", 3600);
        let token = issuer.issue(&sample_user()).unwrap();
        assert!(Hs256Verifier::new("other").verify(&token).await.is_none());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        assert!(!verify_password("not-a-hash", "hunter2"));
    }
}
