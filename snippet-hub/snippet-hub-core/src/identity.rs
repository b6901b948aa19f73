//! User records and the on-disk identity store.
//!
//! Users are stored individually on disk and loaded at startup. The rest of
//! the system only reads identities; creation and mutation happen at the auth
//! boundary.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    /// Argon2 hash; absent for users provisioned from an external provider.
    #[serde(default)]
    pub password_hash: Option<String>,
    /// Subject claim of the external identity provider, when provisioned there.
    #[serde(default)]
    pub external_subject: Option<String>,
    pub organization: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time projection safe to return from the API (no credentials).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub organization: String,
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            organization: user.organization.clone(),
            role: user.role,
        }
    }
}

pub struct IdentityStore {
    dir: PathBuf,
    users: HashMap<Uuid, User>,
}

impl IdentityStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let mut users = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            let user: User = serde_json::from_slice(&bytes)
                .map_err(|e| anyhow!("corrupt user record {}: {e}", path.display()))?;
            users.insert(user.id, user);
        }
        Ok(Self { dir, users })
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Persist and index a new or updated user record.
    pub fn insert(&mut self, user: User) -> Result<()> {
        std::fs::write(self.path(user.id), serde_json::to_vec_pretty(&user)?)?;
        self.users.insert(user.id, user);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn find_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim().to_lowercase();
        self.users.values().find(|u| u.email == email)
    }

    pub fn find_by_external_subject(&self, subject: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.external_subject.as_deref() == Some(subject))
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(username: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            display_name: username.to_string(),
            password_hash: None,
            external_subject: None,
            organization: "acme".to_string(),
            role: Role::User,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn persists_and_reloads_users() {
        let dir = tempfile::tempdir().unwrap();
        let user = sample_user("jdoe", "jdoe@acme.test");
        let id = user.id;
        {
            let mut store = IdentityStore::new(dir.path()).unwrap();
            store.insert(user).unwrap();
        }
        let store = IdentityStore::new(dir.path()).unwrap();
        let loaded = store.get(id).unwrap();
        assert_eq!(loaded.username, "jdoe");
        assert!(store.find_by_email("JDoe@acme.test").is_some());
        assert!(store.find_by_username("nobody").is_none());
    }
}
