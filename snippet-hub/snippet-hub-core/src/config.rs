//! Instance configuration persisted as a single JSON document.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Users register and log in against the local identity store.
    Local,
    /// Tokens are issued by an external identity provider and verified via JWKS.
    External,
}

/// Singleton configuration record. Loaded once at startup and passed through
/// shared state; runtime updates go through [`InstanceConfig::save`] so the
/// on-disk document is the only authoritative copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub auth_mode: AuthMode,
    pub registration_enabled: bool,
    pub token_secret: String,
    pub token_ttl_secs: u64,
    #[serde(default)]
    pub jwks_url: Option<String>,
    pub default_organization: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            auth_mode: AuthMode::Local,
            registration_enabled: true,
            token_secret: generate_secret(),
            token_ttl_secs: 24 * 60 * 60,
            jwks_url: None,
            default_organization: "default".to_string(),
        }
    }
}

impl InstanceConfig {
    /// Load the configuration document, creating one with generated defaults
    /// (including a fresh token secret) on first boot.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let bytes = std::fs::read(path)?;
            let config = serde_json::from_slice(&bytes)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// The JWKS endpoint, required when running in external mode.
    pub fn require_jwks_url(&self) -> Result<&str> {
        self.jwks_url
            .as_deref()
            .ok_or_else(|| anyhow!("auth_mode is external but jwks_url is not set"))
    }
}

fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
