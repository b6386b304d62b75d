use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::auth::config::{AuthConfig, DEFAULT_JWT_SECRET};
use crate::engine::community_engine::DEFAULT_TOP_COMMUNITIES;

/// Top-level server configuration, loaded from comicraft.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub auth: AuthSection,
    pub storage: StorageSection,
    pub community: CommunitySection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub web_address: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            web_address: "0.0.0.0:8080".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite:comicraft.db?mode=rwc".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: String,
    pub session_expiry_hours: i64,
    pub public_url: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.into(),
            session_expiry_hours: 720,
            public_url: "http://localhost:8080".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory uploaded images are written to and served from.
    pub media_dir: PathBuf,
    pub max_image_size_mb: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            max_image_size_mb: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommunitySection {
    /// How many communities the "top communities" list shows by default.
    pub top_communities_limit: i64,
}

impl Default for CommunitySection {
    fn default() -> Self {
        Self {
            top_communities_limit: DEFAULT_TOP_COMMUNITIES,
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse config file {path}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply overrides from `var` (the process environment in production).
    /// Unparseable numbers are ignored.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("WEB_ADDRESS") {
            self.server.web_address = v;
        }
        if let Some(v) = var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = var("JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(hours) = var("SESSION_EXPIRY_HOURS").and_then(|v| v.parse().ok()) {
            self.auth.session_expiry_hours = hours;
        }
        if let Some(v) = var("PUBLIC_URL") {
            self.auth.public_url = v;
        }
        if let Some(v) = var("MEDIA_DIR") {
            self.storage.media_dir = PathBuf::from(v);
        }
        if let Some(mb) = var("MAX_IMAGE_SIZE_MB").and_then(|v| v.parse().ok()) {
            self.storage.max_image_size_mb = mb;
        }
        if let Some(limit) = var("TOP_COMMUNITIES_LIMIT").and_then(|v| v.parse().ok()) {
            self.community.top_communities_limit = limit;
        }
    }

    /// Convert into an AuthConfig for the auth layer.
    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: self.auth.jwt_secret.clone(),
            session_expiry_hours: self.auth.session_expiry_hours,
            public_url: self.auth.public_url.clone(),
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        (self.storage.max_image_size_mb as usize).saturating_mul(1024 * 1024)
    }
}
