/// Secret used when none is configured. Fine for local development only.
pub const DEFAULT_JWT_SECRET: &str = "comicraft-dev-secret-change-me";

/// Session token settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_expiry_hours: i64,
    pub public_url: String,
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Local development instances accept requests from any origin.
    pub fn allows_any_origin(&self) -> bool {
        let rest = self
            .public_url
            .split_once("://")
            .map_or(self.public_url.as_str(), |(_, rest)| rest);
        let host = rest.split(['/', ':']).next().unwrap_or_default();
        matches!(host, "localhost" | "127.0.0.1")
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            session_expiry_hours: 720, // 30 days
            public_url: "http://localhost:8080".to_string(),
        }
    }
}
