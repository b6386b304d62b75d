use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::config::AuthConfig;
use crate::engine::community_engine::CommunityEngine;

/// Shared state for every HTTP and WebSocket handler.
pub struct AppState {
    pub engine: Arc<CommunityEngine>,
    pub auth_config: AuthConfig,
    /// Directory served under `/media`.
    pub media_dir: PathBuf,
    /// Maximum decoded image size in bytes.
    pub max_image_size: usize,
    pub top_communities_limit: i64,
}
