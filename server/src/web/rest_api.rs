use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::auth::token::display_name_from_email;
use crate::db::models::{CommunityRow, CommunitySnippetRow, PrivacyType};
use crate::engine::community_engine::PostDraft;
use crate::engine::validation::{MAX_COMMUNITY_NAME_LENGTH, MIN_COMMUNITY_NAME_LENGTH};
use crate::storage::data_url::decode_data_url;

use super::app_state::AppState;
use super::auth_middleware::{AuthUser, MaybeAuthUser};
use super::error::ApiError;

// ── Current user ────────────────────────────────────────────

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

/// GET /api/me — the signed-in user.
pub async fn get_me(auth: AuthUser) -> impl IntoResponse {
    Json(MeResponse {
        display_name: display_name_from_email(&auth.email),
        user_id: auth.user_id,
        email: auth.email,
    })
}

/// GET /api/me/snippets — the signed-in user's memberships.
pub async fn list_my_snippets(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<CommunitySnippetRow>>, ApiError> {
    let snippets = state.engine.list_my_snippets(&auth.identity()).await?;
    Ok(Json(snippets))
}

// ── Communities ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TopParams {
    pub limit: Option<i64>,
}

/// GET /api/communities/top?limit=N — communities with the most members.
pub async fn list_top_communities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopParams>,
) -> Result<Json<Vec<CommunityRow>>, ApiError> {
    let limit = params.limit.unwrap_or(state.top_communities_limit);
    Ok(Json(state.engine.list_top_by_members(limit).await?))
}

#[derive(Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    #[serde(default)]
    pub privacy_type: PrivacyType,
}

#[derive(Serialize)]
pub struct CreateCommunityResponse {
    pub community: CommunityRow,
    pub snippet: CommunitySnippetRow,
}

/// POST /api/communities — create a community; the creator joins as moderator.
pub async fn create_community(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateCommunityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (community, snippet) = state
        .engine
        .create_community(&body.name, &auth.identity(), body.privacy_type)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateCommunityResponse { community, snippet }),
    ))
}

/// GET /api/communities/:id
pub async fn get_community(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CommunityRow>, ApiError> {
    Ok(Json(state.engine.get_community(&id).await?))
}

/// PUT /api/communities/:id/membership — join.
pub async fn join_community(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CommunitySnippetRow>, ApiError> {
    Ok(Json(state.engine.join(&id, &auth.identity()).await?))
}

/// DELETE /api/communities/:id/membership — leave.
pub async fn leave_community(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.leave(&id, &auth.identity()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct UpdateImageRequest {
    /// `data:image/...;base64,` URL.
    pub image: String,
}

/// PUT /api/communities/:id/image — moderators only.
pub async fn update_community_image(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateImageRequest>,
) -> Result<Json<CommunityRow>, ApiError> {
    let image =
        decode_data_url(&req.image, state.max_image_size).map_err(ApiError::BadRequest)?;
    let community = state
        .engine
        .update_community_image(&auth.identity(), &id, image)
        .await?;
    Ok(Json(community))
}

// ── Posts ───────────────────────────────────────────────────

/// GET /api/communities/:id/posts — newest first.
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.list_posts(&id, viewer.as_ref()).await?))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Optional image as a `data:image/...;base64,` URL.
    pub image: Option<String>,
}

/// POST /api/communities/:id/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let image = req
        .image
        .as_deref()
        .map(|url| decode_data_url(url, state.max_image_size))
        .transpose()
        .map_err(ApiError::BadRequest)?;
    let post = state
        .engine
        .create_post(
            &auth.identity(),
            &id,
            PostDraft {
                title: req.title,
                body: req.body,
            },
            image,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/communities/:id/votes — the signed-in user's votes in a community.
pub async fn list_my_votes(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.list_my_votes(&auth.identity(), &id).await?))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.get_post(&id, viewer.as_ref()).await?))
}

/// DELETE /api/posts/:id — creator only.
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_post(&auth.identity(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub value: i64,
}

/// POST /api/posts/:id/vote — `{"value": 1}` or `{"value": -1}`.
pub async fn vote_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.vote(&auth.identity(), &id, req.value).await?))
}

// ── Limits (public) ─────────────────────────────────────────

/// GET /api/config/limits
pub async fn get_limits(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "max_image_size_mb": state.max_image_size / (1024 * 1024),
        "community_name_min": MIN_COMMUNITY_NAME_LENGTH,
        "community_name_max": MAX_COMMUNITY_NAME_LENGTH,
        "top_communities_limit": state.top_communities_limit,
    }))
}
