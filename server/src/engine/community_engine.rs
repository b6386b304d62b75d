use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::EngineError;
use super::state::UserIdentity;
use super::validation;
use crate::auth::token::display_name_from_email;
use crate::db::models::{
    CommunityRow, CommunitySnippetRow, NewPost, PostRow, PostVoteRow, PrivacyType, VoteOutcome,
};
use crate::db::queries::snippets::{JoinOutcome, LeaveOutcome};
use crate::db::queries::{communities, posts, snippets, votes};
use crate::storage::{ImageData, ImageStore, community_image_path, post_image_path};

/// Default number of communities in the "top communities" list.
pub const DEFAULT_TOP_COMMUNITIES: i64 = 5;

/// Upper bound for any list request.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Posts returned per community listing.
pub const POSTS_PAGE_SIZE: i64 = 100;

/// Title and body of a post being submitted.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
}

/// The service behind every community, membership, post and vote operation.
/// Protocol-agnostic: both the REST handlers and WebSocket sessions call into this.
pub struct CommunityEngine {
    db: SqlitePool,
    images: Arc<dyn ImageStore>,
    max_image_bytes: usize,
}

impl CommunityEngine {
    pub fn new(db: SqlitePool, images: Arc<dyn ImageStore>, max_image_bytes: usize) -> Self {
        Self {
            db,
            images,
            max_image_bytes,
        }
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    // ── Membership ──────────────────────────────────────────────────

    /// Join a community. The snippet and the member count change together or not at all.
    pub async fn join(
        &self,
        community_id: &str,
        user: &UserIdentity,
    ) -> Result<CommunitySnippetRow, EngineError> {
        let outcome = snippets::join_community(&self.db, community_id, &user.user_id)
            .await
            .inspect_err(|e| error!(error = %e, %community_id, "joinCommunity failed"))?;

        match outcome {
            JoinOutcome::Joined(snippet) => {
                info!(%community_id, user_id = %user.user_id, "user joined community");
                Ok(snippet)
            }
            JoinOutcome::AlreadyMember => Err(EngineError::Conflict(format!(
                "You are already a member of c/{community_id}"
            ))),
            JoinOutcome::CommunityNotFound => Err(community_not_found(community_id)),
        }
    }

    /// Leave a community. The snippet and the member count change together or not at all.
    pub async fn leave(&self, community_id: &str, user: &UserIdentity) -> Result<(), EngineError> {
        let outcome = snippets::leave_community(&self.db, community_id, &user.user_id)
            .await
            .inspect_err(|e| error!(error = %e, %community_id, "leaveCommunity failed"))?;

        match outcome {
            LeaveOutcome::Left => {
                info!(%community_id, user_id = %user.user_id, "user left community");
                Ok(())
            }
            LeaveOutcome::NotMember => Err(EngineError::NotFound(format!(
                "You are not a member of c/{community_id}"
            ))),
        }
    }

    /// All of a user's membership snippets.
    pub async fn list_my_snippets(
        &self,
        user: &UserIdentity,
    ) -> Result<Vec<CommunitySnippetRow>, EngineError> {
        snippets::list_snippets_for_user(&self.db, &user.user_id)
            .await
            .inspect_err(|e| error!(error = %e, "listing snippets failed"))
            .map_err(Into::into)
    }

    // ── Registry ────────────────────────────────────────────────────

    /// Create a community owned by `creator`, who becomes its first member and moderator.
    pub async fn create_community(
        &self,
        name: &str,
        creator: &UserIdentity,
        privacy_type: PrivacyType,
    ) -> Result<(CommunityRow, CommunitySnippetRow), EngineError> {
        validation::validate_community_name(name).map_err(EngineError::Validation)?;

        let created =
            communities::create_community(&self.db, name, &creator.user_id, privacy_type)
                .await
                .inspect_err(|e| error!(error = %e, community_id = %name, "createCommunity failed"))?;
        if !created {
            return Err(EngineError::Conflict(format!(
                "Sorry, c/{name} already exists. Please choose a different name."
            )));
        }

        info!(community_id = %name, creator_id = %creator.user_id, %privacy_type, "community created");

        let community = self.get_community(name).await?;
        let snippet = snippets::get_snippet(&self.db, &creator.user_id, name)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Membership in c/{name} not found")))?;
        Ok((community, snippet))
    }

    pub async fn get_community(&self, community_id: &str) -> Result<CommunityRow, EngineError> {
        communities::get_community(&self.db, community_id)
            .await
            .inspect_err(|e| error!(error = %e, %community_id, "getCommunity failed"))?
            .ok_or_else(|| community_not_found(community_id))
    }

    /// Communities ordered by member count, largest first. `limit` is clamped to 1..=100.
    pub async fn list_top_by_members(&self, limit: i64) -> Result<Vec<CommunityRow>, EngineError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        communities::list_top_by_members(&self.db, limit)
            .await
            .inspect_err(|e| error!(error = %e, "listing top communities failed"))
            .map_err(Into::into)
    }

    /// Replace a community's image. Only its moderators may do this.
    pub async fn update_community_image(
        &self,
        user: &UserIdentity,
        community_id: &str,
        image: ImageData,
    ) -> Result<CommunityRow, EngineError> {
        if image.bytes.len() > self.max_image_bytes {
            return Err(image_too_large(self.max_image_bytes));
        }
        let community = self.get_community(community_id).await?;
        let is_moderator = snippets::get_snippet(&self.db, &user.user_id, community_id)
            .await?
            .is_some_and(|s| s.is_moderator);
        if !is_moderator {
            return Err(EngineError::Forbidden(format!(
                "Only moderators can change the image of c/{community_id}"
            )));
        }

        let path = community_image_path(community_id, &image.content_type);
        let url = self.images.put(&path, &image).await?;
        if !communities::set_community_image(&self.db, community_id, &url)
            .await
            .inspect_err(|e| error!(error = %e, %community_id, "community image update failed"))?
        {
            return Err(community_not_found(community_id));
        }

        // A different format lands at a different path; drop the old file.
        if let Some(old_path) = community
            .image_url
            .as_deref()
            .and_then(|old| self.images.path_for_url(old))
            .filter(|old_path| *old_path != path)
            && let Err(e) = self.images.delete(&old_path).await
        {
            warn!(error = %e, %community_id, "previous community image could not be removed");
        }

        info!(%community_id, "community image updated");
        self.get_community(community_id).await
    }

    // ── Posts ───────────────────────────────────────────────────────

    /// Submit a post, optionally with an image.
    ///
    /// The image is uploaded first under a path derived from a fresh post ID,
    /// then the row is inserted with its URL in a single statement. A post
    /// therefore never exists without its image, even if the caller is
    /// cancelled partway through.
    pub async fn create_post(
        &self,
        user: &UserIdentity,
        community_id: &str,
        draft: PostDraft,
        image: Option<ImageData>,
    ) -> Result<PostRow, EngineError> {
        validation::validate_post_title(&draft.title).map_err(EngineError::Validation)?;
        validation::validate_post_body(&draft.body).map_err(EngineError::Validation)?;
        if let Some(image) = &image
            && image.bytes.len() > self.max_image_bytes
        {
            return Err(image_too_large(self.max_image_bytes));
        }

        let community = self.get_community(community_id).await?;
        if community.privacy_type.posting_requires_membership()
            && !snippets::is_member(&self.db, &user.user_id, community_id).await?
        {
            return Err(EngineError::Forbidden(format!(
                "Only members can post in c/{community_id}"
            )));
        }

        let post_id = Uuid::new_v4().to_string();
        let stored = match &image {
            Some(image) => {
                let path = post_image_path(&post_id, &image.content_type);
                match self.images.put(&path, image).await {
                    Ok(url) => Some((path, url)),
                    Err(e) => {
                        error!(error = %e, %post_id, "post image upload failed");
                        return Err(EngineError::PartialFailure(
                            "The image could not be uploaded, so the post was not created. Please try again."
                                .into(),
                        ));
                    }
                }
            }
            None => None,
        };

        let display_name = display_name_from_email(&user.email);
        let inserted = posts::insert_post(
            &self.db,
            &NewPost {
                id: &post_id,
                community_id,
                creator_id: &user.user_id,
                creator_display_name: &display_name,
                title: draft.title.trim(),
                body: &draft.body,
                community_image_url: community.image_url.as_deref(),
                image_url: stored.as_ref().map(|(_, url)| url.as_str()),
            },
        )
        .await;
        if let Err(e) = inserted {
            error!(error = %e, %community_id, "post insert failed");
            if let Some((path, _)) = &stored
                && let Err(e) = self.images.delete(path).await
            {
                warn!(error = %e, %post_id, "failed to remove image of unsaved post");
            }
            return Err(e.into());
        }

        info!(%post_id, %community_id, creator_id = %user.user_id, "post created");
        posts::get_post(&self.db, &post_id)
            .await?
            .ok_or_else(|| post_not_found(&post_id))
    }

    /// Get a post. Posts in private communities are only visible to members.
    pub async fn get_post(
        &self,
        post_id: &str,
        viewer: Option<&UserIdentity>,
    ) -> Result<PostRow, EngineError> {
        let post = posts::get_post(&self.db, post_id)
            .await
            .inspect_err(|e| error!(error = %e, %post_id, "getPost failed"))?
            .ok_or_else(|| post_not_found(post_id))?;
        self.ensure_can_view(&post.community_id, viewer).await?;
        Ok(post)
    }

    /// List a community's posts, newest first.
    pub async fn list_posts(
        &self,
        community_id: &str,
        viewer: Option<&UserIdentity>,
    ) -> Result<Vec<PostRow>, EngineError> {
        self.ensure_can_view(community_id, viewer).await?;
        posts::list_posts_for_community(&self.db, community_id, POSTS_PAGE_SIZE)
            .await
            .inspect_err(|e| error!(error = %e, %community_id, "getPosts failed"))
            .map_err(Into::into)
    }

    /// Delete a post. Only its creator may do this. Returns true on success.
    pub async fn delete_post(&self, user: &UserIdentity, post_id: &str) -> Result<bool, EngineError> {
        let post = posts::get_post(&self.db, post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))?;
        if post.creator_id != user.user_id {
            warn!(%post_id, user_id = %user.user_id, "refused to delete another user's post");
            return Err(EngineError::Forbidden(
                "Only the creator can delete this post".into(),
            ));
        }

        if !posts::delete_post(&self.db, post_id, &user.user_id)
            .await
            .inspect_err(|e| error!(error = %e, %post_id, "post delete failed"))?
        {
            return Err(post_not_found(post_id));
        }

        if let Some(path) = post
            .image_url
            .as_deref()
            .and_then(|url| self.images.path_for_url(url))
            && let Err(e) = self.images.delete(&path).await
        {
            warn!(error = %e, %post_id, "post deleted but its image could not be removed");
        }

        info!(%post_id, "post deleted");
        Ok(true)
    }

    // ── Votes ───────────────────────────────────────────────────────

    /// Vote on a post: a new vote counts, repeating a vote withdraws it,
    /// and the opposite vote flips it.
    pub async fn vote(
        &self,
        user: &UserIdentity,
        post_id: &str,
        value: i64,
    ) -> Result<VoteOutcome, EngineError> {
        validation::validate_vote_value(value).map_err(EngineError::Validation)?;

        let post = self.get_post(post_id, Some(user)).await?;
        let vote_id = Uuid::new_v4().to_string();
        votes::apply_vote(&self.db, &vote_id, &user.user_id, &post.id, value)
            .await
            .inspect_err(|e| error!(error = %e, %post_id, "vote failed"))?
            .ok_or_else(|| post_not_found(post_id))
    }

    /// The user's votes on posts in one community.
    pub async fn list_my_votes(
        &self,
        user: &UserIdentity,
        community_id: &str,
    ) -> Result<Vec<PostVoteRow>, EngineError> {
        votes::list_votes_for_user_in_community(&self.db, &user.user_id, community_id)
            .await
            .inspect_err(|e| error!(error = %e, %community_id, "listing votes failed"))
            .map_err(Into::into)
    }

    async fn ensure_can_view(
        &self,
        community_id: &str,
        viewer: Option<&UserIdentity>,
    ) -> Result<(), EngineError> {
        let community = self.get_community(community_id).await?;
        if !community.privacy_type.viewing_requires_membership() {
            return Ok(());
        }
        let is_member = match viewer {
            Some(user) => snippets::is_member(&self.db, &user.user_id, community_id).await?,
            None => false,
        };
        if is_member {
            Ok(())
        } else {
            Err(EngineError::Forbidden(format!(
                "c/{community_id} is private. Only members can view it."
            )))
        }
    }
}

fn community_not_found(community_id: &str) -> EngineError {
    EngineError::NotFound(format!("Community c/{community_id} not found"))
}

fn image_too_large(max_bytes: usize) -> EngineError {
    EngineError::Validation(format!("Image too large (max {max_bytes} bytes)"))
}

fn post_not_found(post_id: &str) -> EngineError {
    EngineError::NotFound(format!("Post {post_id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::{create_pool, run_migrations};
    use crate::storage::StorageError;
    use crate::storage::local::LocalImageStore;
    use async_trait::async_trait;

    async fn setup_engine() -> (CommunityEngine, SqlitePool, tempfile::TempDir) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let images = Arc::new(LocalImageStore::new(dir.path(), "http://localhost:8080"));
        let engine = CommunityEngine::new(pool.clone(), images, 1024 * 1024);
        (engine, pool, dir)
    }

    fn user(id: &str) -> UserIdentity {
        UserIdentity {
            user_id: id.to_string(),
            email: format!("{id}@example.com"),
        }
    }

    fn draft(title: &str) -> PostDraft {
        PostDraft {
            title: title.to_string(),
            body: "hello world".to_string(),
        }
    }

    fn png() -> ImageData {
        ImageData {
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3, 4],
        }
    }

    /// Image store whose uploads always fail.
    struct BrokenImageStore;

    #[async_trait]
    impl ImageStore for BrokenImageStore {
        async fn put(&self, _path: &str, _image: &ImageData) -> Result<String, StorageError> {
            Err(StorageError::Io(std::io::Error::other("bucket unavailable")))
        }

        async fn delete(&self, _path: &str) -> Result<(), StorageError> {
            Ok(())
        }

        fn path_for_url(&self, _url: &str) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn test_create_community_validates_before_writing() {
        let (engine, pool, _dir) = setup_engine().await;

        let err = engine
            .create_community("no spaces", &user("alice"), PrivacyType::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM communities")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_create_community_conflict_message() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();

        let err = engine
            .create_community("test1", &user("bob"), PrivacyType::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(
            err.to_string(),
            "Sorry, c/test1 already exists. Please choose a different name."
        );
    }

    #[tokio::test]
    async fn test_join_conflict_and_leave_not_member() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();

        let err = engine.join("test1", &user("alice")).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let err = engine.leave("test1", &user("bob")).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let err = engine.join("missing", &user("bob")).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_post_without_image() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();

        let post = engine
            .create_post(&user("bob"), "test1", draft("  First!  "), None)
            .await
            .unwrap();
        assert_eq!(post.title, "First!");
        assert_eq!(post.creator_display_name, "bob");
        assert_eq!(post.creator_id, "bob");
        assert!(post.image_url.is_none());

        let fetched = engine.get_post(&post.id, None).await.unwrap();
        assert_eq!(fetched, post);
    }

    #[tokio::test]
    async fn test_create_post_with_image_stores_file() {
        let (engine, _pool, dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();

        let post = engine
            .create_post(&user("alice"), "test1", draft("pic"), Some(png()))
            .await
            .unwrap();
        let expected = format!("http://localhost:8080/media/posts/{}/image.png", post.id);
        assert_eq!(post.image_url.as_deref(), Some(expected.as_str()));
        assert!(
            dir.path()
                .join(format!("posts/{}/image.png", post.id))
                .exists()
        );
    }

    #[tokio::test]
    async fn test_failed_image_upload_discards_post() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let engine = CommunityEngine::new(pool.clone(), Arc::new(BrokenImageStore), 1024);
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();

        let err = engine
            .create_post(&user("alice"), "test1", draft("pic"), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PartialFailure(_)));

        let posts = engine.list_posts("test1", None).await.unwrap();
        assert!(posts.is_empty(), "no image-less post should survive");
    }

    /// Image store whose uploads never finish in time.
    struct StalledImageStore;

    #[async_trait]
    impl ImageStore for StalledImageStore {
        async fn put(&self, path: &str, _image: &ImageData) -> Result<String, StorageError> {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(format!("http://localhost:8080/media/{path}"))
        }

        async fn delete(&self, _path: &str) -> Result<(), StorageError> {
            Ok(())
        }

        fn path_for_url(&self, _url: &str) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn test_cancelled_create_post_leaves_no_post() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let engine = CommunityEngine::new(pool.clone(), Arc::new(StalledImageStore), 1024);
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();

        // Dropping the future mid-upload is what a closed WebSocket does.
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            engine.create_post(&user("alice"), "test1", draft("pic"), Some(png())),
        )
        .await;
        assert!(result.is_err(), "upload should still be pending");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_oversized_image_rejected_up_front() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();

        let big = ImageData {
            content_type: "image/png".into(),
            bytes: vec![0; 1024 * 1024 + 1],
        };
        let err = engine
            .create_post(&user("alice"), "test1", draft("pic"), Some(big))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_restricted_community_posting_requires_membership() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("club", &user("alice"), PrivacyType::Restricted)
            .await
            .unwrap();

        let err = engine
            .create_post(&user("bob"), "club", draft("hi"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        // Still viewable by anyone.
        assert!(engine.list_posts("club", None).await.unwrap().is_empty());

        engine.join("club", &user("bob")).await.unwrap();
        engine
            .create_post(&user("bob"), "club", draft("hi"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_private_community_hidden_from_non_members() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("secret", &user("alice"), PrivacyType::Private)
            .await
            .unwrap();
        let post = engine
            .create_post(&user("alice"), "secret", draft("hidden"), None)
            .await
            .unwrap();

        assert!(matches!(
            engine.list_posts("secret", None).await,
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            engine.get_post(&post.id, Some(&user("bob"))).await,
            Err(EngineError::Forbidden(_))
        ));
        assert_eq!(
            engine
                .list_posts("secret", Some(&user("alice")))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_post_refused_for_non_creator() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();
        let post = engine
            .create_post(&user("alice"), "test1", draft("mine"), None)
            .await
            .unwrap();

        let err = engine.delete_post(&user("bob"), &post.id).await.unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert!(engine.get_post(&post.id, None).await.is_ok());

        assert!(engine.delete_post(&user("alice"), &post.id).await.unwrap());
        assert!(matches!(
            engine.get_post(&post.id, None).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_post_removes_image() {
        let (engine, _pool, dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();
        let post = engine
            .create_post(&user("alice"), "test1", draft("pic"), Some(png()))
            .await
            .unwrap();
        let file = dir.path().join(format!("posts/{}/image.png", post.id));
        assert!(file.exists());

        engine.delete_post(&user("alice"), &post.id).await.unwrap();
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_vote_rules() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();
        let post = engine
            .create_post(&user("alice"), "test1", draft("vote"), None)
            .await
            .unwrap();

        let up = engine.vote(&user("bob"), &post.id, 1).await.unwrap();
        assert_eq!(up.vote_status, 1);
        let down = engine.vote(&user("bob"), &post.id, -1).await.unwrap();
        assert_eq!(down.vote_status, -1);
        let cleared = engine.vote(&user("bob"), &post.id, -1).await.unwrap();
        assert_eq!(cleared.vote_status, 0);
        assert!(cleared.vote.is_none());

        assert!(matches!(
            engine.vote(&user("bob"), &post.id, 5).await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            engine.vote(&user("bob"), "missing", 1).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_community_image_moderator_only() {
        let (engine, _pool, dir) = setup_engine().await;
        engine
            .create_community("art", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();
        engine.join("art", &user("bob")).await.unwrap();

        let err = engine
            .update_community_image(&user("bob"), "art", png())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        let err = engine
            .update_community_image(&user("bob"), "missing", png())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let community = engine
            .update_community_image(&user("alice"), "art", png())
            .await
            .unwrap();
        assert_eq!(
            community.image_url.as_deref(),
            Some("http://localhost:8080/media/communities/art/image.png")
        );
        assert!(dir.path().join("communities/art/image.png").exists());

        // Switching format removes the old file.
        let jpeg = ImageData {
            content_type: "image/jpeg".into(),
            bytes: vec![5, 6, 7],
        };
        let community = engine
            .update_community_image(&user("alice"), "art", jpeg)
            .await
            .unwrap();
        assert_eq!(
            community.image_url.as_deref(),
            Some("http://localhost:8080/media/communities/art/image.jpg")
        );
        assert!(dir.path().join("communities/art/image.jpg").exists());
        assert!(!dir.path().join("communities/art/image.png").exists());

        // New posts pick up the community image.
        let post = engine
            .create_post(&user("bob"), "art", draft("hi"), None)
            .await
            .unwrap();
        assert_eq!(post.community_image_url, community.image_url);
    }

    #[tokio::test]
    async fn test_top_limit_is_clamped() {
        let (engine, _pool, _dir) = setup_engine().await;
        engine
            .create_community("test1", &user("alice"), PrivacyType::Public)
            .await
            .unwrap();
        assert_eq!(engine.list_top_by_members(0).await.unwrap().len(), 1);
        assert_eq!(engine.list_top_by_members(10_000).await.unwrap().len(), 1);
    }
}
