use std::sync::Arc;

use tracing::{debug, warn};

use super::commands::{Command, StatePatch};
use super::community_engine::{CommunityEngine, PostDraft};
use super::error::EngineError;
use super::state::{ClientState, UserIdentity};
use super::store::Store;
use crate::storage::data_url::decode_data_url;

/// One connected client: its state store plus the engine its commands run against.
///
/// Every command follows the same path: `Pending` is committed, the effect
/// runs, its patches (or an `Error`) are committed, then `Settled`. State is
/// never written from anywhere else.
pub struct ClientSession {
    engine: Arc<CommunityEngine>,
    store: Store,
}

impl ClientSession {
    pub fn new(engine: Arc<CommunityEngine>, identity: Option<UserIdentity>) -> Self {
        Self {
            engine,
            store: Store::new(ClientState::for_user(identity)),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.store.read(|state| state.user.clone())
    }

    /// Run a command to completion and return every patch it committed.
    pub async fn dispatch(&self, command: Command) -> Vec<StatePatch> {
        let user = self.user();
        if command.requires_user() && user.is_none() {
            debug!(?command, "command needs a signed-in user");
            let patches = vec![StatePatch::AuthRequired];
            self.store.commit(&patches);
            return patches;
        }

        self.store.commit(&[StatePatch::Pending]);
        let mut patches = match self.run(command, user.as_ref()).await {
            Ok(patches) => patches,
            Err(e) => {
                warn!(error = %e, "command failed");
                vec![StatePatch::Error {
                    message: e.user_message(),
                }]
            }
        };
        patches.push(StatePatch::Settled);
        self.store.commit(&patches);

        patches.insert(0, StatePatch::Pending);
        patches
    }

    async fn run(
        &self,
        command: Command,
        user: Option<&UserIdentity>,
    ) -> Result<Vec<StatePatch>, EngineError> {
        let engine = &self.engine;
        match command {
            Command::FetchMySnippets => {
                let snippets = match user {
                    Some(user) => engine.list_my_snippets(user).await?,
                    None => Vec::new(),
                };
                Ok(vec![StatePatch::SnippetsLoaded { snippets }])
            }

            Command::FetchCommunity { community_id } => {
                let community = engine.get_community(&community_id).await?;
                Ok(vec![StatePatch::CurrentCommunitySet { community }])
            }

            Command::JoinOrLeave {
                community_id,
                is_joined,
            } => {
                let user = signed_in(user)?;
                if is_joined {
                    engine.leave(&community_id, user).await?;
                    Ok(vec![
                        StatePatch::SnippetRemoved {
                            community_id: community_id.clone(),
                        },
                        StatePatch::MemberCountAdjusted {
                            community_id,
                            delta: -1,
                        },
                    ])
                } else {
                    let snippet = engine.join(&community_id, user).await?;
                    Ok(vec![
                        StatePatch::SnippetAdded { snippet },
                        StatePatch::MemberCountAdjusted {
                            community_id,
                            delta: 1,
                        },
                    ])
                }
            }

            Command::CreateCommunity { name, privacy_type } => {
                let user = signed_in(user)?;
                let (community, snippet) =
                    engine.create_community(&name, user, privacy_type).await?;
                Ok(vec![
                    StatePatch::SnippetAdded { snippet },
                    StatePatch::CurrentCommunitySet { community },
                ])
            }

            Command::FetchPosts { community_id } => {
                let posts = engine.list_posts(&community_id, user).await?;
                let mut patches = vec![StatePatch::PostsLoaded { posts }];
                if let Some(user) = user {
                    let votes = engine.list_my_votes(user, &community_id).await?;
                    patches.push(StatePatch::VotesLoaded { votes });
                }
                Ok(patches)
            }

            Command::CreatePost {
                community_id,
                title,
                body,
                image,
            } => {
                let user = signed_in(user)?;
                let image = image
                    .as_deref()
                    .map(|url| decode_data_url(url, engine.max_image_bytes()))
                    .transpose()
                    .map_err(EngineError::Validation)?;
                let post = engine
                    .create_post(user, &community_id, PostDraft { title, body }, image)
                    .await?;
                Ok(vec![StatePatch::PostAdded { post }])
            }

            Command::Vote { post_id, value } => {
                let user = signed_in(user)?;
                let outcome = engine.vote(user, &post_id, value).await?;
                let vote_patch = match outcome.vote {
                    Some(vote) => StatePatch::VoteRecorded { vote },
                    None => StatePatch::VoteRemoved {
                        post_id: post_id.clone(),
                    },
                };
                Ok(vec![
                    StatePatch::PostTallyChanged {
                        post_id,
                        vote_status: outcome.vote_status,
                    },
                    vote_patch,
                ])
            }

            Command::DeletePost { post_id } => {
                let user = signed_in(user)?;
                engine.delete_post(user, &post_id).await?;
                Ok(vec![StatePatch::PostRemoved { post_id }])
            }

            Command::SelectPost { post_id } => {
                let cached = self.store.read(|state| {
                    state.posts.posts.iter().find(|p| p.id == post_id).cloned()
                });
                let post = match cached {
                    Some(post) => post,
                    None => engine.get_post(&post_id, user).await?,
                };
                Ok(vec![StatePatch::PostSelected { post }])
            }

            Command::SignOut => Ok(vec![StatePatch::SignedOut]),
        }
    }
}

fn signed_in(user: Option<&UserIdentity>) -> Result<&UserIdentity, EngineError> {
    user.ok_or_else(|| EngineError::Forbidden("Please sign in first".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PrivacyType;
    use crate::db::pool::{create_pool, run_migrations};
    use crate::storage::local::LocalImageStore;

    async fn setup_engine() -> (Arc<CommunityEngine>, tempfile::TempDir) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let images = Arc::new(LocalImageStore::new(dir.path(), "http://localhost:8080"));
        (
            Arc::new(CommunityEngine::new(pool, images, 1024 * 1024)),
            dir,
        )
    }

    fn user(id: &str) -> UserIdentity {
        UserIdentity {
            user_id: id.to_string(),
            email: format!("{id}@example.com"),
        }
    }

    #[tokio::test]
    async fn test_anonymous_write_prompts_for_auth() {
        let (engine, _dir) = setup_engine().await;
        let session = ClientSession::new(engine, None);

        let patches = session
            .dispatch(Command::JoinOrLeave {
                community_id: "test1".into(),
                is_joined: false,
            })
            .await;
        assert_eq!(patches, vec![StatePatch::AuthRequired]);

        let state = session.store().snapshot();
        assert!(state.auth_prompt);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_anonymous_snippets_are_empty() {
        let (engine, _dir) = setup_engine().await;
        let session = ClientSession::new(engine, None);

        session.dispatch(Command::FetchMySnippets).await;
        let state = session.store().snapshot();
        assert!(state.community.snippets_fetched);
        assert!(state.community.my_snippets.is_empty());
    }

    #[tokio::test]
    async fn test_create_join_leave_updates_state() {
        let (engine, _dir) = setup_engine().await;
        let alice = ClientSession::new(engine.clone(), Some(user("alice")));
        let bob = ClientSession::new(engine.clone(), Some(user("bob")));

        alice
            .dispatch(Command::CreateCommunity {
                name: "test1".into(),
                privacy_type: PrivacyType::Public,
            })
            .await;
        let state = alice.store().snapshot();
        assert!(state.is_member_of("test1"));
        assert!(state.community.my_snippets[0].is_moderator);
        assert_eq!(
            state.community.current_community.as_ref().unwrap().id,
            "test1"
        );

        bob.dispatch(Command::FetchCommunity {
            community_id: "test1".into(),
        })
        .await;
        bob.dispatch(Command::JoinOrLeave {
            community_id: "test1".into(),
            is_joined: false,
        })
        .await;
        let state = bob.store().snapshot();
        assert!(state.is_member_of("test1"));
        assert_eq!(
            state.community.current_community.as_ref().unwrap().number_of_members,
            2
        );
        assert_eq!(engine.get_community("test1").await.unwrap().number_of_members, 2);

        bob.dispatch(Command::JoinOrLeave {
            community_id: "test1".into(),
            is_joined: true,
        })
        .await;
        let state = bob.store().snapshot();
        assert!(!state.is_member_of("test1"));
        assert_eq!(
            state.community.current_community.as_ref().unwrap().number_of_members,
            1
        );
    }

    #[tokio::test]
    async fn test_failed_command_sets_error_and_settles() {
        let (engine, _dir) = setup_engine().await;
        let session = ClientSession::new(engine, Some(user("alice")));

        let patches = session
            .dispatch(Command::CreateCommunity {
                name: "x".into(),
                privacy_type: PrivacyType::Public,
            })
            .await;
        assert_eq!(patches.first(), Some(&StatePatch::Pending));
        assert_eq!(patches.last(), Some(&StatePatch::Settled));

        let state = session.store().snapshot();
        assert!(!state.loading);
        assert!(
            state
                .error
                .as_deref()
                .unwrap()
                .starts_with("Community name should be")
        );

        // The next command clears the error.
        session.dispatch(Command::FetchMySnippets).await;
        assert!(session.store().snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_post_and_vote_flow() {
        let (engine, _dir) = setup_engine().await;
        let session = ClientSession::new(engine, Some(user("alice")));
        session
            .dispatch(Command::CreateCommunity {
                name: "test1".into(),
                privacy_type: PrivacyType::Public,
            })
            .await;

        session
            .dispatch(Command::CreatePost {
                community_id: "test1".into(),
                title: "hello".into(),
                body: "first post".into(),
                image: None,
            })
            .await;
        let post_id = session.store().snapshot().posts.posts[0].id.clone();

        session
            .dispatch(Command::SelectPost {
                post_id: post_id.clone(),
            })
            .await;
        session
            .dispatch(Command::Vote {
                post_id: post_id.clone(),
                value: 1,
            })
            .await;
        let state = session.store().snapshot();
        assert_eq!(state.vote_on(&post_id), Some(1));
        assert_eq!(state.posts.posts[0].vote_status, 1);
        assert_eq!(state.posts.selected_post.as_ref().unwrap().vote_status, 1);

        session
            .dispatch(Command::Vote {
                post_id: post_id.clone(),
                value: 1,
            })
            .await;
        let state = session.store().snapshot();
        assert_eq!(state.vote_on(&post_id), None);
        assert_eq!(state.posts.posts[0].vote_status, 0);

        // A fresh fetch sees the same data.
        session
            .dispatch(Command::FetchPosts {
                community_id: "test1".into(),
            })
            .await;
        let state = session.store().snapshot();
        assert_eq!(state.posts.posts.len(), 1);
        assert!(state.posts.post_votes.is_empty());

        session
            .dispatch(Command::DeletePost {
                post_id: post_id.clone(),
            })
            .await;
        let state = session.store().snapshot();
        assert!(state.posts.posts.is_empty());
        assert!(state.posts.selected_post.is_none());
    }

    #[tokio::test]
    async fn test_create_post_with_bad_image_is_validation_error() {
        let (engine, _dir) = setup_engine().await;
        let session = ClientSession::new(engine, Some(user("alice")));
        session
            .dispatch(Command::CreateCommunity {
                name: "test1".into(),
                privacy_type: PrivacyType::Public,
            })
            .await;

        session
            .dispatch(Command::CreatePost {
                community_id: "test1".into(),
                title: "pic".into(),
                body: String::new(),
                image: Some("data:text/plain;base64,aGVsbG8=".into()),
            })
            .await;
        let state = session.store().snapshot();
        assert!(state.posts.posts.is_empty());
        assert!(state.error.as_deref().unwrap().contains("Unsupported image type"));
    }

    #[tokio::test]
    async fn test_sign_out_drops_identity() {
        let (engine, _dir) = setup_engine().await;
        let session = ClientSession::new(engine, Some(user("alice")));
        assert!(session.user().is_some());

        session.dispatch(Command::SignOut).await;
        assert!(session.user().is_none());

        let patches = session
            .dispatch(Command::Vote {
                post_id: "p".into(),
                value: 1,
            })
            .await;
        assert_eq!(patches, vec![StatePatch::AuthRequired]);
    }
}
