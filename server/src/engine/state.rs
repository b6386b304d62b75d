use serde::{Deserialize, Serialize};

use super::commands::StatePatch;
use crate::db::models::{CommunityRow, CommunitySnippetRow, PostRow, PostVoteRow};

/// An authenticated user: an opaque ID and an email from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
}

/// The signed-in user's memberships and the community being viewed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommunityState {
    pub my_snippets: Vec<CommunitySnippetRow>,
    pub current_community: Option<CommunityRow>,
    pub snippets_fetched: bool,
}

/// Loaded posts, the post being viewed, and the user's votes on them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostState {
    pub selected_post: Option<PostRow>,
    pub posts: Vec<PostRow>,
    pub post_votes: Vec<PostVoteRow>,
}

/// Everything a client renders from. Only ever changed by applying a [`StatePatch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientState {
    pub user: Option<UserIdentity>,
    pub community: CommunityState,
    pub posts: PostState,
    pub loading: bool,
    pub error: Option<String>,
    /// Set when an intent needs a signed-in user and there is none.
    pub auth_prompt: bool,
}

impl ClientState {
    pub fn for_user(user: Option<UserIdentity>) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    pub fn is_member_of(&self, community_id: &str) -> bool {
        self.community
            .my_snippets
            .iter()
            .any(|s| s.community_id == community_id)
    }

    /// The user's vote value on a post, if any.
    pub fn vote_on(&self, post_id: &str) -> Option<i64> {
        self.posts
            .post_votes
            .iter()
            .find(|v| v.post_id == post_id)
            .map(|v| v.vote_value)
    }

    /// Apply one patch. Pure: no I/O, no failure.
    pub fn apply(&mut self, patch: &StatePatch) {
        match patch {
            StatePatch::Pending => {
                self.loading = true;
                self.error = None;
                self.auth_prompt = false;
            }
            StatePatch::Settled => self.loading = false,
            StatePatch::Error { message } => self.error = Some(message.clone()),
            StatePatch::AuthRequired => self.auth_prompt = true,
            StatePatch::SnippetsLoaded { snippets } => {
                self.community.my_snippets = snippets.clone();
                self.community.snippets_fetched = true;
            }
            StatePatch::SnippetAdded { snippet } => {
                let snippets = &mut self.community.my_snippets;
                snippets.retain(|s| s.community_id != snippet.community_id);
                snippets.push(snippet.clone());
            }
            StatePatch::SnippetRemoved { community_id } => {
                self.community
                    .my_snippets
                    .retain(|s| &s.community_id != community_id);
            }
            StatePatch::CurrentCommunitySet { community } => {
                self.community.current_community = Some(community.clone());
            }
            StatePatch::MemberCountAdjusted {
                community_id,
                delta,
            } => {
                if let Some(current) = self.community.current_community.as_mut()
                    && &current.id == community_id
                {
                    current.number_of_members = (current.number_of_members + delta).max(0);
                }
            }
            StatePatch::PostsLoaded { posts } => self.posts.posts = posts.clone(),
            StatePatch::PostAdded { post } => {
                self.posts.posts.retain(|p| p.id != post.id);
                self.posts.posts.insert(0, post.clone());
            }
            StatePatch::PostRemoved { post_id } => {
                self.posts.posts.retain(|p| &p.id != post_id);
                self.posts.post_votes.retain(|v| &v.post_id != post_id);
                if self
                    .posts
                    .selected_post
                    .as_ref()
                    .is_some_and(|p| &p.id == post_id)
                {
                    self.posts.selected_post = None;
                }
            }
            StatePatch::PostSelected { post } => self.posts.selected_post = Some(post.clone()),
            StatePatch::PostTallyChanged {
                post_id,
                vote_status,
            } => {
                let posts = self.posts.posts.iter_mut();
                for post in posts.chain(self.posts.selected_post.iter_mut()) {
                    if &post.id == post_id {
                        post.vote_status = *vote_status;
                    }
                }
            }
            StatePatch::VotesLoaded { votes } => self.posts.post_votes = votes.clone(),
            StatePatch::VoteRecorded { vote } => {
                self.posts.post_votes.retain(|v| v.post_id != vote.post_id);
                self.posts.post_votes.push(vote.clone());
            }
            StatePatch::VoteRemoved { post_id } => {
                self.posts.post_votes.retain(|v| &v.post_id != post_id);
            }
            StatePatch::SignedOut => *self = Self::default(),
        }
    }
}
