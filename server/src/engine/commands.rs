use serde::{Deserialize, Serialize};

use crate::db::models::{
    CommunityRow, CommunitySnippetRow, PostRow, PostVoteRow, PrivacyType,
};

/// A user intent sent by a client. Each command runs one effect against the
/// engine and produces a list of [`StatePatch`]es.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    FetchMySnippets,
    FetchCommunity {
        community_id: String,
    },
    /// Join when `is_joined` is false, leave when it is true.
    JoinOrLeave {
        community_id: String,
        is_joined: bool,
    },
    CreateCommunity {
        name: String,
        #[serde(default)]
        privacy_type: PrivacyType,
    },
    /// Load a community's posts and the user's votes on them.
    FetchPosts {
        community_id: String,
    },
    CreatePost {
        community_id: String,
        title: String,
        #[serde(default)]
        body: String,
        /// Optional image as a `data:` URL.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    Vote {
        post_id: String,
        value: i64,
    },
    DeletePost {
        post_id: String,
    },
    SelectPost {
        post_id: String,
    },
    SignOut,
}

impl Command {
    /// Whether the command can only run for a signed-in user.
    pub fn requires_user(&self) -> bool {
        !matches!(
            self,
            Command::FetchMySnippets
                | Command::FetchCommunity { .. }
                | Command::FetchPosts { .. }
                | Command::SelectPost { .. }
                | Command::SignOut
        )
    }
}

/// A single change to a client's state, pushed to every subscriber after it
/// has been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatePatch {
    /// A command started; clears any previous error.
    Pending,
    /// The command finished (successfully or not).
    Settled,
    Error {
        message: String,
    },
    AuthRequired,
    SnippetsLoaded {
        snippets: Vec<CommunitySnippetRow>,
    },
    SnippetAdded {
        snippet: CommunitySnippetRow,
    },
    SnippetRemoved {
        community_id: String,
    },
    CurrentCommunitySet {
        community: CommunityRow,
    },
    MemberCountAdjusted {
        community_id: String,
        delta: i64,
    },
    PostsLoaded {
        posts: Vec<PostRow>,
    },
    PostAdded {
        post: PostRow,
    },
    PostRemoved {
        post_id: String,
    },
    PostSelected {
        post: PostRow,
    },
    PostTallyChanged {
        post_id: String,
        vote_status: i64,
    },
    VotesLoaded {
        votes: Vec<PostVoteRow>,
    },
    VoteRecorded {
        vote: PostVoteRow,
    },
    VoteRemoved {
        post_id: String,
    },
    SignedOut,
}
