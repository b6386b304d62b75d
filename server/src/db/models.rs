use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Who may view and post in a community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PrivacyType {
    #[default]
    Public,
    /// Anyone can view; only members can post.
    Restricted,
    /// Only members can view and post.
    Private,
}

impl PrivacyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyType::Public => "public",
            PrivacyType::Restricted => "restricted",
            PrivacyType::Private => "private",
        }
    }

    pub fn posting_requires_membership(&self) -> bool {
        !matches!(self, PrivacyType::Public)
    }

    pub fn viewing_requires_membership(&self) -> bool {
        matches!(self, PrivacyType::Private)
    }
}

impl fmt::Display for PrivacyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(PrivacyType::Public),
            "restricted" => Ok(PrivacyType::Restricted),
            "private" => Ok(PrivacyType::Private),
            other => Err(format!("Unknown community type: {other}")),
        }
    }
}

/// A stored community. The id is the community name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommunityRow {
    pub id: String,
    pub creator_id: String,
    pub number_of_members: i64,
    pub privacy_type: PrivacyType,
    pub image_url: Option<String>,
    pub created_at: String,
}

/// A user's membership record for one community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommunitySnippetRow {
    pub user_id: String,
    pub community_id: String,
    pub is_moderator: bool,
    pub image_url: Option<String>,
    pub joined_at: String,
}

/// A stored post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostRow {
    pub id: String,
    pub community_id: String,
    pub creator_id: String,
    pub creator_display_name: String,
    pub title: String,
    pub body: String,
    pub number_of_comments: i64,
    /// Net tally of all votes on the post.
    pub vote_status: i64,
    pub image_url: Option<String>,
    pub community_image_url: Option<String>,
    pub created_at: String,
}

/// One user's vote on one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostVoteRow {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub community_id: String,
    pub vote_value: i64,
    pub created_at: String,
}

/// Parameters for inserting a post (avoids too-many-arguments).
pub struct NewPost<'a> {
    pub id: &'a str,
    pub community_id: &'a str,
    pub creator_id: &'a str,
    pub creator_display_name: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub community_image_url: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

/// Result of applying a vote: the caller's vote after the change (None when it
/// was toggled off) and the post's new tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub post_id: String,
    pub vote: Option<PostVoteRow>,
    pub vote_status: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_type_parse_and_display() {
        for kind in [
            PrivacyType::Public,
            PrivacyType::Restricted,
            PrivacyType::Private,
        ] {
            assert_eq!(kind.as_str().parse::<PrivacyType>().unwrap(), kind);
        }
        assert!("restrictred".parse::<PrivacyType>().is_err());
        assert_eq!(PrivacyType::Restricted.to_string(), "restricted");
    }

    #[test]
    fn test_privacy_type_serde_lowercase() {
        let json = serde_json::to_string(&PrivacyType::Private).unwrap();
        assert_eq!(json, "\"private\"");
        let back: PrivacyType = serde_json::from_str("\"restricted\"").unwrap();
        assert_eq!(back, PrivacyType::Restricted);
    }

    #[test]
    fn test_privacy_permissions() {
        assert!(!PrivacyType::Public.posting_requires_membership());
        assert!(PrivacyType::Restricted.posting_requires_membership());
        assert!(!PrivacyType::Restricted.viewing_requires_membership());
        assert!(PrivacyType::Private.viewing_requires_membership());
    }
}
