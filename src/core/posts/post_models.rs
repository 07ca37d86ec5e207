// Post domain models.

use crate::core::identity::AuthorSnapshot;
use crate::core::voting::ReactionTally;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Board sections a post can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostCategory {
    Academics,
    CampusLife,
    Events,
    Question,
    Complaint,
    Discussion,
    Other,
}

impl std::fmt::Display for PostCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PostCategory::Academics => "Academics",
            PostCategory::CampusLife => "Campus Life",
            PostCategory::Events => "Events",
            PostCategory::Question => "Question",
            PostCategory::Complaint => "Complaint",
            PostCategory::Discussion => "Discussion",
            PostCategory::Other => "Other",
        };
        write!(f, "{}", label)
    }
}

/// A board post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: AuthorSnapshot,
    pub title: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub category: PostCategory,
    pub sticky: bool,
    pub created_at: DateTime<Utc>,
    pub reactions: ReactionTally,
    pub comments_count: u32,
    pub report_count: u32,
    pub is_suspended: bool,
}

impl Post {
    pub fn author_id(&self) -> &str {
        &self.author.id
    }

    pub fn is_image_post(&self) -> bool {
        self.image_url.is_some()
    }
}

/// Caller-supplied fields of a post being created.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub category: PostCategory,
}

/// Partial update applied to an existing post. `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub text: Option<Option<String>>,
    pub category: Option<PostCategory>,
    pub sticky: Option<bool>,
}

/// Who is looking at the board. Suspended posts are hidden from members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Member,
    Admin,
}
