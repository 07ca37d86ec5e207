// Comment domain models.

use crate::core::identity::AuthorSnapshot;
use crate::core::voting::ReactionTally;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest comment text accepted, in characters.
pub const MAX_COMMENT_LEN: usize = 2000;

/// A comment on a post.
///
/// The identity key is `(post_id, author.id)` - a comment has no id of its
/// own. That makes "one live comment per author per post" structural: there
/// is simply no second slot to write into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub post_id: String,
    pub author: AuthorSnapshot,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub reactions: ReactionTally,
}

impl Comment {
    pub fn author_id(&self) -> &str {
        &self.author.id
    }
}
