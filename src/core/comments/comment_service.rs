// Comment gate - core business logic for the one-comment-per-post slot.
//
// This service handles:
// - Creating a comment when the author's slot on the post is free
// - Editing the slot in place (keeps identity and created_at)
// - Deleting the slot, which releases it for a fresh comment
//
// The parent post's comments_count moves together with the slot: the store
// applies comment write + counter adjustment as one atomic step, so a partial
// failure surfaces as StoreUnavailable with no half-applied state.

use super::comment_models::{Comment, MAX_COMMENT_LEN};
use crate::core::identity::{AuthorSnapshot, Principal};
use crate::core::voting::ReactionTally;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("commenting requires a signed-in user")]
    Unauthenticated,

    #[error("you have already commented on this post")]
    DuplicateComment,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidText(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence contract for comment slots.
///
/// Writes that touch the parent post's comments_count must do so in the same
/// atomic step as the comment change itself.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Insert the comment and bump the parent post's comments_count by one.
    /// Returns `Ok(false)` when the `(post_id, author_id)` slot is already
    /// taken; fails with `NotFound` when the post does not exist. Either the
    /// whole pair applies or nothing does.
    async fn insert_comment(&self, comment: Comment) -> Result<bool, CommentError>;

    /// The live comment in the `(post_id, author_id)` slot, if any.
    async fn get_comment(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> Result<Option<Comment>, CommentError>;

    /// Replace the slot's text and stamp `edited_at`. Identity and
    /// created_at are untouched. Returns `Ok(false)` when the slot is empty.
    async fn update_comment_text(
        &self,
        post_id: &str,
        author_id: &str,
        text: &str,
        edited_at: chrono::DateTime<Utc>,
    ) -> Result<bool, CommentError>;

    /// Remove the slot and decrement the parent's comments_count, flooring
    /// at zero, as one atomic step. Returns `Ok(false)` when the slot is
    /// already empty.
    async fn delete_comment(&self, post_id: &str, author_id: &str) -> Result<bool, CommentError>;

    /// All live comments on the post, oldest first.
    async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, CommentError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Enforces the single-slot comment lifecycle on top of a `CommentStore`.
pub struct CommentGate<S: CommentStore> {
    store: S,
}

impl<S: CommentStore> CommentGate<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create the author's comment on the post. Fails with
    /// `DuplicateComment` when the slot is taken - callers edit instead.
    pub async fn post_comment(
        &self,
        post_id: &str,
        author: &Principal,
        text: &str,
    ) -> Result<Comment, CommentError> {
        if author.is_anonymous() {
            return Err(CommentError::Unauthenticated);
        }
        validate_text(text)?;

        let comment = Comment {
            post_id: post_id.to_string(),
            author: AuthorSnapshot::from(author),
            text: text.to_string(),
            created_at: Utc::now(),
            edited_at: None,
            reactions: ReactionTally::default(),
        };

        if !self.store.insert_comment(comment.clone()).await? {
            return Err(CommentError::DuplicateComment);
        }

        tracing::info!(post_id, author_id = %author.id, "comment created");
        Ok(comment)
    }

    /// Replace the text of the author's existing comment. `created_at` is
    /// preserved; `edited_at` is set to now.
    pub async fn edit_comment(
        &self,
        post_id: &str,
        author_id: &str,
        new_text: &str,
    ) -> Result<(), CommentError> {
        validate_text(new_text)?;

        if !self
            .store
            .update_comment_text(post_id, author_id, new_text, Utc::now())
            .await?
        {
            return Err(CommentError::NotFound(comment_slot(post_id, author_id)));
        }
        Ok(())
    }

    /// Remove the author's comment, releasing the slot.
    pub async fn delete_comment(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> Result<(), CommentError> {
        if !self.store.delete_comment(post_id, author_id).await? {
            return Err(CommentError::NotFound(comment_slot(post_id, author_id)));
        }
        tracing::info!(post_id, author_id, "comment deleted");
        Ok(())
    }

    /// The author's own comment on the post, if they have one.
    pub async fn comment_of(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> Result<Option<Comment>, CommentError> {
        self.store.get_comment(post_id, author_id).await
    }

    /// All live comments on the post, oldest first.
    pub async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, CommentError> {
        self.store.comments_for_post(post_id).await
    }
}

fn comment_slot(post_id: &str, author_id: &str) -> String {
    format!("comment by {} on post {}", author_id, post_id)
}

fn validate_text(text: &str) -> Result<(), CommentError> {
    if text.trim().is_empty() {
        return Err(CommentError::InvalidText("comment cannot be empty".into()));
    }
    if text.chars().count() > MAX_COMMENT_LEN {
        return Err(CommentError::InvalidText(format!(
            "comment is limited to {} characters",
            MAX_COMMENT_LEN
        )));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    /// In-memory store for testing. Tracks the parent post's counter so the
    /// count-consistency property can be asserted.
    struct MockCommentStore {
        comments: DashMap<(String, String), Comment>,
        post_counts: DashMap<String, u32>,
    }

    impl MockCommentStore {
        fn with_post(post_id: &str) -> Self {
            let store = Self {
                comments: DashMap::new(),
                post_counts: DashMap::new(),
            };
            store.post_counts.insert(post_id.to_string(), 0);
            store
        }

        fn count(&self, post_id: &str) -> u32 {
            self.post_counts.get(post_id).map(|c| *c).unwrap_or(0)
        }
    }

    #[async_trait]
    impl CommentStore for MockCommentStore {
        async fn insert_comment(&self, comment: Comment) -> Result<bool, CommentError> {
            let mut count = self
                .post_counts
                .get_mut(&comment.post_id)
                .ok_or_else(|| CommentError::NotFound(format!("post {}", comment.post_id)))?;

            let key = (comment.post_id.clone(), comment.author.id.clone());
            if self.comments.contains_key(&key) {
                return Ok(false);
            }
            self.comments.insert(key, comment);
            *count += 1;
            Ok(true)
        }

        async fn get_comment(
            &self,
            post_id: &str,
            author_id: &str,
        ) -> Result<Option<Comment>, CommentError> {
            Ok(self
                .comments
                .get(&(post_id.to_string(), author_id.to_string()))
                .map(|entry| entry.clone()))
        }

        async fn update_comment_text(
            &self,
            post_id: &str,
            author_id: &str,
            text: &str,
            edited_at: chrono::DateTime<Utc>,
        ) -> Result<bool, CommentError> {
            match self
                .comments
                .get_mut(&(post_id.to_string(), author_id.to_string()))
            {
                Some(mut entry) => {
                    entry.text = text.to_string();
                    entry.edited_at = Some(edited_at);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete_comment(
            &self,
            post_id: &str,
            author_id: &str,
        ) -> Result<bool, CommentError> {
            let mut count = self
                .post_counts
                .get_mut(post_id)
                .ok_or_else(|| CommentError::NotFound(format!("post {}", post_id)))?;

            let removed = self
                .comments
                .remove(&(post_id.to_string(), author_id.to_string()))
                .is_some();
            if removed {
                *count = count.saturating_sub(1);
            }
            Ok(removed)
        }

        async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, CommentError> {
            let mut all: Vec<Comment> = self
                .comments
                .iter()
                .filter(|entry| entry.key().0 == post_id)
                .map(|entry| entry.clone())
                .collect();
            all.sort_by_key(|c| c.created_at);
            Ok(all)
        }
    }

    fn author(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            name: "Priya".to_string(),
            email: format!("{}@student.example.edu", id),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn second_comment_on_same_post_is_rejected() {
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));
        let user = author("user-1");

        gate.post_comment("post-1", &user, "hello").await.unwrap();
        let err = gate.post_comment("post-1", &user, "again").await.unwrap_err();

        assert!(matches!(err, CommentError::DuplicateComment));
        assert_eq!(gate.store.count("post-1"), 1);
    }

    #[tokio::test]
    async fn spec_scenario_post_edit_delete() {
        // "hello" (count 1) -> edit to "hello world" (count 1, edited_at set)
        // -> delete (count 0).
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));
        let user = author("user-a");

        let created = gate.post_comment("post-1", &user, "hello").await.unwrap();
        assert_eq!(gate.store.count("post-1"), 1);

        gate.edit_comment("post-1", "user-a", "hello world").await.unwrap();
        let edited = gate.comment_of("post-1", "user-a").await.unwrap().unwrap();
        assert_eq!(edited.text, "hello world");
        assert_eq!(edited.created_at, created.created_at);
        assert!(edited.edited_at.is_some());
        assert_eq!(gate.store.count("post-1"), 1);

        gate.delete_comment("post-1", "user-a").await.unwrap();
        assert_eq!(gate.store.count("post-1"), 0);
        assert!(gate.comment_of("post-1", "user-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn count_tracks_live_comments() {
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));

        for id in ["a", "b", "c"] {
            gate.post_comment("post-1", &author(id), "hi").await.unwrap();
        }
        assert_eq!(gate.store.count("post-1"), 3);

        gate.delete_comment("post-1", "b").await.unwrap();
        assert_eq!(gate.store.count("post-1"), 2);

        // Deleting an already-empty slot must not move the counter.
        assert!(gate.delete_comment("post-1", "b").await.is_err());
        assert_eq!(gate.store.count("post-1"), 2);

        // The slot is free again after deletion.
        gate.post_comment("post-1", &author("b"), "back").await.unwrap();
        assert_eq!(gate.store.count("post-1"), 3);
    }

    #[tokio::test]
    async fn edit_of_missing_slot_is_not_found() {
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));
        let err = gate.edit_comment("post-1", "ghost", "hi").await.unwrap_err();
        assert!(matches!(err, CommentError::NotFound(_)));
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found() {
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));
        let err = gate
            .post_comment("post-404", &author("user-1"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, CommentError::NotFound(_)));
    }

    #[tokio::test]
    async fn text_bounds_are_enforced() {
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));
        let user = author("user-1");

        let err = gate.post_comment("post-1", &user, "   ").await.unwrap_err();
        assert!(matches!(err, CommentError::InvalidText(_)));

        let long = "x".repeat(MAX_COMMENT_LEN + 1);
        let err = gate.post_comment("post-1", &user, &long).await.unwrap_err();
        assert!(matches!(err, CommentError::InvalidText(_)));

        // Exactly at the limit is fine.
        let max = "x".repeat(MAX_COMMENT_LEN);
        gate.post_comment("post-1", &user, &max).await.unwrap();
    }

    #[tokio::test]
    async fn anonymous_author_is_rejected() {
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));
        let mut user = author("user-1");
        user.id = String::new();

        let err = gate.post_comment("post-1", &user, "hi").await.unwrap_err();
        assert!(matches!(err, CommentError::Unauthenticated));
    }

    #[tokio::test]
    async fn comments_come_back_oldest_first() {
        let gate = CommentGate::new(MockCommentStore::with_post("post-1"));

        gate.post_comment("post-1", &author("a"), "first").await.unwrap();
        gate.post_comment("post-1", &author("b"), "second").await.unwrap();

        let all = gate.comments_for_post("post-1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at <= all[1].created_at);
    }
}
