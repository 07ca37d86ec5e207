// Post board - core business logic for the posting surface.
//
// This service handles:
// - Post creation, charging the author's quotas in the same breath
// - Feed and profile listings (suspended posts hidden from members)
// - Edits and admin deletion
//
// Tallies and moderation counters on a post are owned by the voting,
// comment and report services; nothing here writes them directly.

use super::post_models::{NewPost, Post, PostPatch, Viewer};
use crate::core::accounts::{AccountError, AccountStore, QuotaCharge};
use crate::core::identity::{AuthorSnapshot, Principal};
use crate::core::voting::ReactionTally;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

/// Posts a member may create per day.
pub const DAILY_POST_LIMIT: u32 = 2;
/// Image posts a member may create per month.
pub const MONTHLY_IMAGE_POST_LIMIT: u32 = 2;
/// Posts returned by a feed listing.
pub const FEED_PAGE_SIZE: usize = 20;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PostError {
    #[error("posting requires a signed-in user")]
    Unauthenticated,

    #[error("post {0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidPost(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<AccountError> for PostError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Unauthenticated => PostError::Unauthenticated,
            AccountError::NotFound(id) => PostError::NotFound(format!("account {}", id)),
            AccountError::StoreUnavailable(msg) => PostError::StoreUnavailable(msg),
        }
    }
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence contract for post documents.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, post: Post) -> Result<(), PostError>;

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, PostError>;

    /// Up to `limit` posts, newest first. Suspended posts are included only
    /// when `include_suspended` is set.
    async fn list_posts(
        &self,
        limit: usize,
        include_suspended: bool,
    ) -> Result<Vec<Post>, PostError>;

    /// The author's posts, newest first, suspended ones included (authors
    /// and admins both see them on the profile page).
    async fn posts_by_author(&self, author_id: &str) -> Result<Vec<Post>, PostError>;

    /// Apply the patch to an existing post. Returns `Ok(false)` when the
    /// post does not exist.
    async fn apply_patch(&self, post_id: &str, patch: PostPatch) -> Result<bool, PostError>;

    /// Remove the post document. Returns `Ok(false)` when already gone.
    async fn delete_post(&self, post_id: &str) -> Result<bool, PostError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The posting surface: creation under quota, listing, editing, deletion.
pub struct PostBoard<P: PostStore, A: AccountStore> {
    posts: P,
    accounts: A,
}

impl<P: PostStore, A: AccountStore> PostBoard<P, A> {
    pub fn new(posts: P, accounts: A) -> Self {
        Self { posts, accounts }
    }

    /// Create a post for the author, charging their daily (and, for image
    /// posts, monthly image) quota.
    pub async fn create_post(
        &self,
        author: &Principal,
        new: NewPost,
    ) -> Result<Post, PostError> {
        if author.is_anonymous() {
            return Err(PostError::Unauthenticated);
        }
        if new.title.trim().is_empty() {
            return Err(PostError::InvalidPost("a post needs a title".into()));
        }

        // First-time posters may not have an account document yet.
        self.accounts
            .ensure_account(crate::core::accounts::Account::new(author))
            .await?;

        let image_post = new.image_url.is_some();
        match self
            .accounts
            .charge_post_quota(&author.id, image_post, DAILY_POST_LIMIT, MONTHLY_IMAGE_POST_LIMIT)
            .await?
        {
            QuotaCharge::Charged => {}
            QuotaCharge::DailyExhausted => {
                return Err(PostError::QuotaExceeded(format!(
                    "daily limit of {} posts reached",
                    DAILY_POST_LIMIT
                )));
            }
            QuotaCharge::MonthlyImageExhausted => {
                return Err(PostError::QuotaExceeded(format!(
                    "monthly limit of {} image posts reached",
                    MONTHLY_IMAGE_POST_LIMIT
                )));
            }
        }

        let post = Post {
            id: Uuid::new_v4().to_string(),
            author: AuthorSnapshot::from(author),
            title: new.title.trim().to_string(),
            text: new.text,
            image_url: new.image_url,
            category: new.category,
            sticky: false,
            created_at: Utc::now(),
            reactions: ReactionTally::default(),
            comments_count: 0,
            report_count: 0,
            is_suspended: false,
        };

        self.posts.insert_post(post.clone()).await?;
        tracing::info!(post_id = %post.id, author_id = %author.id, category = %post.category, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post, PostError> {
        self.posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| PostError::NotFound(post_id.to_string()))
    }

    /// The board feed. Members never see suspended posts; admins see
    /// everything (the moderation queue is built from this).
    pub async fn list_posts(&self, viewer: Viewer) -> Result<Vec<Post>, PostError> {
        self.posts
            .list_posts(FEED_PAGE_SIZE, viewer == Viewer::Admin)
            .await
    }

    pub async fn posts_by_author(&self, author_id: &str) -> Result<Vec<Post>, PostError> {
        self.posts.posts_by_author(author_id).await
    }

    /// Edit title/text/category or pin the post.
    pub async fn update_post(&self, post_id: &str, patch: PostPatch) -> Result<(), PostError> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(PostError::InvalidPost("a post needs a title".into()));
            }
        }
        if !self.posts.apply_patch(post_id, patch).await? {
            return Err(PostError::NotFound(post_id.to_string()));
        }
        Ok(())
    }

    /// Remove a post entirely. This is the only way a suspended post leaves
    /// the board - there is no un-suspend.
    pub async fn delete_post(&self, post_id: &str) -> Result<(), PostError> {
        if !self.posts.delete_post(post_id).await? {
            return Err(PostError::NotFound(post_id.to_string()));
        }
        tracing::info!(post_id, "post deleted");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
