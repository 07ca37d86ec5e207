// In-memory implementation of the forum store ports.
//
// Used directly in tests and small deployments, and as the reference
// behavior the SQLite adapter has to match. Documents live in DashMaps;
// per-document atomicity comes from holding the document's map entry while
// its subsidiary records (votes, comments, reports) are touched. Whenever
// two maps are involved, the target/post document is locked first.

use crate::core::accounts::{Account, AccountError, AccountStore, QuotaCharge};
use crate::core::comments::{Comment, CommentError, CommentStore};
use crate::core::posts::{Post, PostError, PostPatch, PostStore};
use crate::core::reports::{
    EscalationState, Report, ReportError, ReportInsert, ReportStore,
};
use crate::core::voting::{
    Polarity, ReactionTally, TallySnapshot, TargetRef, VoteChange, VoteError, VoteStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// A document plus the revision its tally was last written at.
#[derive(Debug, Clone)]
struct Versioned<T> {
    doc: T,
    revision: i64,
}

impl<T> Versioned<T> {
    fn new(doc: T) -> Self {
        Self { doc, revision: 0 }
    }
}

#[derive(Default)]
struct ForumMaps {
    posts: DashMap<String, Versioned<Post>>,
    /// Keyed by the comment slot `(post_id, author_id)`.
    comments: DashMap<(String, String), Versioned<Comment>>,
    /// Keyed by `(target, voter_id)` - one live vote per pair.
    votes: DashMap<(TargetRef, String), Polarity>,
    /// Keyed by `(content_id, reporter_id)` so a double report has nowhere
    /// to go.
    reports: DashMap<(String, String), Report>,
    accounts: DashMap<String, Account>,
}

/// In-memory store. Clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryForumStore {
    maps: Arc<ForumMaps>,
}

impl MemoryForumStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// VOTES
// ============================================================================

#[async_trait]
impl VoteStore for MemoryForumStore {
    async fn get_vote(
        &self,
        target: &TargetRef,
        voter_id: &str,
    ) -> Result<Option<Polarity>, VoteError> {
        Ok(self
            .maps
            .votes
            .get(&(target.clone(), voter_id.to_string()))
            .map(|entry| *entry))
    }

    async fn read_tally(&self, target: &TargetRef) -> Result<Option<TallySnapshot>, VoteError> {
        Ok(match target {
            TargetRef::Post { post_id } => self.maps.posts.get(post_id).map(|entry| TallySnapshot {
                tally: entry.doc.reactions,
                revision: entry.revision,
            }),
            TargetRef::Comment { post_id, author_id } => self
                .maps
                .comments
                .get(&(post_id.clone(), author_id.clone()))
                .map(|entry| TallySnapshot {
                    tally: entry.doc.reactions,
                    revision: entry.revision,
                }),
        })
    }

    async fn commit_vote(
        &self,
        target: &TargetRef,
        voter_id: &str,
        change: VoteChange,
        tally: ReactionTally,
        expected_revision: i64,
    ) -> Result<bool, VoteError> {
        // Lock the target document for the whole record-plus-tally write.
        match target {
            TargetRef::Post { post_id } => {
                let mut entry = self
                    .maps
                    .posts
                    .get_mut(post_id)
                    .ok_or_else(|| VoteError::NotFound(target.describe()))?;
                if entry.revision != expected_revision {
                    return Ok(false);
                }
                self.apply_vote_change(target, voter_id, change);
                entry.doc.reactions = tally;
                entry.revision += 1;
            }
            TargetRef::Comment { post_id, author_id } => {
                let mut entry = self
                    .maps
                    .comments
                    .get_mut(&(post_id.clone(), author_id.clone()))
                    .ok_or_else(|| VoteError::NotFound(target.describe()))?;
                if entry.revision != expected_revision {
                    return Ok(false);
                }
                self.apply_vote_change(target, voter_id, change);
                entry.doc.reactions = tally;
                entry.revision += 1;
            }
        }
        Ok(true)
    }
}

impl MemoryForumStore {
    fn apply_vote_change(&self, target: &TargetRef, voter_id: &str, change: VoteChange) {
        let key = (target.clone(), voter_id.to_string());
        match change {
            VoteChange::Cast(polarity) | VoteChange::Flip(polarity) => {
                self.maps.votes.insert(key, polarity);
            }
            VoteChange::Retract => {
                self.maps.votes.remove(&key);
            }
        }
    }
}

// ============================================================================
// COMMENTS
// ============================================================================

#[async_trait]
impl CommentStore for MemoryForumStore {
    async fn insert_comment(&self, comment: Comment) -> Result<bool, CommentError> {
        let mut post = self
            .maps
            .posts
            .get_mut(&comment.post_id)
            .ok_or_else(|| CommentError::NotFound(format!("post {}", comment.post_id)))?;

        let key = (comment.post_id.clone(), comment.author.id.clone());
        if self.maps.comments.contains_key(&key) {
            return Ok(false);
        }
        self.maps.comments.insert(key, Versioned::new(comment));
        post.doc.comments_count += 1;
        Ok(true)
    }

    async fn get_comment(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> Result<Option<Comment>, CommentError> {
        Ok(self
            .maps
            .comments
            .get(&(post_id.to_string(), author_id.to_string()))
            .map(|entry| entry.doc.clone()))
    }

    async fn update_comment_text(
        &self,
        post_id: &str,
        author_id: &str,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool, CommentError> {
        match self
            .maps
            .comments
            .get_mut(&(post_id.to_string(), author_id.to_string()))
        {
            Some(mut entry) => {
                entry.doc.text = text.to_string();
                entry.doc.edited_at = Some(edited_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_comment(&self, post_id: &str, author_id: &str) -> Result<bool, CommentError> {
        // Post first (lock order), and tolerate it being gone already.
        let post = self.maps.posts.get_mut(post_id);

        let removed = self
            .maps
            .comments
            .remove(&(post_id.to_string(), author_id.to_string()))
            .is_some();

        if removed {
            if let Some(mut entry) = post {
                entry.doc.comments_count = entry.doc.comments_count.saturating_sub(1);
            }
        }
        Ok(removed)
    }

    async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, CommentError> {
        let mut all: Vec<Comment> = self
            .maps
            .comments
            .iter()
            .filter(|entry| entry.key().0 == post_id)
            .map(|entry| entry.doc.clone())
            .collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }
}

// ============================================================================
// REPORTS
// ============================================================================

#[async_trait]
impl ReportStore for MemoryForumStore {
    async fn find_report(
        &self,
        content_id: &str,
        reporter_id: &str,
    ) -> Result<Option<Report>, ReportError> {
        Ok(self
            .maps
            .reports
            .get(&(content_id.to_string(), reporter_id.to_string()))
            .map(|entry| entry.clone()))
    }

    async fn insert_report(
        &self,
        report: Report,
        escalate_post: Option<&str>,
        suspend_threshold: u32,
    ) -> Result<ReportInsert, ReportError> {
        // Post first (lock order). A missing escalation target is skipped,
        // the report still lands.
        let post = escalate_post.and_then(|post_id| self.maps.posts.get_mut(post_id));

        let key = (report.content_id.clone(), report.reporter_id.clone());
        if self.maps.reports.contains_key(&key) {
            return Ok(ReportInsert::Duplicate);
        }
        self.maps.reports.insert(key, report);

        let escalation = post.map(|mut entry| {
            entry.doc.report_count += 1;
            if entry.doc.report_count >= suspend_threshold {
                entry.doc.is_suspended = true;
            }
            EscalationState {
                report_count: entry.doc.report_count,
                suspended: entry.doc.is_suspended,
            }
        });

        Ok(ReportInsert::Filed { escalation })
    }

    async fn delete_report(&self, report_id: &str) -> Result<bool, ReportError> {
        let key = self
            .maps
            .reports
            .iter()
            .find(|entry| entry.id == report_id)
            .map(|entry| entry.key().clone());
        Ok(match key {
            Some(key) => self.maps.reports.remove(&key).is_some(),
            None => false,
        })
    }

    async fn list_reports(&self) -> Result<Vec<Report>, ReportError> {
        let mut all: Vec<Report> = self.maps.reports.iter().map(|e| e.clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

// ============================================================================
// POSTS
// ============================================================================

#[async_trait]
impl PostStore for MemoryForumStore {
    async fn insert_post(&self, post: Post) -> Result<(), PostError> {
        self.maps.posts.insert(post.id.clone(), Versioned::new(post));
        Ok(())
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, PostError> {
        Ok(self.maps.posts.get(post_id).map(|entry| entry.doc.clone()))
    }

    async fn list_posts(
        &self,
        limit: usize,
        include_suspended: bool,
    ) -> Result<Vec<Post>, PostError> {
        let mut all: Vec<Post> = self
            .maps
            .posts
            .iter()
            .map(|entry| entry.doc.clone())
            .filter(|post| include_suspended || !post.is_suspended)
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn posts_by_author(&self, author_id: &str) -> Result<Vec<Post>, PostError> {
        let mut all: Vec<Post> = self
            .maps
            .posts
            .iter()
            .filter(|entry| entry.doc.author.id == author_id)
            .map(|entry| entry.doc.clone())
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn apply_patch(&self, post_id: &str, patch: PostPatch) -> Result<bool, PostError> {
        match self.maps.posts.get_mut(post_id) {
            Some(mut entry) => {
                if let Some(title) = patch.title {
                    entry.doc.title = title;
                }
                if let Some(text) = patch.text {
                    entry.doc.text = text;
                }
                if let Some(category) = patch.category {
                    entry.doc.category = category;
                }
                if let Some(sticky) = patch.sticky {
                    entry.doc.sticky = sticky;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_post(&self, post_id: &str) -> Result<bool, PostError> {
        Ok(self.maps.posts.remove(post_id).is_some())
    }
}

// ============================================================================
// ACCOUNTS
// ============================================================================

#[async_trait]
impl AccountStore for MemoryForumStore {
    async fn ensure_account(&self, account: Account) -> Result<Account, AccountError> {
        Ok(self
            .maps
            .accounts
            .entry(account.id.clone())
            .or_insert(account)
            .clone())
    }

    async fn get_account(&self, user_id: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.maps.accounts.get(user_id).map(|entry| entry.clone()))
    }

    async fn set_banned(
        &self,
        user_id: &str,
        banned: bool,
        banned_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AccountError> {
        match self.maps.accounts.get_mut(user_id) {
            Some(mut entry) => {
                entry.is_banned = banned;
                entry.banned_at = banned_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn charge_post_quota(
        &self,
        user_id: &str,
        image_post: bool,
        daily_limit: u32,
        monthly_image_limit: u32,
    ) -> Result<QuotaCharge, AccountError> {
        let mut entry = self
            .maps
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| AccountError::NotFound(user_id.to_string()))?;

        if entry.daily_post_count >= daily_limit {
            return Ok(QuotaCharge::DailyExhausted);
        }
        if image_post && entry.monthly_image_post_count >= monthly_image_limit {
            return Ok(QuotaCharge::MonthlyImageExhausted);
        }

        entry.daily_post_count += 1;
        if image_post {
            entry.monthly_image_post_count += 1;
        } else {
            entry.text_post_count += 1;
        }
        Ok(QuotaCharge::Charged)
    }
}

// ============================================================================
// TESTS
// ============================================================================
