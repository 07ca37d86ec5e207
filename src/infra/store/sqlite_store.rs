// SQLite-backed implementation of the forum store ports.
//
// Tables:
// - posts:    post documents with tally, counters and a tally revision
// - comments: one row per (post_id, author_id) slot
// - votes:    one row per (target, voter), target flattened to
//             (post_id, comment_author_id) with '' meaning the post itself
// - reports:  one row per (content_id, reporter_id)
// - accounts: user documents with quota counters and ban state
//
// Multi-row steps (vote commit, comment insert/delete, report escalation)
// run inside a transaction so either the whole step lands or none of it.
// Vote commits are additionally guarded by `WHERE revision = ?` so a stale
// read never overwrites a newer tally.

use crate::core::accounts::{Account, AccountError, AccountStore, QuotaCharge};
use crate::core::comments::{Comment, CommentError, CommentStore};
use crate::core::identity::AuthorSnapshot;
use crate::core::posts::{Post, PostCategory, PostError, PostPatch, PostStore};
use crate::core::reports::{
    ContentType, EscalationState, Report, ReportCategory, ReportError, ReportInsert, ReportStatus,
    ReportStore,
};
use crate::core::voting::{
    Polarity, ReactionTally, TallySnapshot, TargetRef, VoteChange, VoteError, VoteStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

#[derive(Clone)]
pub struct SqliteForumStore {
    pool: Pool<Sqlite>,
}

impl SqliteForumStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                author TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT,
                image_url TEXT,
                category TEXT NOT NULL,
                sticky BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                upvotes INTEGER NOT NULL DEFAULT 0,
                downvotes INTEGER NOT NULL DEFAULT 0,
                comments_count INTEGER NOT NULL DEFAULT 0,
                report_count INTEGER NOT NULL DEFAULT 0,
                is_suspended BOOLEAN NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                post_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                author TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                edited_at TEXT,
                upvotes INTEGER NOT NULL DEFAULT 0,
                downvotes INTEGER NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (post_id, author_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                post_id TEXT NOT NULL,
                comment_author_id TEXT NOT NULL DEFAULT '',
                voter_id TEXT NOT NULL,
                polarity TEXT NOT NULL,
                PRIMARY KEY (post_id, comment_author_id, voter_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id TEXT NOT NULL,
                content_id TEXT NOT NULL,
                content_type TEXT NOT NULL,
                content_owner_id TEXT NOT NULL,
                reporter_id TEXT NOT NULL,
                category TEXT NOT NULL,
                reason TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (content_id, reporter_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_id ON reports(id);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                avatar_url TEXT,
                created_at TEXT NOT NULL,
                daily_post_count INTEGER NOT NULL DEFAULT 0,
                monthly_image_post_count INTEGER NOT NULL DEFAULT 0,
                text_post_count INTEGER NOT NULL DEFAULT 0,
                is_banned BOOLEAN NOT NULL DEFAULT 0,
                banned_at TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Flatten a target into the `(post_id, comment_author_id)` column pair;
/// the empty string addresses the post document itself.
fn vote_columns(target: &TargetRef) -> (&str, &str) {
    match target {
        TargetRef::Post { post_id } => (post_id.as_str(), ""),
        TargetRef::Comment { post_id, author_id } => (post_id.as_str(), author_id.as_str()),
    }
}

fn polarity_str(polarity: Polarity) -> &'static str {
    match polarity {
        Polarity::Up => "up",
        Polarity::Down => "down",
    }
}

fn parse_polarity(raw: &str) -> Result<Polarity, String> {
    match raw {
        "up" => Ok(Polarity::Up),
        "down" => Ok(Polarity::Down),
        other => Err(format!("unknown polarity {:?} in votes table", other)),
    }
}

fn content_type_str(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Post => "post",
        ContentType::Comment => "comment",
    }
}

fn parse_content_type(raw: &str) -> Result<ContentType, String> {
    match raw {
        "post" => Ok(ContentType::Post),
        "comment" => Ok(ContentType::Comment),
        other => Err(format!("unknown content type {:?} in reports table", other)),
    }
}

fn report_category_str(category: ReportCategory) -> &'static str {
    match category {
        ReportCategory::HateSpeech => "hate-speech",
        ReportCategory::ReligiousExtremism => "religious-extremism",
        ReportCategory::SexualContent => "sexual-content",
        ReportCategory::BullyingHarassment => "bullying-harassment",
        ReportCategory::Spam => "spam",
        ReportCategory::Misinformation => "misinformation",
        ReportCategory::Other => "other",
    }
}

fn parse_report_category(raw: &str) -> Result<ReportCategory, String> {
    match raw {
        "hate-speech" => Ok(ReportCategory::HateSpeech),
        "religious-extremism" => Ok(ReportCategory::ReligiousExtremism),
        "sexual-content" => Ok(ReportCategory::SexualContent),
        "bullying-harassment" => Ok(ReportCategory::BullyingHarassment),
        "spam" => Ok(ReportCategory::Spam),
        "misinformation" => Ok(ReportCategory::Misinformation),
        "other" => Ok(ReportCategory::Other),
        other => Err(format!("unknown report category {:?}", other)),
    }
}

fn report_status_str(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Pending => "pending",
        ReportStatus::Reviewed => "reviewed",
        ReportStatus::Resolved => "resolved",
    }
}

fn parse_report_status(raw: &str) -> Result<ReportStatus, String> {
    match raw {
        "pending" => Ok(ReportStatus::Pending),
        "reviewed" => Ok(ReportStatus::Reviewed),
        "resolved" => Ok(ReportStatus::Resolved),
        other => Err(format!("unknown report status {:?}", other)),
    }
}

fn post_category_str(category: PostCategory) -> &'static str {
    match category {
        PostCategory::Academics => "academics",
        PostCategory::CampusLife => "campus-life",
        PostCategory::Events => "events",
        PostCategory::Question => "question",
        PostCategory::Complaint => "complaint",
        PostCategory::Discussion => "discussion",
        PostCategory::Other => "other",
    }
}

fn parse_post_category(raw: &str) -> Result<PostCategory, String> {
    match raw {
        "academics" => Ok(PostCategory::Academics),
        "campus-life" => Ok(PostCategory::CampusLife),
        "events" => Ok(PostCategory::Events),
        "question" => Ok(PostCategory::Question),
        "complaint" => Ok(PostCategory::Complaint),
        "discussion" => Ok(PostCategory::Discussion),
        other => Err(format!("unknown post category {:?}", other)),
    }
}

fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Result<Post, String> {
    let author_json: String = row.get("author");
    let author: AuthorSnapshot =
        serde_json::from_str(&author_json).map_err(|e| e.to_string())?;

    Ok(Post {
        id: row.get("id"),
        author,
        title: row.get("title"),
        text: row.get("body"),
        image_url: row.get("image_url"),
        category: parse_post_category(&row.get::<String, _>("category"))?,
        sticky: row.get("sticky"),
        created_at: row.get("created_at"),
        reactions: ReactionTally {
            upvotes: row.get::<i64, _>("upvotes") as u32,
            downvotes: row.get::<i64, _>("downvotes") as u32,
        },
        comments_count: row.get::<i64, _>("comments_count") as u32,
        report_count: row.get::<i64, _>("report_count") as u32,
        is_suspended: row.get("is_suspended"),
    })
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Result<Comment, String> {
    let author_json: String = row.get("author");
    let author: AuthorSnapshot =
        serde_json::from_str(&author_json).map_err(|e| e.to_string())?;

    Ok(Comment {
        post_id: row.get("post_id"),
        author,
        text: row.get("text"),
        created_at: row.get("created_at"),
        edited_at: row.get("edited_at"),
        reactions: ReactionTally {
            upvotes: row.get::<i64, _>("upvotes") as u32,
            downvotes: row.get::<i64, _>("downvotes") as u32,
        },
    })
}

fn row_to_report(row: &sqlx::sqlite::SqliteRow) -> Result<Report, String> {
    Ok(Report {
        id: row.get("id"),
        content_id: row.get("content_id"),
        content_type: parse_content_type(&row.get::<String, _>("content_type"))?,
        content_owner_id: row.get("content_owner_id"),
        reporter_id: row.get("reporter_id"),
        category: parse_report_category(&row.get::<String, _>("category"))?,
        reason: row.get("reason"),
        status: parse_report_status(&row.get::<String, _>("status"))?,
        created_at: row.get("created_at"),
    })
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Account {
    Account {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
        daily_post_count: row.get::<i64, _>("daily_post_count") as u32,
        monthly_image_post_count: row.get::<i64, _>("monthly_image_post_count") as u32,
        text_post_count: row.get::<i64, _>("text_post_count") as u32,
        is_banned: row.get("is_banned"),
        banned_at: row.get("banned_at"),
    }
}

// ============================================================================
// VOTES
// ============================================================================

#[async_trait]
impl VoteStore for SqliteForumStore {
    async fn get_vote(
        &self,
        target: &TargetRef,
        voter_id: &str,
    ) -> Result<Option<Polarity>, VoteError> {
        let (post_id, comment_author_id) = vote_columns(target);
        let row = sqlx::query(
            "SELECT polarity FROM votes WHERE post_id = ? AND comment_author_id = ? AND voter_id = ?",
        )
        .bind(post_id)
        .bind(comment_author_id)
        .bind(voter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?;

        match row {
            Some(row) => {
                let polarity = parse_polarity(&row.get::<String, _>("polarity"))
                    .map_err(VoteError::StoreUnavailable)?;
                Ok(Some(polarity))
            }
            None => Ok(None),
        }
    }

    async fn read_tally(&self, target: &TargetRef) -> Result<Option<TallySnapshot>, VoteError> {
        let row = match target {
            TargetRef::Post { post_id } => {
                sqlx::query("SELECT upvotes, downvotes, revision FROM posts WHERE id = ?")
                    .bind(post_id)
                    .fetch_optional(&self.pool)
                    .await
            }
            TargetRef::Comment { post_id, author_id } => sqlx::query(
                "SELECT upvotes, downvotes, revision FROM comments WHERE post_id = ? AND author_id = ?",
            )
            .bind(post_id)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await,
        }
        .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?;

        Ok(row.map(|row| TallySnapshot {
            tally: ReactionTally {
                upvotes: row.get::<i64, _>("upvotes") as u32,
                downvotes: row.get::<i64, _>("downvotes") as u32,
            },
            revision: row.get("revision"),
        }))
    }

    async fn commit_vote(
        &self,
        target: &TargetRef,
        voter_id: &str,
        change: VoteChange,
        tally: ReactionTally,
        expected_revision: i64,
    ) -> Result<bool, VoteError> {
        let (post_id, comment_author_id) = vote_columns(target);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?;

        match change {
            VoteChange::Cast(polarity) | VoteChange::Flip(polarity) => {
                sqlx::query(
                    r#"
                    INSERT INTO votes (post_id, comment_author_id, voter_id, polarity)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(post_id, comment_author_id, voter_id) DO UPDATE SET
                        polarity = excluded.polarity
                    "#,
                )
                .bind(post_id)
                .bind(comment_author_id)
                .bind(voter_id)
                .bind(polarity_str(polarity))
                .execute(&mut *tx)
                .await
                .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?;
            }
            VoteChange::Retract => {
                sqlx::query(
                    "DELETE FROM votes WHERE post_id = ? AND comment_author_id = ? AND voter_id = ?",
                )
                .bind(post_id)
                .bind(comment_author_id)
                .bind(voter_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?;
            }
        }

        // The conditional write: a stale revision touches nothing.
        let updated = match target {
            TargetRef::Post { post_id } => sqlx::query(
                "UPDATE posts SET upvotes = ?, downvotes = ?, revision = revision + 1 WHERE id = ? AND revision = ?",
            )
            .bind(tally.upvotes as i64)
            .bind(tally.downvotes as i64)
            .bind(post_id)
            .bind(expected_revision)
            .execute(&mut *tx)
            .await,
            TargetRef::Comment { post_id, author_id } => sqlx::query(
                "UPDATE comments SET upvotes = ?, downvotes = ?, revision = revision + 1 WHERE post_id = ? AND author_id = ? AND revision = ?",
            )
            .bind(tally.upvotes as i64)
            .bind(tally.downvotes as i64)
            .bind(post_id)
            .bind(author_id)
            .bind(expected_revision)
            .execute(&mut *tx)
            .await,
        }
        .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?
        .rows_affected();

        if updated == 0 {
            tx.rollback()
                .await
                .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?;
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| VoteError::StoreUnavailable(e.to_string()))?;
        Ok(true)
    }
}

// ============================================================================
// COMMENTS
// ============================================================================

#[async_trait]
impl CommentStore for SqliteForumStore {
    async fn insert_comment(&self, comment: Comment) -> Result<bool, CommentError> {
        let author_json = serde_json::to_string(&comment.author)
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;

        // Bumping the counter first doubles as the existence check; the
        // rollback below undoes it when the slot turns out to be taken.
        let bumped = sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
            .bind(&comment.post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?
            .rows_affected();

        if bumped == 0 {
            tx.rollback()
                .await
                .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;
            return Err(CommentError::NotFound(format!("post {}", comment.post_id)));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO comments (post_id, author_id, author, text, created_at, edited_at, upvotes, downvotes, revision)
            VALUES (?, ?, ?, ?, ?, NULL, 0, 0, 0)
            ON CONFLICT(post_id, author_id) DO NOTHING
            "#,
        )
        .bind(&comment.post_id)
        .bind(&comment.author.id)
        .bind(&author_json)
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?
        .rows_affected();

        if inserted == 0 {
            tx.rollback()
                .await
                .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;
            return Ok(false);
        }

        tx.commit()
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;
        Ok(true)
    }

    async fn get_comment(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> Result<Option<Comment>, CommentError> {
        let row = sqlx::query("SELECT * FROM comments WHERE post_id = ? AND author_id = ?")
            .bind(post_id)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(
                row_to_comment(&row).map_err(CommentError::StoreUnavailable)?,
            )),
            None => Ok(None),
        }
    }

    async fn update_comment_text(
        &self,
        post_id: &str,
        author_id: &str,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<bool, CommentError> {
        let updated = sqlx::query(
            "UPDATE comments SET text = ?, edited_at = ? WHERE post_id = ? AND author_id = ?",
        )
        .bind(text)
        .bind(edited_at)
        .bind(post_id)
        .bind(author_id)
        .execute(&self.pool)
        .await
        .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn delete_comment(&self, post_id: &str, author_id: &str) -> Result<bool, CommentError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;

        let removed = sqlx::query("DELETE FROM comments WHERE post_id = ? AND author_id = ?")
            .bind(post_id)
            .bind(author_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?
            .rows_affected();

        if removed == 0 {
            tx.rollback()
                .await
                .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query("UPDATE posts SET comments_count = MAX(comments_count - 1, 0) WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;
        Ok(true)
    }

    async fn comments_for_post(&self, post_id: &str) -> Result<Vec<Comment>, CommentError> {
        let rows = sqlx::query("SELECT * FROM comments WHERE post_id = ? ORDER BY created_at ASC")
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CommentError::StoreUnavailable(e.to_string()))?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row_to_comment(&row).map_err(CommentError::StoreUnavailable)?);
        }
        Ok(comments)
    }
}

// ============================================================================
// REPORTS
// ============================================================================

#[async_trait]
impl ReportStore for SqliteForumStore {
    async fn find_report(
        &self,
        content_id: &str,
        reporter_id: &str,
    ) -> Result<Option<Report>, ReportError> {
        let row = sqlx::query("SELECT * FROM reports WHERE content_id = ? AND reporter_id = ?")
            .bind(content_id)
            .bind(reporter_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(
                row_to_report(&row).map_err(ReportError::StoreUnavailable)?,
            )),
            None => Ok(None),
        }
    }

    async fn insert_report(
        &self,
        report: Report,
        escalate_post: Option<&str>,
        suspend_threshold: u32,
    ) -> Result<ReportInsert, ReportError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO reports (id, content_id, content_type, content_owner_id, reporter_id, category, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_id, reporter_id) DO NOTHING
            "#,
        )
        .bind(&report.id)
        .bind(&report.content_id)
        .bind(content_type_str(report.content_type))
        .bind(&report.content_owner_id)
        .bind(&report.reporter_id)
        .bind(report_category_str(report.category))
        .bind(&report.reason)
        .bind(report_status_str(report.status))
        .bind(report.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?
        .rows_affected();

        if inserted == 0 {
            tx.rollback()
                .await
                .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?;
            return Ok(ReportInsert::Duplicate);
        }

        let mut escalation = None;
        if let Some(post_id) = escalate_post {
            let bumped = sqlx::query(
                r#"
                UPDATE posts SET
                    report_count = report_count + 1,
                    is_suspended = CASE WHEN report_count + 1 >= ? THEN 1 ELSE is_suspended END
                WHERE id = ?
                "#,
            )
            .bind(suspend_threshold as i64)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?
            .rows_affected();

            // A missing escalation target is skipped, the report still lands.
            if bumped > 0 {
                let row = sqlx::query("SELECT report_count, is_suspended FROM posts WHERE id = ?")
                    .bind(post_id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?;
                escalation = Some(EscalationState {
                    report_count: row.get::<i64, _>("report_count") as u32,
                    suspended: row.get("is_suspended"),
                });
            }
        }

        tx.commit()
            .await
            .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?;
        Ok(ReportInsert::Filed { escalation })
    }

    async fn delete_report(&self, report_id: &str) -> Result<bool, ReportError> {
        let removed = sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(report_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?
            .rows_affected();

        Ok(removed > 0)
    }

    async fn list_reports(&self) -> Result<Vec<Report>, ReportError> {
        let rows = sqlx::query("SELECT * FROM reports ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReportError::StoreUnavailable(e.to_string()))?;

        let mut reports = Vec::new();
        for row in rows {
            reports.push(row_to_report(&row).map_err(ReportError::StoreUnavailable)?);
        }
        Ok(reports)
    }
}

// ============================================================================
// POSTS
// ============================================================================

#[async_trait]
impl PostStore for SqliteForumStore {
    async fn insert_post(&self, post: Post) -> Result<(), PostError> {
        let author_json = serde_json::to_string(&post.author)
            .map_err(|e| PostError::StoreUnavailable(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO posts (
                id, author_id, author, title, body, image_url, category, sticky,
                created_at, upvotes, downvotes, comments_count, report_count,
                is_suspended, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&post.id)
        .bind(&post.author.id)
        .bind(&author_json)
        .bind(&post.title)
        .bind(&post.text)
        .bind(&post.image_url)
        .bind(post_category_str(post.category))
        .bind(post.sticky)
        .bind(post.created_at)
        .bind(post.reactions.upvotes as i64)
        .bind(post.reactions.downvotes as i64)
        .bind(post.comments_count as i64)
        .bind(post.report_count as i64)
        .bind(post.is_suspended)
        .execute(&self.pool)
        .await
        .map_err(|e| PostError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>, PostError> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PostError::StoreUnavailable(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(row_to_post(&row).map_err(PostError::StoreUnavailable)?)),
            None => Ok(None),
        }
    }

    async fn list_posts(
        &self,
        limit: usize,
        include_suspended: bool,
    ) -> Result<Vec<Post>, PostError> {
        let rows = if include_suspended {
            sqlx::query("SELECT * FROM posts ORDER BY created_at DESC LIMIT ?")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query(
                "SELECT * FROM posts WHERE is_suspended = 0 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| PostError::StoreUnavailable(e.to_string()))?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row_to_post(&row).map_err(PostError::StoreUnavailable)?);
        }
        Ok(posts)
    }

    async fn posts_by_author(&self, author_id: &str) -> Result<Vec<Post>, PostError> {
        let rows = sqlx::query("SELECT * FROM posts WHERE author_id = ? ORDER BY created_at DESC")
            .bind(author_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PostError::StoreUnavailable(e.to_string()))?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row_to_post(&row).map_err(PostError::StoreUnavailable)?);
        }
        Ok(posts)
    }

    async fn apply_patch(&self, post_id: &str, patch: PostPatch) -> Result<bool, PostError> {
        let current = match self.get_post(post_id).await? {
            Some(post) => post,
            None => return Ok(false),
        };

        let title = patch.title.unwrap_or(current.title);
        let body = patch.text.unwrap_or(current.text);
        let category = patch.category.unwrap_or(current.category);
        let sticky = patch.sticky.unwrap_or(current.sticky);

        let updated = sqlx::query(
            "UPDATE posts SET title = ?, body = ?, category = ?, sticky = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&body)
        .bind(post_category_str(category))
        .bind(sticky)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PostError::StoreUnavailable(e.to_string()))?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn delete_post(&self, post_id: &str) -> Result<bool, PostError> {
        let removed = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PostError::StoreUnavailable(e.to_string()))?
            .rows_affected();

        Ok(removed > 0)
    }
}

// ============================================================================
// ACCOUNTS
// ============================================================================

#[async_trait]
impl AccountStore for SqliteForumStore {
    async fn ensure_account(&self, account: Account) -> Result<Account, AccountError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, name, email, avatar_url, created_at, daily_post_count,
                monthly_image_post_count, text_post_count, is_banned, banned_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.avatar_url)
        .bind(account.created_at)
        .bind(account.daily_post_count as i64)
        .bind(account.monthly_image_post_count as i64)
        .bind(account.text_post_count as i64)
        .bind(account.is_banned)
        .bind(account.banned_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::StoreUnavailable(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(&account.id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AccountError::StoreUnavailable(e.to_string()))?;

        Ok(row_to_account(&row))
    }

    async fn get_account(&self, user_id: &str) -> Result<Option<Account>, AccountError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccountError::StoreUnavailable(e.to_string()))?;

        Ok(row.map(|row| row_to_account(&row)))
    }

    async fn set_banned(
        &self,
        user_id: &str,
        banned: bool,
        banned_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AccountError> {
        let updated = sqlx::query("UPDATE accounts SET is_banned = ?, banned_at = ? WHERE id = ?")
            .bind(banned)
            .bind(banned_at)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AccountError::StoreUnavailable(e.to_string()))?
            .rows_affected();

        Ok(updated > 0)
    }

    async fn charge_post_quota(
        &self,
        user_id: &str,
        image_post: bool,
        daily_limit: u32,
        monthly_image_limit: u32,
    ) -> Result<QuotaCharge, AccountError> {
        // Single conditional UPDATE: the quota check and the bump cannot be
        // split by a concurrent writer.
        let charged = sqlx::query(
            r#"
            UPDATE accounts SET
                daily_post_count = daily_post_count + 1,
                monthly_image_post_count = monthly_image_post_count + CASE WHEN ?1 THEN 1 ELSE 0 END,
                text_post_count = text_post_count + CASE WHEN ?1 THEN 0 ELSE 1 END
            WHERE id = ?2
              AND daily_post_count < ?3
              AND (NOT ?1 OR monthly_image_post_count < ?4)
            "#,
        )
        .bind(image_post)
        .bind(user_id)
        .bind(daily_limit as i64)
        .bind(monthly_image_limit as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::StoreUnavailable(e.to_string()))?
        .rows_affected();

        if charged > 0 {
            return Ok(QuotaCharge::Charged);
        }

        // Nothing moved: either the account is missing or a quota is full.
        let row = sqlx::query(
            "SELECT daily_post_count, monthly_image_post_count FROM accounts WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::StoreUnavailable(e.to_string()))?
        .ok_or_else(|| AccountError::NotFound(user_id.to_string()))?;

        if (row.get::<i64, _>("daily_post_count") as u32) >= daily_limit {
            Ok(QuotaCharge::DailyExhausted)
        } else {
            Ok(QuotaCharge::MonthlyImageExhausted)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, SqliteForumStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.db");
        let store = SqliteForumStore::new(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    fn snapshot(id: &str) -> AuthorSnapshot {
        AuthorSnapshot {
            id: id.to_string(),
            name: "Test".to_string(),
            email: format!("{}@student.example.edu", id),
            avatar_url: None,
        }
    }

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            author: snapshot("author"),
            title: "title".to_string(),
            text: Some("body".to_string()),
            image_url: None,
            category: PostCategory::Question,
            sticky: false,
            created_at: Utc::now(),
            reactions: ReactionTally::default(),
            comments_count: 0,
            report_count: 0,
            is_suspended: false,
        }
    }

    fn comment(post_id: &str, author_id: &str) -> Comment {
        Comment {
            post_id: post_id.to_string(),
            author: snapshot(author_id),
            text: "hello".to_string(),
            created_at: Utc::now(),
            edited_at: None,
            reactions: ReactionTally::default(),
        }
    }

    fn report(id: &str, content_id: &str, reporter_id: &str) -> Report {
        Report {
            id: id.to_string(),
            content_id: content_id.to_string(),
            content_type: ContentType::Post,
            content_owner_id: "owner".to_string(),
            reporter_id: reporter_id.to_string(),
            category: ReportCategory::Misinformation,
            reason: None,
            status: ReportStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn post_round_trips_through_sqlite() {
        let (_dir, store) = temp_store().await;
        let original = post("p1");

        store.insert_post(original.clone()).await.unwrap();
        let loaded = store.get_post("p1").await.unwrap().unwrap();

        assert_eq!(loaded.title, original.title);
        assert_eq!(loaded.author, original.author);
        assert_eq!(loaded.category, original.category);
        assert_eq!(loaded.reactions, ReactionTally::default());
    }

    #[tokio::test]
    async fn stale_revision_commit_is_refused() {
        let (_dir, store) = temp_store().await;
        store.insert_post(post("p1")).await.unwrap();
        let target = TargetRef::post("p1");

        let snap = store.read_tally(&target).await.unwrap().unwrap();
        let tally = snap.tally.add(Polarity::Up);

        assert!(store
            .commit_vote(&target, "v1", VoteChange::Cast(Polarity::Up), tally, snap.revision)
            .await
            .unwrap());
        assert!(!store
            .commit_vote(&target, "v2", VoteChange::Cast(Polarity::Up), tally, snap.revision)
            .await
            .unwrap());

        // The losing commit left no vote row behind.
        assert!(store.get_vote(&target, "v2").await.unwrap().is_none());
        let reread = store.read_tally(&target).await.unwrap().unwrap();
        assert_eq!(reread.tally.upvotes, 1);
        assert_eq!(reread.revision, snap.revision + 1);
    }

    #[tokio::test]
    async fn comment_insert_is_atomic_with_the_counter() {
        let (_dir, store) = temp_store().await;
        store.insert_post(post("p1")).await.unwrap();

        assert!(store.insert_comment(comment("p1", "a")).await.unwrap());
        // Second write into the same slot rolls the counter bump back.
        assert!(!store.insert_comment(comment("p1", "a")).await.unwrap());

        let stored = store.get_post("p1").await.unwrap().unwrap();
        assert_eq!(stored.comments_count, 1);

        // No post, no comment, no counter anywhere.
        let err = store.insert_comment(comment("p404", "a")).await.unwrap_err();
        assert!(matches!(err, CommentError::NotFound(_)));
        assert!(store.get_comment("p404", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn escalation_suspends_exactly_at_threshold() {
        let (_dir, store) = temp_store().await;
        store.insert_post(post("p1")).await.unwrap();

        for n in 1..=4 {
            store
                .insert_report(
                    report(&format!("id-{}", n), "p1", &format!("r{}", n)),
                    Some("p1"),
                    5,
                )
                .await
                .unwrap();
        }
        let stored = store.get_post("p1").await.unwrap().unwrap();
        assert_eq!(stored.report_count, 4);
        assert!(!stored.is_suspended);

        let outcome = store
            .insert_report(report("id-5", "p1", "r5"), Some("p1"), 5)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReportInsert::Filed {
                escalation: Some(EscalationState {
                    report_count: 5,
                    suspended: true
                })
            }
        );

        let stored = store.get_post("p1").await.unwrap().unwrap();
        assert!(stored.is_suspended);
    }

    #[tokio::test]
    async fn duplicate_report_leaves_the_counter_alone() {
        let (_dir, store) = temp_store().await;
        store.insert_post(post("p1")).await.unwrap();

        store
            .insert_report(report("id-1", "p1", "r1"), Some("p1"), 5)
            .await
            .unwrap();
        let outcome = store
            .insert_report(report("id-2", "p1", "r1"), Some("p1"), 5)
            .await
            .unwrap();

        assert_eq!(outcome, ReportInsert::Duplicate);
        let stored = store.get_post("p1").await.unwrap().unwrap();
        assert_eq!(stored.report_count, 1);
        // The duplicate's id never made it in.
        assert!(!store.delete_report("id-2").await.unwrap());
    }

    #[tokio::test]
    async fn quota_charge_is_a_single_conditional_update() {
        let (_dir, store) = temp_store().await;
        let account = Account::new(&crate::core::identity::Principal {
            id: "user-1".to_string(),
            name: "Test".to_string(),
            email: "t@student.example.edu".to_string(),
            avatar_url: None,
        });
        store.ensure_account(account).await.unwrap();

        assert_eq!(
            store.charge_post_quota("user-1", false, 2, 2).await.unwrap(),
            QuotaCharge::Charged
        );
        assert_eq!(
            store.charge_post_quota("user-1", true, 2, 2).await.unwrap(),
            QuotaCharge::Charged
        );
        assert_eq!(
            store.charge_post_quota("user-1", false, 2, 2).await.unwrap(),
            QuotaCharge::DailyExhausted
        );

        let stored = store.get_account("user-1").await.unwrap().unwrap();
        assert_eq!(stored.daily_post_count, 2);
        assert_eq!(stored.monthly_image_post_count, 1);
        assert_eq!(stored.text_post_count, 1);

        let err = store
            .charge_post_quota("ghost", false, 2, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));
    }

    #[tokio::test]
    async fn data_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.db");

        {
            let store = SqliteForumStore::new(path.to_str().unwrap()).await.unwrap();
            store.insert_post(post("p1")).await.unwrap();
            store.insert_comment(comment("p1", "a")).await.unwrap();
        }

        let store = SqliteForumStore::new(path.to_str().unwrap()).await.unwrap();
        let stored = store.get_post("p1").await.unwrap().unwrap();
        assert_eq!(stored.comments_count, 1);
        let comments = store.comments_for_post("p1").await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "hello");
    }

    #[tokio::test]
    async fn edit_sets_edited_at_and_keeps_created_at() {
        let (_dir, store) = temp_store().await;
        store.insert_post(post("p1")).await.unwrap();
        let original = comment("p1", "a");
        store.insert_comment(original.clone()).await.unwrap();

        assert!(store
            .update_comment_text("p1", "a", "hello world", Utc::now())
            .await
            .unwrap());

        let stored = store.get_comment("p1", "a").await.unwrap().unwrap();
        assert_eq!(stored.text, "hello world");
        assert!(stored.edited_at.is_some());
        assert_eq!(
            stored.created_at.timestamp_millis(),
            original.created_at.timestamp_millis()
        );
    }
}
