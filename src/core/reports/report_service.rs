// Report desk - core business logic for abuse reports.
//
// This service handles:
// - Filing reports (self-report rejection, category validation, dedup)
// - Automatic suspension once a post accumulates enough reports
// - Moderator operations: dismiss, list
//
// Escalation is post-only: reports against comments are recorded and
// counted per reporter, but nothing flips on the comment itself. That
// mirrors the observed product behavior and is flagged in DESIGN.md.

use super::report_models::{
    ContentType, EscalationState, NewReport, Report, ReportCategory, ReportInsert, ReportStatus,
};
use crate::core::identity::Principal;
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

/// Reports on a post at or beyond this count suspend it.
pub const SUSPEND_REPORT_THRESHOLD: u32 = 5;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("reporting requires a signed-in user")]
    Unauthenticated,

    #[error("you cannot report your own {0}")]
    SelfReport(ContentType),

    #[error("a reason is required when reporting as \"other\"")]
    MissingReason,

    #[error("you have already reported this content")]
    DuplicateReport,

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence contract for reports.
///
/// The report identity is `(content_id, reporter_id)`; the store must reject
/// a second insert for the same pair even when two file attempts race past
/// the service-level dedup query.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// The reporter's existing report on the content, if any.
    async fn find_report(
        &self,
        content_id: &str,
        reporter_id: &str,
    ) -> Result<Option<Report>, ReportError>;

    /// Persist the report. When `escalate_post` names a post, bump its
    /// report_count and set is_suspended once the new count reaches
    /// `suspend_threshold`, all in the same atomic step as the insert. A
    /// missing escalation target is skipped, not an error - the report
    /// still stands.
    async fn insert_report(
        &self,
        report: Report,
        escalate_post: Option<&str>,
        suspend_threshold: u32,
    ) -> Result<ReportInsert, ReportError>;

    /// Delete a report by id. Returns `Ok(false)` when no such report.
    async fn delete_report(&self, report_id: &str) -> Result<bool, ReportError>;

    /// Every report on file, newest first.
    async fn list_reports(&self) -> Result<Vec<Report>, ReportError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Files, deduplicates and escalates abuse reports.
pub struct ReportDesk<S: ReportStore> {
    store: S,
}

impl<S: ReportStore> ReportDesk<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// File a report against a piece of content.
    ///
    /// Post targets accumulate a report counter; crossing
    /// `SUSPEND_REPORT_THRESHOLD` suspends the post in the same step.
    pub async fn file_report(
        &self,
        reporter: &Principal,
        new: NewReport,
    ) -> Result<Report, ReportError> {
        if reporter.is_anonymous() {
            return Err(ReportError::Unauthenticated);
        }
        if reporter.id == new.content_owner_id {
            return Err(ReportError::SelfReport(new.content_type));
        }

        let reason = new.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        if new.category == ReportCategory::Other && reason.is_none() {
            return Err(ReportError::MissingReason);
        }

        if self
            .store
            .find_report(&new.content_id, &reporter.id)
            .await?
            .is_some()
        {
            return Err(ReportError::DuplicateReport);
        }

        let report = Report {
            id: Uuid::new_v4().to_string(),
            content_id: new.content_id.clone(),
            content_type: new.content_type,
            content_owner_id: new.content_owner_id,
            reporter_id: reporter.id.clone(),
            category: new.category,
            reason: reason.map(str::to_string),
            status: ReportStatus::Pending,
            created_at: Utc::now(),
        };

        let escalate_post =
            (new.content_type == ContentType::Post).then_some(new.content_id.as_str());

        match self
            .store
            .insert_report(report.clone(), escalate_post, SUSPEND_REPORT_THRESHOLD)
            .await?
        {
            // Two file attempts raced; the structural key caught the loser.
            ReportInsert::Duplicate => Err(ReportError::DuplicateReport),
            ReportInsert::Filed { escalation } => {
                if let Some(EscalationState {
                    report_count,
                    suspended: true,
                }) = escalation
                {
                    if report_count == SUSPEND_REPORT_THRESHOLD {
                        tracing::warn!(
                            post_id = %report.content_id,
                            report_count,
                            "post suspended after reaching the report threshold"
                        );
                    }
                }
                tracing::info!(
                    content_id = %report.content_id,
                    content_type = %report.content_type,
                    category = %report.category,
                    "report filed"
                );
                Ok(report)
            }
        }
    }

    /// Drop a report without touching the reported content.
    pub async fn dismiss_report(&self, report_id: &str) -> Result<(), ReportError> {
        if !self.store.delete_report(report_id).await? {
            return Err(ReportError::NotFound(format!("report {}", report_id)));
        }
        tracing::info!(report_id, "report dismissed");
        Ok(())
    }

    /// Every report on file, newest first.
    pub async fn list_reports(&self) -> Result<Vec<Report>, ReportError> {
        self.store.list_reports().await
    }
}

// ============================================================================
// TESTS
// ============================================================================
