// Report domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of content a report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Comment,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Post => write!(f, "post"),
            ContentType::Comment => write!(f, "comment"),
        }
    }
}

/// Why the content was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportCategory {
    HateSpeech,
    ReligiousExtremism,
    SexualContent,
    BullyingHarassment,
    Spam,
    Misinformation,
    /// Requires a free-text reason.
    Other,
}

impl std::fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReportCategory::HateSpeech => "hate-speech",
            ReportCategory::ReligiousExtremism => "religious-extremism",
            ReportCategory::SexualContent => "sexual-content",
            ReportCategory::BullyingHarassment => "bullying-harassment",
            ReportCategory::Spam => "spam",
            ReportCategory::Misinformation => "misinformation",
            ReportCategory::Other => "other",
        };
        write!(f, "{}", label)
    }
}

/// Review lifecycle of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
}

/// A filed abuse report.
///
/// At most one per `(content_id, reporter_id)` pair - a reporter cannot
/// report the same content twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub content_id: String,
    pub content_type: ContentType,
    pub content_owner_id: String,
    pub reporter_id: String,
    pub category: ReportCategory,
    pub reason: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields of a report being filed.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub content_id: String,
    pub content_type: ContentType,
    pub content_owner_id: String,
    pub category: ReportCategory,
    pub reason: Option<String>,
}

/// What the store did with an insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportInsert {
    /// Report persisted. For post targets carries the escalation state
    /// observed in the same atomic step.
    Filed { escalation: Option<EscalationState> },
    /// The `(content_id, reporter_id)` pair already holds a report.
    Duplicate,
}

/// Post counter state right after a report landed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationState {
    pub report_count: u32,
    pub suspended: bool,
}
