// Account domain models.

use crate::core::identity::Principal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A member's account document.
///
/// Quota counters are charged when a post is created; the windows are reset
/// by an out-of-band job that is not part of this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub daily_post_count: u32,
    pub monthly_image_post_count: u32,
    pub text_post_count: u32,
    pub is_banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Fresh account document for a first-time visitor.
    pub fn new(principal: &Principal) -> Self {
        Self {
            id: principal.id.clone(),
            name: principal.name.clone(),
            email: principal.email.clone(),
            avatar_url: principal.avatar_url.clone(),
            created_at: Utc::now(),
            daily_post_count: 0,
            monthly_image_post_count: 0,
            text_post_count: 0,
            is_banned: false,
            banned_at: None,
        }
    }
}

/// Outcome of an atomic quota check-and-charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCharge {
    /// Counters bumped, the post may be created.
    Charged,
    /// The account is at its daily post limit.
    DailyExhausted,
    /// The account is at its monthly image post limit.
    MonthlyImageExhausted,
}
