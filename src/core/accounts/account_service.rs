// Account directory - user documents and admin ban controls.

use super::account_models::{Account, QuotaCharge};
use crate::core::identity::Principal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("this operation requires a signed-in user")]
    Unauthenticated,

    #[error("account {0} not found")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence contract for account documents.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert the account unless one already exists for its id; returns the
    /// stored document either way.
    async fn ensure_account(&self, account: Account) -> Result<Account, AccountError>;

    async fn get_account(&self, user_id: &str) -> Result<Option<Account>, AccountError>;

    /// Flip the ban flag. Returns `Ok(false)` when the account is missing.
    async fn set_banned(
        &self,
        user_id: &str,
        banned: bool,
        banned_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AccountError>;

    /// Atomically check the posting quotas and, if there is room, bump the
    /// counters (daily always; monthly-image or lifetime-text depending on
    /// the post kind). Fails with `NotFound` when the account is missing.
    async fn charge_post_quota(
        &self,
        user_id: &str,
        image_post: bool,
        daily_limit: u32,
        monthly_image_limit: u32,
    ) -> Result<QuotaCharge, AccountError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Account lookups plus the admin-facing ban switch.
pub struct AccountDirectory<S: AccountStore> {
    store: S,
}

impl<S: AccountStore> AccountDirectory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create the account document on first sight of a principal. Idempotent:
    /// an existing document is returned unchanged, counters intact.
    pub async fn ensure_account(&self, principal: &Principal) -> Result<Account, AccountError> {
        if principal.is_anonymous() {
            return Err(AccountError::Unauthenticated);
        }
        self.store.ensure_account(Account::new(principal)).await
    }

    pub async fn get_account(&self, user_id: &str) -> Result<Account, AccountError> {
        self.store
            .get_account(user_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(user_id.to_string()))
    }

    /// Ban a member. Banned members keep their content; the auth collaborator
    /// refuses them at the door.
    pub async fn ban_user(&self, user_id: &str) -> Result<(), AccountError> {
        if !self.store.set_banned(user_id, true, Some(Utc::now())).await? {
            return Err(AccountError::NotFound(user_id.to_string()));
        }
        tracing::info!(user_id, "user banned");
        Ok(())
    }

    pub async fn unban_user(&self, user_id: &str) -> Result<(), AccountError> {
        if !self.store.set_banned(user_id, false, None).await? {
            return Err(AccountError::NotFound(user_id.to_string()));
        }
        tracing::info!(user_id, "user unbanned");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
