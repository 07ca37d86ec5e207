// The composition root: one store, five services.
//
// Callers construct a store (in-memory or SQLite), hand it to `Forum::new`,
// and get the whole service layer wired up - the same shape the UI layer
// consumes.

use crate::core::accounts::{AccountDirectory, AccountStore};
use crate::core::comments::{CommentGate, CommentStore};
use crate::core::posts::{PostBoard, PostStore};
use crate::core::reports::{ReportDesk, ReportStore};
use crate::core::voting::{VoteLedger, VoteStore};

/// A backend that can serve every service in the crate. Blanket-implemented,
/// so any type implementing the five ports qualifies.
pub trait ForumStore:
    VoteStore + CommentStore + ReportStore + PostStore + AccountStore
{
}

impl<T> ForumStore for T where
    T: VoteStore + CommentStore + ReportStore + PostStore + AccountStore
{
}

/// The full service layer over a single shared store.
pub struct Forum<S: ForumStore + Clone> {
    pub votes: VoteLedger<S>,
    pub comments: CommentGate<S>,
    pub reports: ReportDesk<S>,
    pub board: PostBoard<S, S>,
    pub accounts: AccountDirectory<S>,
}

impl<S: ForumStore + Clone> Forum<S> {
    pub fn new(store: S) -> Self {
        Self {
            votes: VoteLedger::new(store.clone()),
            comments: CommentGate::new(store.clone()),
            reports: ReportDesk::new(store.clone()),
            board: PostBoard::new(store.clone(), store.clone()),
            accounts: AccountDirectory::new(store),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
