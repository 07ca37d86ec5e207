// Voting domain models - data structures for the vote ledger.
//
// These are pure domain types with no storage dependencies. The infra layer
// maps them onto whatever the backing store uses.

use serde::{Deserialize, Serialize};

/// Which way a vote points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Up,
    Down,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarity::Up => write!(f, "up"),
            Polarity::Down => write!(f, "down"),
        }
    }
}

/// Anything that can carry votes: a post, or a comment addressed by its
/// single-slot key (post id + comment author id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetRef {
    Post { post_id: String },
    Comment { post_id: String, author_id: String },
}

impl TargetRef {
    pub fn post(post_id: impl Into<String>) -> Self {
        TargetRef::Post {
            post_id: post_id.into(),
        }
    }

    pub fn comment(post_id: impl Into<String>, author_id: impl Into<String>) -> Self {
        TargetRef::Comment {
            post_id: post_id.into(),
            author_id: author_id.into(),
        }
    }

    /// Short human-readable description, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TargetRef::Post { post_id } => format!("post {}", post_id),
            TargetRef::Comment { post_id, author_id } => {
                format!("comment by {} on post {}", author_id, post_id)
            }
        }
    }
}

/// Up/down counters carried by every votable target.
///
/// Counters never go negative - removals saturate at zero, which shields the
/// tally from drift after partial failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    pub upvotes: u32,
    pub downvotes: u32,
}

impl ReactionTally {
    /// Count one vote of the given polarity.
    pub fn add(mut self, polarity: Polarity) -> Self {
        match polarity {
            Polarity::Up => self.upvotes += 1,
            Polarity::Down => self.downvotes += 1,
        }
        self
    }

    /// Uncount one vote of the given polarity, flooring at zero.
    pub fn remove(mut self, polarity: Polarity) -> Self {
        match polarity {
            Polarity::Up => self.upvotes = self.upvotes.saturating_sub(1),
            Polarity::Down => self.downvotes = self.downvotes.saturating_sub(1),
        }
        self
    }
}

/// The mutation `cast_vote` decided on for the voter's ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    /// First vote on this target: create the record.
    Cast(Polarity),
    /// Re-vote with the opposite polarity: update the record in place.
    Flip(Polarity),
    /// Re-vote with the same polarity: toggle off, delete the record.
    Retract,
}

/// A tally read paired with the revision it was read at.
///
/// `commit_vote` only applies when the target's revision is still the one
/// snapshotted here, which turns the read-modify-write into a conditional
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallySnapshot {
    pub tally: ReactionTally,
    pub revision: i64,
}
