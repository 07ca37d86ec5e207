// Vote ledger - core business logic for one-vote-per-user tallies.
//
// This service handles:
// - First votes (create the record, count it)
// - Toggle-off (same polarity twice removes the vote)
// - Polarity flips (up -> down moves one count across)
//
// Every mutation runs as an optimistic read-modify-write: the tally is read
// together with a revision, and the store only commits when that revision is
// still current. Lost races are retried a bounded number of times.

use super::voting_models::{Polarity, ReactionTally, TallySnapshot, TargetRef, VoteChange};
use async_trait::async_trait;
use thiserror::Error;

/// How many revision conflicts `cast_vote` absorbs before giving up.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("voting requires a signed-in user")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence contract for vote records and target tallies.
///
/// The vote record identity is `(target, voter_id)` - the store must never
/// hold two live records for the same pair. `commit_vote` is the only write
/// path and must apply the record change and the new tally as one atomic
/// step, conditional on the target's revision.
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// The voter's live vote on the target, if any.
    async fn get_vote(
        &self,
        target: &TargetRef,
        voter_id: &str,
    ) -> Result<Option<Polarity>, VoteError>;

    /// Current tally plus the revision it was read at. `None` when the
    /// target does not exist.
    async fn read_tally(&self, target: &TargetRef) -> Result<Option<TallySnapshot>, VoteError>;

    /// Atomically apply `change` to the voter's record and write `tally`
    /// onto the target, but only if the target's revision still equals
    /// `expected_revision`. Returns `false` when another writer got there
    /// first (the caller re-reads and retries).
    async fn commit_vote(
        &self,
        target: &TargetRef,
        voter_id: &str,
        change: VoteChange,
        tally: ReactionTally,
        expected_revision: i64,
    ) -> Result<bool, VoteError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Keeps the one-live-vote-per-(target, voter) invariant and the aggregate
/// tally in lockstep.
pub struct VoteLedger<S: VoteStore> {
    store: S,
}

impl<S: VoteStore> VoteLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cast, flip, or toggle off a vote and return the resulting tally.
    ///
    /// Casting the same polarity twice in a row removes the vote, so the
    /// tally returns to what it was before the first cast.
    pub async fn cast_vote(
        &self,
        target: &TargetRef,
        voter_id: &str,
        polarity: Polarity,
    ) -> Result<ReactionTally, VoteError> {
        if voter_id.trim().is_empty() {
            return Err(VoteError::Unauthenticated);
        }

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let existing = self.store.get_vote(target, voter_id).await?;
            let snapshot = self
                .store
                .read_tally(target)
                .await?
                .ok_or_else(|| VoteError::NotFound(target.describe()))?;

            let (change, tally) = next_vote_state(existing, polarity, snapshot.tally);

            if self
                .store
                .commit_vote(target, voter_id, change, tally, snapshot.revision)
                .await?
            {
                return Ok(tally);
            }

            tracing::debug!(
                attempt,
                target = %target.describe(),
                "vote commit lost a revision race, retrying"
            );
        }

        Err(VoteError::StoreUnavailable(format!(
            "vote on {} kept conflicting after {} attempts",
            target.describe(),
            MAX_COMMIT_ATTEMPTS
        )))
    }

    /// The voter's current stance on the target. Pure read, no side effects.
    /// An anonymous caller simply has no vote.
    pub async fn vote_of(
        &self,
        target: &TargetRef,
        voter_id: &str,
    ) -> Result<Option<Polarity>, VoteError> {
        if voter_id.trim().is_empty() {
            return Ok(None);
        }
        self.store.get_vote(target, voter_id).await
    }
}

/// Decide what happens to the voter's record and the tally.
fn next_vote_state(
    existing: Option<Polarity>,
    polarity: Polarity,
    tally: ReactionTally,
) -> (VoteChange, ReactionTally) {
    match existing {
        None => (VoteChange::Cast(polarity), tally.add(polarity)),
        Some(current) if current == polarity => (VoteChange::Retract, tally.remove(polarity)),
        Some(current) => (
            VoteChange::Flip(polarity),
            tally.add(polarity).remove(current),
        ),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-memory store for testing. Revisions are honored so the optimistic
    /// loop is exercised for real.
    struct MockVoteStore {
        targets: DashMap<TargetRef, TallySnapshot>,
        votes: DashMap<(TargetRef, String), Polarity>,
        /// Number of commits to reject up front, to simulate lost races.
        reject_commits: AtomicU32,
    }

    impl MockVoteStore {
        fn with_target(target: TargetRef) -> Self {
            let store = Self {
                targets: DashMap::new(),
                votes: DashMap::new(),
                reject_commits: AtomicU32::new(0),
            };
            store.targets.insert(
                target,
                TallySnapshot {
                    tally: ReactionTally::default(),
                    revision: 0,
                },
            );
            store
        }

        fn live_votes(&self, target: &TargetRef) -> usize {
            self.votes
                .iter()
                .filter(|entry| &entry.key().0 == target)
                .count()
        }
    }

    #[async_trait]
    impl VoteStore for MockVoteStore {
        async fn get_vote(
            &self,
            target: &TargetRef,
            voter_id: &str,
        ) -> Result<Option<Polarity>, VoteError> {
            Ok(self
                .votes
                .get(&(target.clone(), voter_id.to_string()))
                .map(|entry| *entry))
        }

        async fn read_tally(
            &self,
            target: &TargetRef,
        ) -> Result<Option<TallySnapshot>, VoteError> {
            Ok(self.targets.get(target).map(|entry| *entry))
        }

        async fn commit_vote(
            &self,
            target: &TargetRef,
            voter_id: &str,
            change: VoteChange,
            tally: ReactionTally,
            expected_revision: i64,
        ) -> Result<bool, VoteError> {
            if self
                .reject_commits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(false);
            }

            let mut entry = self
                .targets
                .get_mut(target)
                .ok_or_else(|| VoteError::NotFound(target.describe()))?;
            if entry.revision != expected_revision {
                return Ok(false);
            }

            let key = (target.clone(), voter_id.to_string());
            match change {
                VoteChange::Cast(polarity) | VoteChange::Flip(polarity) => {
                    self.votes.insert(key, polarity);
                }
                VoteChange::Retract => {
                    self.votes.remove(&key);
                }
            }

            entry.tally = tally;
            entry.revision += 1;
            Ok(true)
        }
    }

    fn post_target() -> TargetRef {
        TargetRef::post("post-1")
    }

    #[tokio::test]
    async fn first_vote_counts() {
        let target = post_target();
        let ledger = VoteLedger::new(MockVoteStore::with_target(target.clone()));

        let tally = ledger.cast_vote(&target, "user-1", Polarity::Up).await.unwrap();

        assert_eq!(tally, ReactionTally { upvotes: 1, downvotes: 0 });
        assert_eq!(ledger.vote_of(&target, "user-1").await.unwrap(), Some(Polarity::Up));
    }

    #[tokio::test]
    async fn same_polarity_twice_toggles_off() {
        let target = post_target();
        let ledger = VoteLedger::new(MockVoteStore::with_target(target.clone()));

        ledger.cast_vote(&target, "user-1", Polarity::Up).await.unwrap();
        let tally = ledger.cast_vote(&target, "user-1", Polarity::Up).await.unwrap();

        assert_eq!(tally, ReactionTally::default());
        assert_eq!(ledger.vote_of(&target, "user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn opposite_polarity_flips_the_vote() {
        let target = post_target();
        let ledger = VoteLedger::new(MockVoteStore::with_target(target.clone()));

        ledger.cast_vote(&target, "user-1", Polarity::Up).await.unwrap();
        let tally = ledger.cast_vote(&target, "user-1", Polarity::Down).await.unwrap();

        assert_eq!(tally, ReactionTally { upvotes: 0, downvotes: 1 });
        assert_eq!(
            ledger.vote_of(&target, "user-1").await.unwrap(),
            Some(Polarity::Down)
        );
    }

    #[tokio::test]
    async fn spec_scenario_two_voters() {
        // V1: up (1/0) -> up again (0/0) -> down (0/1), then V2: up (1/1).
        let target = post_target();
        let store = MockVoteStore::with_target(target.clone());
        let ledger = VoteLedger::new(store);

        let t1 = ledger.cast_vote(&target, "v1", Polarity::Up).await.unwrap();
        assert_eq!((t1.upvotes, t1.downvotes), (1, 0));

        let t2 = ledger.cast_vote(&target, "v1", Polarity::Up).await.unwrap();
        assert_eq!((t2.upvotes, t2.downvotes), (0, 0));

        let t3 = ledger.cast_vote(&target, "v1", Polarity::Down).await.unwrap();
        assert_eq!((t3.upvotes, t3.downvotes), (0, 1));

        let t4 = ledger.cast_vote(&target, "v2", Polarity::Up).await.unwrap();
        assert_eq!((t4.upvotes, t4.downvotes), (1, 1));
    }

    #[tokio::test]
    async fn at_most_one_live_vote_per_pair() {
        let target = post_target();
        let store = MockVoteStore::with_target(target.clone());
        let ledger = VoteLedger::new(store);

        for polarity in [Polarity::Up, Polarity::Down, Polarity::Down, Polarity::Up] {
            ledger.cast_vote(&target, "user-1", polarity).await.unwrap();
            assert!(ledger.store.live_votes(&target) <= 1);
        }
    }

    #[tokio::test]
    async fn anonymous_voter_is_rejected() {
        let target = post_target();
        let ledger = VoteLedger::new(MockVoteStore::with_target(target.clone()));

        let err = ledger.cast_vote(&target, "  ", Polarity::Up).await.unwrap_err();
        assert!(matches!(err, VoteError::Unauthenticated));

        // The query path just reads as "no vote".
        assert_eq!(ledger.vote_of(&target, "").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let ledger = VoteLedger::new(MockVoteStore::with_target(post_target()));
        let gone = TargetRef::post("post-999");

        let err = ledger.cast_vote(&gone, "user-1", Polarity::Up).await.unwrap_err();
        assert!(matches!(err, VoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn lost_races_are_retried() {
        let target = post_target();
        let store = MockVoteStore::with_target(target.clone());
        store.reject_commits.store(2, Ordering::SeqCst);
        let ledger = VoteLedger::new(store);

        let tally = ledger.cast_vote(&target, "user-1", Polarity::Up).await.unwrap();
        assert_eq!(tally.upvotes, 1);
    }

    #[tokio::test]
    async fn endless_conflicts_surface_as_store_unavailable() {
        let target = post_target();
        let store = MockVoteStore::with_target(target.clone());
        store.reject_commits.store(u32::MAX, Ordering::SeqCst);
        let ledger = VoteLedger::new(store);

        let err = ledger.cast_vote(&target, "user-1", Polarity::Up).await.unwrap_err();
        assert!(matches!(err, VoteError::StoreUnavailable(_)));
    }

    #[test]
    fn next_state_table() {
        let zero = ReactionTally::default();
        let one_up = zero.add(Polarity::Up);

        assert_eq!(
            next_vote_state(None, Polarity::Up, zero),
            (VoteChange::Cast(Polarity::Up), one_up)
        );
        assert_eq!(
            next_vote_state(Some(Polarity::Up), Polarity::Up, one_up),
            (VoteChange::Retract, zero)
        );
        assert_eq!(
            next_vote_state(Some(Polarity::Up), Polarity::Down, one_up),
            (VoteChange::Flip(Polarity::Down), zero.add(Polarity::Down))
        );
    }
}
