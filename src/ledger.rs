//! # Vote ledger
//!
//! Authoritative per-(entry, voter) vote state plus the per-entry running
//! total derived from it.
//!
//! ## Requirements
//!
//! - At most one non-none vote per (entry, voter) pair
//! - Casting the stored direction again cancels the vote (toggle to none)
//! - Switching up to down is one transition, applied as a single delta
//! - Writes carry a monotonic sequence per pair; stale writes are rejected
//! - Same-pair mutations serialize, unrelated pairs run in parallel
//!
//! ## Implementation
//!
//! Both maps are sharded, so a mutation locks only the shard holding its
//! key. The total delta `score(new) - score(old)` is applied while the vote
//! record's shard lock is still held, which rules out lost updates under
//! concurrent voting on one entry. Lock order is always votes then totals.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    error::AppError,
    model::{EntryId, Username, VoteDirection},
};

#[derive(Clone, Copy, Debug)]
struct VoteRecord {
    direction: VoteDirection,
    seq: u64,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    pub previous: VoteDirection,
    pub direction: VoteDirection,
    pub total: i64,
}

#[derive(Default)]
pub struct VoteLedger {
    votes: DashMap<(EntryId, Username), VoteRecord>,
    totals: DashMap<EntryId, i64>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a vote intent. `seq` of `None` means "next in line"; an explicit
    /// sequence that is not newer than the stored one fails with `Conflict`
    /// and leaves the ledger untouched.
    pub fn apply(
        &self,
        entry_id: EntryId,
        voter: &str,
        requested: VoteDirection,
        seq: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, AppError> {
        let mut record = self
            .votes
            .entry((entry_id, voter.to_owned()))
            .or_insert(VoteRecord {
                direction: VoteDirection::None,
                seq: 0,
                updated_at: now,
            });

        let next_seq = match seq {
            Some(s) if s <= record.seq => {
                return Err(AppError::Conflict {
                    got: s,
                    stored: record.seq,
                });
            }
            Some(s) => s,
            None => record.seq + 1,
        };

        let previous = record.direction;
        let direction = VoteDirection::resolve(previous, requested);
        record.direction = direction;
        record.seq = next_seq;
        record.updated_at = now;

        let delta = direction.score() - previous.score();
        let total = if delta != 0 {
            let mut total = self.totals.entry(entry_id).or_insert(0);
            *total += delta;
            *total
        } else {
            self.total(entry_id)
        };

        Ok(VoteOutcome {
            previous,
            direction,
            total,
        })
    }

    /// Running total for an entry, `count(up) - count(down)`.
    pub fn total(&self, entry_id: EntryId) -> i64 {
        self.totals.get(&entry_id).map(|t| *t).unwrap_or(0)
    }

    /// The voter's current stance on an entry.
    pub fn direction_of(&self, entry_id: EntryId, voter: &str) -> VoteDirection {
        self.votes
            .get(&(entry_id, voter.to_owned()))
            .map(|r| r.direction)
            .unwrap_or(VoteDirection::None)
    }

    /// When the pair's vote last changed, if it ever did.
    pub fn last_modified(&self, entry_id: EntryId, voter: &str) -> Option<DateTime<Utc>> {
        self.votes
            .get(&(entry_id, voter.to_owned()))
            .map(|r| r.updated_at)
    }

    /// Full-scan recount. Consistency oracle for the incremental total.
    pub fn recount(&self, entry_id: EntryId) -> i64 {
        self.votes
            .iter()
            .filter(|r| r.key().0 == entry_id)
            .map(|r| r.value().direction.score())
            .sum()
    }
}
