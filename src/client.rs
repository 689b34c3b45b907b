//! # Client reconciliation
//!
//! Makes voting feel instantaneous without trusting the optimistic result.
//! State transitions are explicit functions of (state, action), callable and
//! testable without any runtime store; the [`Reconciler`] is the thin
//! wrapper that persists the result and talks to the server.
//!
//! ## Flow
//!
//! - A vote intent is applied locally with the same toggle semantics as the
//!   server ledger, so the UI shows the post-toggle state immediately
//! - The intent is dispatched with a fresh sequence; on success the
//!   authoritative entries and leaderboard are re-fetched and replace local
//!   state wholesale, never merged field by field
//! - On `Conflict` or `Unavailable` the entry reverts to the last
//!   server-confirmed snapshot before re-fetching
//! - A response that is no longer the newest in-flight sequence for its
//!   entry is ignored; rapid voting converges to the server's last word
//! - A timed-out request is an unknown outcome, not a failure: the next
//!   authoritative re-fetch decides what actually happened

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    error::AppError,
    model::{EntryId, LeaderboardRow, VoteDirection, VoteReceipt},
    period::{self, ContestPeriod},
    retry::RetryPolicy,
};

/// Locally-held view of one entry: the derived total and the current user's
/// own direction.
#[derive(Clone, Debug, PartialEq)]
pub struct EntrySnapshot {
    pub entry_id: EntryId,
    pub vote_total: i64,
    pub my_vote: VoteDirection,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedState {
    pub period: Option<ContestPeriod>,
    pub entries: BTreeMap<EntryId, EntrySnapshot>,
    pub leaderboard: Vec<LeaderboardRow>,
}

#[derive(Clone, Debug)]
pub enum FeedAction {
    /// Optimistic local application of a vote, pre-confirmation.
    VoteIntent {
        entry_id: EntryId,
        direction: VoteDirection,
    },
    /// Wholesale replacement with server truth.
    ServerSync {
        period: ContestPeriod,
        entries: Vec<EntrySnapshot>,
        leaderboard: Vec<LeaderboardRow>,
    },
    /// Roll one entry back to the last confirmed snapshot (or drop it if
    /// the server never confirmed it).
    RevertEntry {
        entry_id: EntryId,
        confirmed: Option<EntrySnapshot>,
    },
    /// Period rollover: everything period-scoped is stale.
    Invalidate,
}

/// Pure state transition. No I/O, no clock, no hidden store.
pub fn reduce(mut state: FeedState, action: FeedAction) -> FeedState {
    match action {
        FeedAction::VoteIntent {
            entry_id,
            direction,
        } => {
            if let Some(snapshot) = state.entries.get_mut(&entry_id) {
                let next = VoteDirection::resolve(snapshot.my_vote, direction);
                snapshot.vote_total += next.score() - snapshot.my_vote.score();
                snapshot.my_vote = next;
            }
            state
        }
        FeedAction::ServerSync {
            period,
            entries,
            leaderboard,
        } => FeedState {
            period: Some(period),
            entries: entries.into_iter().map(|e| (e.entry_id, e)).collect(),
            leaderboard,
        },
        FeedAction::RevertEntry {
            entry_id,
            confirmed,
        } => {
            match confirmed {
                Some(snapshot) => {
                    state.entries.insert(entry_id, snapshot);
                }
                None => {
                    state.entries.remove(&entry_id);
                }
            }
            state
        }
        FeedAction::Invalidate => FeedState::default(),
    }
}

/// Server transport. Implementations map their own timeouts to
/// [`AppError::Unavailable`]; the reconciler treats that as unknown outcome
/// and lets the next re-fetch decide.
#[async_trait]
pub trait VoteApi: Send + Sync {
    async fn cast_vote(
        &self,
        entry_id: EntryId,
        direction: VoteDirection,
        seq: u64,
    ) -> Result<VoteReceipt, AppError>;

    async fn fetch_entries(&self, at: DateTime<Utc>) -> Result<Vec<EntrySnapshot>, AppError>;

    async fn fetch_leaderboard(&self, at: DateTime<Utc>) -> Result<Vec<LeaderboardRow>, AppError>;
}

pub struct Reconciler<A: VoteApi> {
    api: A,
    state: RwLock<FeedState>,
    /// Last state the server confirmed; rollback target.
    confirmed: RwLock<FeedState>,
    next_seq: AtomicU64,
    /// Newest in-flight sequence per entry; older responses are ignored.
    inflight: DashMap<EntryId, u64>,
    retry: RetryPolicy,
}

impl<A: VoteApi> Reconciler<A> {
    pub fn new(api: A) -> Self {
        Self::with_retry(api, RetryPolicy::default_refetch())
    }

    pub fn with_retry(api: A, retry: RetryPolicy) -> Self {
        Self {
            api,
            state: RwLock::new(FeedState::default()),
            confirmed: RwLock::new(FeedState::default()),
            next_seq: AtomicU64::new(1),
            inflight: DashMap::new(),
            retry,
        }
    }

    pub fn state(&self) -> FeedState {
        self.state.read().clone()
    }

    fn dispatch(&self, action: FeedAction) {
        let mut guard = self.state.write();
        let previous = std::mem::take(&mut *guard);
        *guard = reduce(previous, action);
    }

    /// Vote on an entry: optimistic local apply, async dispatch, reconcile.
    /// Returns the direction the server confirmed.
    pub async fn vote(
        &self,
        entry_id: EntryId,
        direction: VoteDirection,
        now: DateTime<Utc>,
    ) -> Result<VoteDirection, AppError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.inflight.insert(entry_id, seq);
        self.dispatch(FeedAction::VoteIntent {
            entry_id,
            direction,
        });

        let result = self.api.cast_vote(entry_id, direction, seq).await;

        let newest = self.inflight.get(&entry_id).map(|s| *s).unwrap_or(seq);
        if seq != newest {
            // A newer intent for this entry owns convergence now.
            debug!(entry = %entry_id, seq, newest, "superseded vote response ignored");
            return result.map(|receipt| receipt.direction);
        }

        match result {
            Ok(receipt) => {
                self.refetch_best_effort(now).await;
                Ok(receipt.direction)
            }
            Err(err) => {
                let confirmed = self.confirmed.read().entries.get(&entry_id).cloned();
                self.dispatch(FeedAction::RevertEntry {
                    entry_id,
                    confirmed,
                });
                if matches!(err, AppError::Conflict { .. } | AppError::Unavailable(_)) {
                    self.refetch_best_effort(now).await;
                }
                Err(err)
            }
        }
    }

    /// Replace local state with server truth for the period containing
    /// `now`. Transient failures are retried with backoff.
    pub async fn refetch(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        let period = period::period_containing(now);
        let entries = self
            .retry
            .retry_async(|_| self.api.fetch_entries(now))
            .await?;
        let leaderboard = self
            .retry
            .retry_async(|_| self.api.fetch_leaderboard(now))
            .await?;

        let sync = FeedAction::ServerSync {
            period,
            entries,
            leaderboard,
        };
        {
            let mut confirmed = self.confirmed.write();
            let previous = std::mem::take(&mut *confirmed);
            *confirmed = reduce(previous, sync.clone());
        }
        self.dispatch(sync);
        Ok(())
    }

    /// The only place errors are swallowed: a background re-fetch that
    /// still fails after retries leaves the current state standing until
    /// the next one.
    async fn refetch_best_effort(&self, now: DateTime<Utc>) {
        if let Err(err) = self.refetch(now).await {
            warn!(%err, "authoritative re-fetch failed, keeping local state");
        }
    }

    /// Call at least once per minute. Detects period rollover and drops all
    /// period-scoped state; returns whether an invalidation happened.
    pub fn tick(&self, now: DateTime<Utc>) -> bool {
        let current = period::period_containing(now);
        let rolled = {
            let state = self.state.read();
            state.period.is_some_and(|p| p != current)
        };
        if rolled {
            debug!("contest period rolled over, invalidating local state");
            self.dispatch(FeedAction::Invalidate);
            self.inflight.clear();
            let mut confirmed = self.confirmed.write();
            *confirmed = FeedState::default();
        }
        rolled
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, TimeZone};
    use tokio::sync::Notify;
    use uuid::Uuid;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    fn snapshot(entry_id: EntryId, total: i64, my_vote: VoteDirection) -> EntrySnapshot {
        EntrySnapshot {
            entry_id,
            vote_total: total,
            my_vote,
        }
    }

    fn state_with(snapshots: &[EntrySnapshot]) -> FeedState {
        FeedState {
            period: Some(period::period_containing(now())),
            entries: snapshots.iter().map(|s| (s.entry_id, s.clone())).collect(),
            leaderboard: vec![],
        }
    }

    // Single-user server double: applies the ledger's toggle semantics and
    // serves snapshots back.
    #[derive(Default)]
    struct ServerSim {
        entries: HashMap<EntryId, (VoteDirection, i64)>,
        fail_votes: bool,
    }

    impl ServerSim {
        fn seed(&mut self, entry_id: EntryId, total: i64) {
            self.entries.insert(entry_id, (VoteDirection::None, total));
        }

        fn apply(&mut self, entry_id: EntryId, requested: VoteDirection) -> VoteReceipt {
            let slot = self
                .entries
                .entry(entry_id)
                .or_insert((VoteDirection::None, 0));
            let next = VoteDirection::resolve(slot.0, requested);
            slot.1 += next.score() - slot.0.score();
            slot.0 = next;
            VoteReceipt {
                entry_id,
                direction: slot.0,
                total: slot.1,
            }
        }

        fn snapshots(&self) -> Vec<EntrySnapshot> {
            self.entries
                .iter()
                .map(|(id, (dir, total))| snapshot(*id, *total, *dir))
                .collect()
        }
    }

    struct SimApi {
        sim: Mutex<ServerSim>,
        // When set, the first cast_vote applies immediately but holds its
        // response until released, so a later response can overtake it.
        gate_first: Option<Arc<Notify>>,
        first_pending: AtomicBool,
    }

    impl SimApi {
        fn new(sim: ServerSim) -> Self {
            Self {
                sim: Mutex::new(sim),
                gate_first: None,
                first_pending: AtomicBool::new(false),
            }
        }

        fn gated(sim: ServerSim, gate: Arc<Notify>) -> Self {
            Self {
                sim: Mutex::new(sim),
                gate_first: Some(gate),
                first_pending: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl VoteApi for SimApi {
        async fn cast_vote(
            &self,
            entry_id: EntryId,
            direction: VoteDirection,
            _seq: u64,
        ) -> Result<VoteReceipt, AppError> {
            let receipt = {
                let mut sim = self.sim.lock().unwrap();
                if sim.fail_votes {
                    return Err(AppError::Unavailable("vote endpoint down".into()));
                }
                sim.apply(entry_id, direction)
            };
            if let Some(gate) = &self.gate_first {
                if self.first_pending.swap(false, Ordering::SeqCst) {
                    gate.notified().await;
                }
            }
            Ok(receipt)
        }

        async fn fetch_entries(&self, _at: DateTime<Utc>) -> Result<Vec<EntrySnapshot>, AppError> {
            Ok(self.sim.lock().unwrap().snapshots())
        }

        async fn fetch_leaderboard(
            &self,
            _at: DateTime<Utc>,
        ) -> Result<Vec<LeaderboardRow>, AppError> {
            Ok(vec![])
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(1, 1, 1, 0.0)
    }

    #[test]
    fn vote_intent_shows_post_toggle_state() {
        let entry_id = Uuid::new_v4();
        let state = state_with(&[snapshot(entry_id, 3, VoteDirection::None)]);

        let upvoted = reduce(
            state,
            FeedAction::VoteIntent {
                entry_id,
                direction: VoteDirection::Up,
            },
        );
        let snap = &upvoted.entries[&entry_id];
        assert_eq!(snap.my_vote, VoteDirection::Up);
        assert_eq!(snap.vote_total, 4);

        // Same button again: optimistic un-vote.
        let toggled = reduce(
            upvoted,
            FeedAction::VoteIntent {
                entry_id,
                direction: VoteDirection::Up,
            },
        );
        let snap = &toggled.entries[&entry_id];
        assert_eq!(snap.my_vote, VoteDirection::None);
        assert_eq!(snap.vote_total, 3);
    }

    #[test]
    fn switch_applies_single_delta_locally() {
        let entry_id = Uuid::new_v4();
        let state = state_with(&[snapshot(entry_id, 1, VoteDirection::Up)]);
        let switched = reduce(
            state,
            FeedAction::VoteIntent {
                entry_id,
                direction: VoteDirection::Down,
            },
        );
        assert_eq!(switched.entries[&entry_id].vote_total, -1);
        assert_eq!(switched.entries[&entry_id].my_vote, VoteDirection::Down);
    }

    #[test]
    fn server_sync_replaces_wholesale() {
        let stale_id = Uuid::new_v4();
        let fresh_id = Uuid::new_v4();
        let state = state_with(&[snapshot(stale_id, 99, VoteDirection::Up)]);

        let synced = reduce(
            state,
            FeedAction::ServerSync {
                period: period::period_containing(now()),
                entries: vec![snapshot(fresh_id, 2, VoteDirection::None)],
                leaderboard: vec![],
            },
        );
        assert!(!synced.entries.contains_key(&stale_id));
        assert_eq!(synced.entries[&fresh_id].vote_total, 2);
    }

    #[test]
    fn revert_restores_confirmed_or_drops() {
        let entry_id = Uuid::new_v4();
        let state = state_with(&[snapshot(entry_id, 7, VoteDirection::Up)]);

        let reverted = reduce(
            state.clone(),
            FeedAction::RevertEntry {
                entry_id,
                confirmed: Some(snapshot(entry_id, 6, VoteDirection::None)),
            },
        );
        assert_eq!(reverted.entries[&entry_id].vote_total, 6);

        let dropped = reduce(
            state,
            FeedAction::RevertEntry {
                entry_id,
                confirmed: None,
            },
        );
        assert!(!dropped.entries.contains_key(&entry_id));
    }

    #[tokio::test]
    async fn successful_vote_converges_to_server_truth() {
        let entry_id = Uuid::new_v4();
        let mut sim = ServerSim::default();
        sim.seed(entry_id, 0);

        let reconciler = Reconciler::with_retry(SimApi::new(sim), fast_retry());
        reconciler.refetch(now()).await.unwrap();

        let direction = reconciler
            .vote(entry_id, VoteDirection::Up, now())
            .await
            .unwrap();
        assert_eq!(direction, VoteDirection::Up);

        let state = reconciler.state();
        assert_eq!(state.entries[&entry_id].vote_total, 1);
        assert_eq!(state.entries[&entry_id].my_vote, VoteDirection::Up);
    }

    #[tokio::test]
    async fn failed_vote_rolls_back_to_confirmed() {
        let entry_id = Uuid::new_v4();
        let mut sim = ServerSim::default();
        sim.seed(entry_id, 5);
        sim.fail_votes = true;

        let reconciler = Reconciler::with_retry(SimApi::new(sim), fast_retry());
        reconciler.refetch(now()).await.unwrap();
        let before = reconciler.state();

        let err = reconciler
            .vote(entry_id, VoteDirection::Up, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));

        // Optimistic +1 was rolled back, server truth stands.
        assert_eq!(reconciler.state(), before);
    }

    #[tokio::test]
    async fn superseded_response_never_clobbers_newer_state() {
        let entry_id = Uuid::new_v4();
        let mut sim = ServerSim::default();
        sim.seed(entry_id, 0);

        let gate = Arc::new(Notify::new());
        let reconciler = Arc::new(Reconciler::with_retry(
            SimApi::gated(sim, gate.clone()),
            fast_retry(),
        ));
        reconciler.refetch(now()).await.unwrap();

        // First vote applies server-side but its response hangs.
        let slow = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.vote(entry_id, VoteDirection::Up, now()).await })
        };
        tokio::task::yield_now().await;

        // Second vote completes and reconciles: up -> down on the server.
        reconciler
            .vote(entry_id, VoteDirection::Down, now())
            .await
            .unwrap();
        let settled = reconciler.state();
        assert_eq!(settled.entries[&entry_id].my_vote, VoteDirection::Down);
        assert_eq!(settled.entries[&entry_id].vote_total, -1);

        // Release the first response: it is stale and must change nothing.
        gate.notify_one();
        slow.await.unwrap().unwrap();
        assert_eq!(reconciler.state(), settled);
    }

    #[tokio::test]
    async fn tick_invalidates_on_period_rollover() {
        let entry_id = Uuid::new_v4();
        let mut sim = ServerSim::default();
        sim.seed(entry_id, 2);

        let reconciler = Reconciler::with_retry(SimApi::new(sim), fast_retry());
        reconciler.refetch(now()).await.unwrap();
        assert!(!reconciler.tick(now()));
        assert!(!reconciler.state().entries.is_empty());

        let next_week = now() + Duration::days(7);
        assert!(reconciler.tick(next_week));
        assert_eq!(reconciler.state(), FeedState::default());
    }
}
