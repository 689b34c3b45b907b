//! Orchestration over the store and the ledger: vote casting, entry
//! listing, leaderboard reads, submission, and moderation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    leaderboard,
    ledger::VoteLedger,
    model::{
        AuthContext, ContestEntry, EntriesPage, EntriesQuery, EntryId, EntryView, LeaderboardRow,
        ModerationRequest, ModerationStatus, NewEntry, UserProfile, VoteDirection, VoteReceipt,
    },
    moderation, period,
    store::EntryStore,
};

const DEFAULT_PAGE_SIZE: u32 = 20;

pub struct ContestEngine {
    store: Arc<dyn EntryStore>,
    ledger: VoteLedger,
    leaderboard_size: usize,
    max_page_size: u32,
    enforce_window: bool,
}

impl ContestEngine {
    pub fn new(store: Arc<dyn EntryStore>, config: &Config) -> Self {
        Self {
            store,
            ledger: VoteLedger::new(),
            leaderboard_size: config.leaderboard_size,
            max_page_size: config.max_page_size,
            enforce_window: config.enforce_window,
        }
    }

    /// Cast a vote with the ledger's toggle semantics. Entries created
    /// outside the active period reject with `OutOfWindow` when enforcement
    /// is on.
    pub async fn cast_vote(
        &self,
        ctx: &AuthContext,
        entry_id: EntryId,
        direction: VoteDirection,
        seq: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt, AppError> {
        let voter = ctx.require_user()?;
        let entry = self.store.get(entry_id).await?.ok_or(AppError::NotFound)?;

        if self.enforce_window && !period::active_period(now).contains(entry.created_at) {
            return Err(AppError::OutOfWindow);
        }

        let outcome = self.ledger.apply(entry_id, voter, direction, seq, now)?;
        info!(
            entry = %entry_id,
            voter,
            from = ?outcome.previous,
            to = ?outcome.direction,
            total = outcome.total,
            "vote applied"
        );
        Ok(VoteReceipt {
            entry_id,
            direction: outcome.direction,
            total: outcome.total,
        })
    }

    /// Paginated entries for one period, newest first, with derived totals
    /// and the caller's own direction attached.
    pub async fn entries(
        &self,
        ctx: &AuthContext,
        query: &EntriesQuery,
        now: DateTime<Utc>,
    ) -> Result<EntriesPage, AppError> {
        let period = period::period_containing(query.at.unwrap_or(now));
        let mut listed = self.store.list(period.start, period.end).await?;
        if let Some(status) = query.status {
            listed.retain(|e| e.status == status);
        }

        let total = listed.len();
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, self.max_page_size);
        let offset = (page - 1) as usize * page_size as usize;

        let entries = listed
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .map(|entry| {
                let vote_total = self.ledger.total(entry.id);
                let my_vote = match &ctx.user {
                    Some(user) => self.ledger.direction_of(entry.id, user),
                    None => VoteDirection::None,
                };
                EntryView {
                    entry,
                    vote_total,
                    my_vote,
                }
            })
            .collect();

        Ok(EntriesPage {
            period,
            page,
            page_size,
            total,
            entries,
        })
    }

    /// Leaderboard for the period containing `at` (default: now). Pure read.
    pub async fn leaderboard(
        &self,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let period = period::period_containing(at.unwrap_or(now));
        let entries = self.store.list(period.start, period.end).await?;

        let totals: HashMap<EntryId, i64> = entries
            .iter()
            .map(|e| (e.id, self.ledger.total(e.id)))
            .collect();

        let owners: BTreeSet<&str> = entries.iter().map(|e| e.owner.as_str()).collect();
        let mut profiles: HashMap<String, UserProfile> = HashMap::new();
        for owner in owners {
            if let Some(profile) = self.store.profile(owner).await? {
                profiles.insert(owner.to_owned(), profile);
            }
        }

        Ok(leaderboard::compute_leaderboard(
            &entries,
            &totals,
            &profiles,
            self.leaderboard_size,
        ))
    }

    /// Submit a new entry into the active period, pending moderation.
    pub async fn submit(
        &self,
        ctx: &AuthContext,
        new_entry: NewEntry,
        now: DateTime<Utc>,
    ) -> Result<ContestEntry, AppError> {
        let owner = ctx.require_user()?;
        if new_entry.title.trim().is_empty() {
            return Err(AppError::MalformedPayload);
        }

        if self.store.profile(owner).await?.is_none() {
            self.store
                .upsert_profile(UserProfile {
                    username: owner.to_owned(),
                    display_name: owner.to_owned(),
                    avatar: String::new(),
                    created_at: now,
                })
                .await?;
        }

        let entry = ContestEntry {
            id: Uuid::new_v4(),
            owner: owner.to_owned(),
            title: new_entry.title,
            description: new_entry.description,
            category: new_entry.category,
            images: new_entry.images,
            created_at: now,
            status: ModerationStatus::Pending,
            winner: false,
        };
        let created = self.store.create(entry).await?;
        info!(entry = %created.id, owner, "entry submitted");
        Ok(created)
    }

    /// Administrator-only status/winner change. Never touches vote totals.
    pub async fn moderate(
        &self,
        ctx: &AuthContext,
        entry_id: EntryId,
        request: ModerationRequest,
    ) -> Result<ContestEntry, AppError> {
        ctx.require_admin()?;
        let entry = self.store.get(entry_id).await?.ok_or(AppError::NotFound)?;
        let before = entry.status;
        let reviewed = moderation::review(entry, request.status, request.winner)?;
        let saved = self.store.update(reviewed).await?;
        info!(
            entry = %entry_id,
            from = %before,
            to = %saved.status,
            winner = saved.winner,
            "moderation applied"
        );
        Ok(saved)
    }

    /// Derived vote total for one entry.
    pub fn vote_total(&self, entry_id: EntryId) -> i64 {
        self.ledger.total(entry_id)
    }
}
