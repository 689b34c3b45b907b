//! Core entities and wire payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub type EntryId = Uuid;
pub type Username = String;

/// A voter's current stance on an entry. `None` is a real state, not an
/// absence: it is what a vote becomes when toggled off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
    None,
}

impl VoteDirection {
    pub fn score(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
            VoteDirection::None => 0,
        }
    }

    /// Toggle semantics: casting the stored direction again cancels it,
    /// anything else replaces it in one transition.
    pub fn resolve(stored: Self, requested: Self) -> Self {
        if stored == requested {
            VoteDirection::None
        } else {
            requested
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A contest submission. Never deleted, only status-transitioned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContestEntry {
    pub id: EntryId,
    pub owner: Username,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Opaque image references, resolved by the image store.
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: ModerationStatus,
    pub winner: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: Username,
    pub display_name: String,
    /// Opaque avatar reference.
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub username: Username,
    pub display_name: String,
    pub avatar: String,
    pub total: i64,
}

/// Identity forwarded by the reverse proxy. The engine never authenticates,
/// it only checks what the proxy already established.
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    pub user: Option<Username>,
    pub admin: bool,
}

impl AuthContext {
    pub fn require_user(&self) -> Result<&str, AppError> {
        self.user.as_deref().ok_or(AppError::Unauthenticated)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.admin {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub entry_id: EntryId,
    pub direction: VoteDirection,
    /// Client-side monotonic sequence; stale sequences are rejected.
    pub seq: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub entry_id: EntryId,
    /// The caller's direction after the toggle was applied.
    pub direction: VoteDirection,
    pub total: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub description: String,
    pub category: String,
    pub images: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct ModerationRequest {
    pub status: Option<ModerationStatus>,
    pub winner: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// Any instant inside the wanted period; defaults to now.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EntriesQuery {
    pub at: Option<DateTime<Utc>>,
    pub status: Option<ModerationStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// An entry as served to clients: the stored row joined with the derived
/// vote total and the caller's own direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryView {
    pub entry: ContestEntry,
    pub vote_total: i64,
    pub my_vote: VoteDirection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntriesPage {
    pub period: crate::period::ContestPeriod,
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
    pub entries: Vec<EntryView>,
}
