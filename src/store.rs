//! Entry storage contract and the in-memory implementation backing the
//! binary and the tests. The engine only suspends on these calls; a future
//! database-backed store slots in behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    error::AppError,
    model::{ContestEntry, EntryId, UserProfile, Username},
};

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Entries created in `[start, end]`, newest first; ties in `created_at`
    /// break by id so the order is stable.
    async fn list(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContestEntry>, AppError>;

    async fn create(&self, entry: ContestEntry) -> Result<ContestEntry, AppError>;

    async fn get(&self, id: EntryId) -> Result<Option<ContestEntry>, AppError>;

    /// Persist a moderated entry. Fails with `NotFound` for unknown ids.
    async fn update(&self, entry: ContestEntry) -> Result<ContestEntry, AppError>;

    async fn profile(&self, username: &str) -> Result<Option<UserProfile>, AppError>;

    async fn upsert_profile(&self, profile: UserProfile) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<EntryId, ContestEntry>,
    profiles: DashMap<Username, UserProfile>,
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn list(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ContestEntry>, AppError> {
        let mut out: Vec<ContestEntry> = self
            .entries
            .iter()
            .filter(|e| {
                let created = e.value().created_at;
                start <= created && created <= end
            })
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn create(&self, entry: ContestEntry) -> Result<ContestEntry, AppError> {
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: EntryId) -> Result<Option<ContestEntry>, AppError> {
        Ok(self.entries.get(&id).map(|e| e.value().clone()))
    }

    async fn update(&self, entry: ContestEntry) -> Result<ContestEntry, AppError> {
        if !self.entries.contains_key(&entry.id) {
            return Err(AppError::NotFound);
        }
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn profile(&self, username: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.get(username).map(|p| p.value().clone()))
    }

    async fn upsert_profile(&self, profile: UserProfile) -> Result<(), AppError> {
        self.profiles.insert(profile.username.clone(), profile);
        Ok(())
    }
}
