//! Read-side ranking of entry owners within one period. Pure projection:
//! never mutates votes or entries, stable across repeated calls.

use std::collections::{BTreeMap, HashMap};

use crate::model::{ContestEntry, EntryId, LeaderboardRow, UserProfile, Username};

pub const DEFAULT_LIMIT: usize = 10;

/// Rank entry owners by summed vote total, descending. Ties break by
/// username ascending in byte order, so equal totals always come back in
/// the same order. Owners without a profile fall back to their username.
pub fn compute_leaderboard(
    entries: &[ContestEntry],
    totals: &HashMap<EntryId, i64>,
    profiles: &HashMap<Username, UserProfile>,
    limit: usize,
) -> Vec<LeaderboardRow> {
    let mut by_owner: BTreeMap<&str, i64> = BTreeMap::new();
    for entry in entries {
        let total = totals.get(&entry.id).copied().unwrap_or(0);
        *by_owner.entry(entry.owner.as_str()).or_insert(0) += total;
    }

    let mut rows: Vec<LeaderboardRow> = by_owner
        .into_iter()
        .map(|(owner, total)| match profiles.get(owner) {
            Some(profile) => LeaderboardRow {
                username: owner.to_owned(),
                display_name: profile.display_name.clone(),
                avatar: profile.avatar.clone(),
                total,
            },
            None => LeaderboardRow {
                username: owner.to_owned(),
                display_name: owner.to_owned(),
                avatar: String::new(),
                total,
            },
        })
        .collect();

    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.username.cmp(&b.username)));
    rows.truncate(limit);
    rows
}
