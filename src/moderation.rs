//! Entry lifecycle: `pending -> {approved, rejected}`, both terminal.
//! The winner flag is orthogonal and never touches vote totals.

use crate::{
    error::AppError,
    model::{ContestEntry, ModerationStatus},
};

/// Resolve a requested status against the transition table. Re-asserting the
/// current status is an idempotent no-op so admin retries are safe.
pub fn next_status(
    current: ModerationStatus,
    requested: ModerationStatus,
) -> Result<ModerationStatus, AppError> {
    if current == requested {
        return Ok(current);
    }
    match (current, requested) {
        (ModerationStatus::Pending, ModerationStatus::Approved)
        | (ModerationStatus::Pending, ModerationStatus::Rejected) => Ok(requested),
        _ => Err(AppError::InvalidTransition(format!(
            "{current} -> {requested}"
        ))),
    }
}

/// Apply a moderation request to an entry. Setting `winner` requires the
/// entry to be approved once the status change (if any) has been applied;
/// clearing it is always allowed.
pub fn review(
    mut entry: ContestEntry,
    status: Option<ModerationStatus>,
    winner: Option<bool>,
) -> Result<ContestEntry, AppError> {
    if let Some(requested) = status {
        entry.status = next_status(entry.status, requested)?;
    }
    if let Some(flag) = winner {
        if flag && entry.status != ModerationStatus::Approved {
            return Err(AppError::InvalidTransition(format!(
                "winner requires approved, entry is {}",
                entry.status
            )));
        }
        entry.winner = flag;
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    fn entry(status: ModerationStatus) -> ContestEntry {
        ContestEntry {
            id: Uuid::new_v4(),
            owner: "ada".into(),
            title: "plastic bottle planter".into(),
            description: String::new(),
            category: "upcycling".into(),
            images: vec![],
            created_at: Utc.with_ymd_and_hms(2026, 8, 3, 10, 0, 0).unwrap(),
            status,
            winner: false,
        }
    }

    #[test]
    fn pending_can_be_approved_or_rejected() {
        assert_eq!(
            next_status(ModerationStatus::Pending, ModerationStatus::Approved).unwrap(),
            ModerationStatus::Approved
        );
        assert_eq!(
            next_status(ModerationStatus::Pending, ModerationStatus::Rejected).unwrap(),
            ModerationStatus::Rejected
        );
    }

    #[test]
    fn rejected_is_terminal() {
        for target in [ModerationStatus::Pending, ModerationStatus::Approved] {
            let err = next_status(ModerationStatus::Rejected, target).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[test]
    fn approved_is_not_reversible() {
        for target in [ModerationStatus::Pending, ModerationStatus::Rejected] {
            let err = next_status(ModerationStatus::Approved, target).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[test]
    fn reasserting_current_status_is_a_no_op() {
        for status in [
            ModerationStatus::Pending,
            ModerationStatus::Approved,
            ModerationStatus::Rejected,
        ] {
            assert_eq!(next_status(status, status).unwrap(), status);
        }
    }

    #[test]
    fn winner_requires_approved() {
        let err = review(entry(ModerationStatus::Pending), None, Some(true)).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let reviewed = review(
            entry(ModerationStatus::Pending),
            Some(ModerationStatus::Approved),
            Some(true),
        )
        .unwrap();
        assert_eq!(reviewed.status, ModerationStatus::Approved);
        assert!(reviewed.winner);
    }

    #[test]
    fn clearing_winner_is_always_allowed() {
        let mut pending = entry(ModerationStatus::Pending);
        pending.winner = true;
        let reviewed = review(pending, None, Some(false)).unwrap();
        assert!(!reviewed.winner);
    }

    #[test]
    fn failed_review_leaves_entry_unchanged() {
        let original = entry(ModerationStatus::Rejected);
        let err = review(original.clone(), Some(ModerationStatus::Approved), None).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        // Callers keep the original on error; nothing was persisted.
        assert_eq!(original.status, ModerationStatus::Rejected);
    }
}
