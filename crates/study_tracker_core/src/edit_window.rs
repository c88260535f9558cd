//! crates/study_tracker_core/src/edit_window.rs
//!
//! The time-boxed mutation rule shared by both repositories: a record may be
//! edited or deleted only while `now - createdAt <= window`. The boundary is
//! inclusive. Records without a creation timestamp are never mutable.

use crate::ports::{PortError, PortResult};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_EDIT_WINDOW_MINUTES: i64 = 5;

/// What the caller is trying to do to the record; only affects the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Edit,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditWindowPolicy {
    window: Duration,
}

impl Default for EditWindowPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_EDIT_WINDOW_MINUTES))
    }
}

impl EditWindowPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn permits(&self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        created_at.is_some_and(|created| now - created <= self.window)
    }

    /// Fails with a user-facing explanation when the window has closed.
    pub fn ensure(
        &self,
        mutation: Mutation,
        created_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        record: &str,
    ) -> PortResult<()> {
        if self.permits(created_at, now) {
            return Ok(());
        }

        let minutes = self.window.num_minutes();
        let message = match mutation {
            Mutation::Edit => format!(
                "Edit window ({} minutes) has expired for this {}.",
                minutes, record
            ),
            Mutation::Delete => format!(
                "Delete window ({} minutes) has expired for this {}. To wipe data completely, import an empty backup file.",
                minutes, record
            ),
        };
        Err(PortError::EditWindowExpired(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn window_is_inclusive_at_five_minutes() {
        let policy = EditWindowPolicy::default();
        let t = created();

        assert!(policy.permits(Some(t), t + Duration::seconds(4 * 60 + 59)));
        assert!(policy.permits(Some(t), t + Duration::minutes(5)));
        assert!(!policy.permits(Some(t), t + Duration::seconds(5 * 60 + 1)));
    }

    #[test]
    fn records_without_creation_time_are_locked() {
        let policy = EditWindowPolicy::default();
        assert!(!policy.permits(None, created()));
    }

    #[test]
    fn expired_delete_explains_itself() {
        let policy = EditWindowPolicy::default();
        let err = policy
            .ensure(Mutation::Delete, Some(created()), created() + Duration::minutes(6), "log")
            .unwrap_err();

        match err {
            PortError::EditWindowExpired(message) => {
                assert!(message.starts_with("Delete window (5 minutes) has expired for this log."))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
