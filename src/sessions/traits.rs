//! Session record type and the storage contract.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single sleep interval.
///
/// A session with no `end` is *active* (sleep currently in progress). The
/// manager closes it exactly once by stamping `end`; records are never
/// otherwise mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSession {
    /// Unique identifier, assigned at creation.
    pub id: Uuid,
    /// When the sleep began. Immutable after creation.
    pub start: DateTime<Utc>,
    /// When the sleep ended; `None` while the session is active.
    pub end: Option<DateTime<Utc>>,
    /// `true` for backfilled entries, `false` for sessions started live.
    #[serde(default)]
    pub created_manually: bool,
}

impl SleepSession {
    /// A session started live at `start`, still in progress.
    pub fn started_at(start: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start,
            end: None,
            created_manually: false,
        }
    }

    /// A backfilled session with explicit start and end.
    pub fn manual(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start,
            end: Some(end),
            created_manually: true,
        }
    }

    /// Whether the session is still ongoing.
    pub fn is_active(&self) -> bool {
        self.end.is_none()
    }

    /// Duration of a closed session; `None` while active.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }

    /// Duration as of `now`: the recorded span for closed sessions, the
    /// elapsed-so-far span for the active one. Clamped at zero so a `now`
    /// behind `start` never produces a negative contribution.
    pub fn duration_as_of(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end.unwrap_or(now);
        (end - self.start).max(Duration::zero())
    }
}

/// Durable storage for sleep sessions.
///
/// The store is a passive record holder: it persists whatever the manager
/// hands it and returns what it has on load. Lifecycle invariants (single
/// active session, `end > start`) are the manager's responsibility.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load every persisted session, in any order.
    async fn load_all(&self) -> Result<Vec<SleepSession>>;

    /// Insert or update a session record by id. Must be durable before
    /// returning `Ok`.
    async fn save(&self, session: &SleepSession) -> Result<()>;

    /// The name of this store implementation.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn started_at_is_active_with_no_end() {
        let session = SleepSession::started_at(at(0));
        assert!(session.is_active());
        assert!(!session.created_manually);
        assert_eq!(session.duration(), None);
    }

    #[test]
    fn manual_is_closed_and_flagged() {
        let session = SleepSession::manual(at(0), at(3600));
        assert!(!session.is_active());
        assert!(session.created_manually);
        assert_eq!(session.duration(), Some(Duration::seconds(3600)));
    }

    #[test]
    fn duration_as_of_uses_now_for_active_sessions() {
        let session = SleepSession::started_at(at(0));
        assert_eq!(session.duration_as_of(at(90)), Duration::seconds(90));
    }

    #[test]
    fn duration_as_of_ignores_now_for_closed_sessions() {
        let session = SleepSession::manual(at(0), at(600));
        assert_eq!(session.duration_as_of(at(10_000)), Duration::seconds(600));
    }

    #[test]
    fn duration_as_of_clamps_at_zero() {
        let session = SleepSession::started_at(at(100));
        assert_eq!(session.duration_as_of(at(0)), Duration::zero());
    }

    #[test]
    fn serde_round_trip_preserves_open_end() {
        let session = SleepSession::started_at(at(0));
        let json = serde_json::to_string(&session).unwrap();
        let back: SleepSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
        assert!(back.end.is_none());
    }
}
