//! Session lifecycle management and day-level queries.
//!
//! [`SessionManager`] is the single mutator of sleep-session records. It
//! keeps an in-memory cache of every known session, ordered most recent
//! start first, and refreshes it wholesale from the [`SessionStore`] after
//! each successful mutation. Queries read the cache only; callers supply
//! "now" and the calendar timezone, so the manager holds no clock state of
//! its own.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ValidationConfig;
use crate::sessions::{SessionStore, SleepSession};

/// Failures surfaced by the mutation operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session end must be after its start")]
    EndNotAfterStart,

    #[error("session start is in the future")]
    StartInFuture,

    #[error("session end is in the future")]
    EndInFuture,

    #[error("session store unavailable")]
    Store(#[source] anyhow::Error),
}

/// Owns the business rules for the sleep-session lifecycle.
///
/// All mutations (`start_session`, `stop_session`, `add_session`, `refresh`)
/// serialize on one internal async lock, so two concurrent starts can never
/// produce two active sessions and a refresh never clobbers a mutation that
/// began after it. The cache sits behind a separate fast mutex that is
/// never held across an `.await`.
pub struct SessionManager {
    store: Box<dyn SessionStore>,
    validation: ValidationConfig,
    /// Every known session, most recent start first.
    cache: Mutex<Vec<SleepSession>>,
    /// Serializes mutations against each other and against refresh.
    write_lock: tokio::sync::Mutex<()>,
    /// Generation counter bumped after every cache change.
    changed: watch::Sender<u64>,
}

impl SessionManager {
    /// Create a manager with the default (strict) validation policy. The
    /// cache starts empty; call [`refresh`](Self::refresh) to populate it.
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self::with_policy(store, ValidationConfig::default())
    }

    /// Create a manager with an explicit validation policy.
    pub fn with_policy(store: Box<dyn SessionStore>, validation: ValidationConfig) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            store,
            validation,
            cache: Mutex::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
            changed,
        }
    }

    /// Reload the cache from the store.
    ///
    /// A store failure degrades to an empty cache and is logged, not
    /// propagated; callers must tolerate an empty result set afterwards.
    pub async fn refresh(&self) {
        let _guard = self.write_lock.lock().await;
        self.refresh_locked().await;
        self.notify();
    }

    /// The session currently in progress, if any.
    ///
    /// More than one open session in the cache means corrupted data; the
    /// anomaly is logged and the most recent start wins.
    pub fn active_session(&self) -> Option<SleepSession> {
        let cache = self.cache.lock();
        let mut open = cache.iter().filter(|s| s.is_active());
        // Cache is sorted most-recent-first, so the first hit is the winner.
        let session = open.next()?.clone();
        let extra = open.count();
        if extra > 0 {
            error!(
                count = extra + 1,
                "multiple active sessions in store; resolving to the most recent start"
            );
        }
        Some(session)
    }

    /// Begin a new sleep session at `now`.
    ///
    /// No-op when a session is already active, so a double-tap cannot open
    /// two sessions.
    pub async fn start_session(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        if self.active_session().is_some() {
            debug!("start ignored: a session is already active");
            return Ok(());
        }

        let session = SleepSession::started_at(now);
        self.persist(&session).await?;
        info!(session_id = %session.id, "sleep session started");
        self.notify();
        Ok(())
    }

    /// Close the active sleep session by stamping its end with `now`.
    ///
    /// No-op when nothing is active. Rejects `now <= start` (clock skew),
    /// which would record a non-positive duration.
    pub async fn stop_session(&self, now: DateTime<Utc>) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut session) = self.active_session() else {
            debug!("stop ignored: no active session");
            return Ok(());
        };
        if now <= session.start {
            return Err(SessionError::EndNotAfterStart);
        }

        session.end = Some(now);
        self.persist(&session).await?;
        info!(session_id = %session.id, "sleep session stopped");
        self.notify();
        Ok(())
    }

    /// Backfill a closed session with explicit start and end.
    ///
    /// Requires `end > start`; under the strict policy (the default) both
    /// timestamps must also be at or before `now`. Validation failure
    /// performs no mutation.
    pub async fn add_session(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if end <= start {
            return Err(SessionError::EndNotAfterStart);
        }
        if !self.validation.allow_future_sessions {
            if start > now {
                return Err(SessionError::StartInFuture);
            }
            if end > now {
                return Err(SessionError::EndInFuture);
            }
        }

        let _guard = self.write_lock.lock().await;
        let session = SleepSession::manual(start, end);
        self.persist(&session).await?;
        info!(session_id = %session.id, "manual sleep session added");
        self.notify();
        Ok(())
    }

    /// Sessions whose start falls on calendar day `date` in timezone `tz`,
    /// sorted ascending by start.
    ///
    /// Attribution is by start day only: a session crossing midnight
    /// belongs entirely to the day it started.
    pub fn sessions_on<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> Vec<SleepSession> {
        let mut sessions: Vec<SleepSession> = self
            .cache
            .lock()
            .iter()
            .filter(|s| s.start.with_timezone(tz).date_naive() == date)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.start);
        sessions
    }

    /// Total time slept on `date`.
    ///
    /// Closed sessions contribute their recorded span; the active session
    /// contributes the time elapsed up to the caller-supplied `now`, so
    /// repeated calls while asleep yield a non-decreasing total.
    pub fn total_sleep_duration<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Duration {
        self.sessions_on(date, tz)
            .iter()
            .map(|s| s.duration_as_of(now))
            .fold(Duration::zero(), |total, d| total + d)
    }

    /// The most recent `limit` sessions, newest start first.
    pub fn recent_sessions(&self, limit: usize) -> Vec<SleepSession> {
        let cache = self.cache.lock();
        cache.iter().take(limit).cloned().collect()
    }

    /// Snapshot of every cached session, newest start first.
    pub fn snapshot(&self) -> Vec<SleepSession> {
        self.cache.lock().clone()
    }

    /// Subscribe to the sessions-changed signal. The carried value is a
    /// generation counter; any change means "re-query".
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Name of the backing store.
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Save one record, then resynchronize the cache from the store. On
    /// save failure the cache is re-fetched anyway so it never reflects a
    /// write that did not land.
    async fn persist(&self, session: &SleepSession) -> Result<(), SessionError> {
        let result = self.store.save(session).await;
        self.refresh_locked().await;
        result.map_err(SessionError::Store)
    }

    /// Caller must hold `write_lock`.
    async fn refresh_locked(&self) {
        match self.store.load_all().await {
            Ok(mut sessions) => {
                sessions.sort_by(|a, b| b.start.cmp(&a.start));
                *self.cache.lock() = sessions;
            }
            Err(e) => {
                warn!(
                    store = self.store.name(),
                    "failed to load sessions, degrading to empty cache: {e:#}"
                );
                self.cache.lock().clear();
            }
        }
    }

    fn notify(&self) {
        self.changed.send_modify(|generation| *generation += 1);
    }
}
