//! In-memory session store implementation.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use super::traits::{SessionStore, SleepSession};

/// An in-memory session store backed by a mutex-protected hash map.
///
/// Nothing survives the process; intended for tests and for embedding the
/// manager without persistence.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<Uuid, SleepSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_all(&self) -> Result<Vec<SleepSession>> {
        let sessions = self.sessions.lock();
        Ok(sessions.values().cloned().collect())
    }

    async fn save(&self, session: &SleepSession) -> Result<()> {
        let mut sessions = self.sessions.lock();
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
