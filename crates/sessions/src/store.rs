use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::log::LogBuffer;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Cleanup,
    CreateUsers,
    CreateAccounts,
    BuildProductHierarchy,
    GenerateTickets,
    GenerateIssues,
    GenerateOpportunities,
    ApplySettings,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub progress: u8,
    pub status: String,
    pub complete: bool,
    pub error: Option<String>,
}

struct SessionState {
    phase: Phase,
    progress: u8,
    status: String,
    complete: bool,
    error: Option<String>,
    log: LogBuffer,
    finished_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn is_terminal(&self) -> bool {
        self.complete || self.error.is_some()
    }
}

struct SessionEntry {
    state: RwLock<SessionState>,
}

/// Registry of live pipeline sessions.
///
/// The map lock is only held to look up an `Arc<SessionEntry>`; each entry
/// carries its own lock, so the single writer of one session never blocks
/// readers or writers of another.
pub struct SessionStore {
    entries: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let entry = Arc::new(SessionEntry {
            state: RwLock::new(SessionState {
                phase: Phase::Init,
                progress: 0,
                status: "Initializing...".to_string(),
                complete: false,
                error: None,
                log: LogBuffer::default(),
                finished_at: None,
            }),
        });
        self.entries.write().unwrap().insert(id, entry);
        id
    }

    fn entry(&self, id: Uuid) -> Result<Arc<SessionEntry>, SessionError> {
        self.entries
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound)
    }

    /// Atomic read-modify-write of phase/progress/status.
    ///
    /// Progress may never move backwards; a lower value is a logged no-op
    /// (the message still lands so status text keeps up with the run).
    /// Progress through this path is capped at 99: only `mark_complete`
    /// yields 100, keeping `progress == 100 <=> complete`.
    pub fn update(
        &self,
        id: Uuid,
        phase: Phase,
        progress: u8,
        message: &str,
    ) -> Result<(), SessionError> {
        let entry = self.entry(id)?;
        let mut state = entry.state.write().unwrap();
        if state.is_terminal() {
            return Ok(());
        }
        let capped = progress.min(99);
        if capped < state.progress {
            tracing::debug!(
                session_id = %id,
                stored = state.progress,
                rejected = capped,
                "ignoring non-monotonic progress update"
            );
        } else {
            state.progress = capped;
        }
        state.phase = phase;
        state.status = message.to_string();
        Ok(())
    }

    pub fn append_log(&self, id: Uuid, line: &str) -> Result<(), SessionError> {
        let entry = self.entry(id)?;
        entry.state.write().unwrap().log.append(Utc::now(), line);
        Ok(())
    }

    /// Terminal success transition. Idempotent; a no-op after any terminal
    /// state has been reached.
    pub fn mark_complete(&self, id: Uuid) -> Result<(), SessionError> {
        let entry = self.entry(id)?;
        let mut state = entry.state.write().unwrap();
        if state.is_terminal() {
            return Ok(());
        }
        state.phase = Phase::Done;
        state.progress = 100;
        state.complete = true;
        state.status = "Completed successfully".to_string();
        state.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Terminal failure transition. Idempotent under the same rule.
    pub fn mark_error(&self, id: Uuid, message: &str) -> Result<(), SessionError> {
        let entry = self.entry(id)?;
        let mut state = entry.state.write().unwrap();
        if state.is_terminal() {
            return Ok(());
        }
        state.phase = Phase::Error;
        state.error = Some(message.to_string());
        state.status = format!("Error: {message}");
        state.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let entry = self.entry(id)?;
        let state = entry.state.read().unwrap();
        Ok(SessionSnapshot {
            phase: state.phase,
            progress: state.progress,
            status: state.status.clone(),
            complete: state.complete,
            error: state.error.clone(),
        })
    }

    pub fn log_artifact(&self, id: Uuid) -> Result<Vec<u8>, SessionError> {
        let entry = self.entry(id)?;
        let state = entry.state.read().unwrap();
        Ok(state.log.artifact())
    }

    /// Drops sessions whose terminal state is older than the TTL. Returns the
    /// number of sessions removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1));
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| {
            let state = entry.state.read().unwrap();
            match state.finished_at {
                Some(finished_at) => now - finished_at < ttl,
                None => true,
            }
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(3600))
    }

    #[test]
    fn new_session_starts_at_init() {
        let store = store();
        let id = store.create();
        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.phase, Phase::Init);
        assert_eq!(snap.progress, 0);
        assert!(!snap.complete);
        assert!(snap.error.is_none());
    }

    #[test]
    fn progress_is_monotone() {
        let store = store();
        let id = store.create();
        store.update(id, Phase::CreateUsers, 30, "users").unwrap();
        store.update(id, Phase::CreateAccounts, 20, "stale").unwrap();
        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.progress, 30);
        // Phase and status still advance even when the value is rejected.
        assert_eq!(snap.phase, Phase::CreateAccounts);
        assert_eq!(snap.status, "stale");
    }

    #[test]
    fn update_never_reports_one_hundred() {
        let store = store();
        let id = store.create();
        store.update(id, Phase::ApplySettings, 100, "almost").unwrap();
        assert_eq!(store.snapshot(id).unwrap().progress, 99);
    }

    #[test]
    fn complete_forces_progress_to_one_hundred() {
        let store = store();
        let id = store.create();
        store.update(id, Phase::ApplySettings, 90, "settings").unwrap();
        store.mark_complete(id).unwrap();
        let snap = store.snapshot(id).unwrap();
        assert!(snap.complete);
        assert_eq!(snap.progress, 100);
        assert!(snap.error.is_none());
    }

    #[test]
    fn terminal_transitions_are_idempotent_and_exclusive() {
        let store = store();
        let id = store.create();
        store.mark_error(id, "boom").unwrap();
        store.mark_complete(id).unwrap();
        store.mark_error(id, "again").unwrap();

        let snap = store.snapshot(id).unwrap();
        assert!(!snap.complete);
        assert_eq!(snap.error.as_deref(), Some("boom"));
        assert_ne!(snap.progress, 100);
    }

    #[test]
    fn updates_after_terminal_state_are_no_ops() {
        let store = store();
        let id = store.create();
        store.mark_complete(id).unwrap();
        store.update(id, Phase::Cleanup, 10, "late").unwrap();
        let snap = store.snapshot(id).unwrap();
        assert_eq!(snap.phase, Phase::Done);
        assert_eq!(snap.progress, 100);
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = store();
        assert!(matches!(
            store.snapshot(Uuid::new_v4()),
            Err(SessionError::NotFound)
        ));
        assert!(matches!(
            store.log_artifact(Uuid::new_v4()),
            Err(SessionError::NotFound)
        ));
    }

    #[test]
    fn concurrent_sessions_do_not_interfere() {
        let store = store();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);

        store.update(a, Phase::Cleanup, 50, "cleanup").unwrap();
        store.update(b, Phase::CreateUsers, 10, "users").unwrap();

        assert_eq!(store.snapshot(a).unwrap().progress, 50);
        assert_eq!(store.snapshot(b).unwrap().progress, 10);
    }

    #[test]
    fn sweep_drops_only_expired_terminal_sessions() {
        let store = SessionStore::new(Duration::from_secs(0));
        let done = store.create();
        let live = store.create();
        store.mark_complete(done).unwrap();

        let removed = store.sweep_expired(Utc::now() + chrono::Duration::seconds(1));
        assert_eq!(removed, 1);
        assert!(store.snapshot(done).is_err());
        assert!(store.snapshot(live).is_ok());
    }
}
