use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::models::{Session, SessionView};

/// How often idle sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-memory session registry shared by all handlers.
///
/// Closures passed to `read`/`update` run while the shard lock is held: they
/// must not block or await.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, Session>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: chrono::Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64),
        }
    }

    pub fn create(&self) -> SessionView {
        let session = Session::new();
        let view = session.view();
        self.sessions.insert(session.id, session);
        view
    }

    pub fn view(&self, id: Uuid) -> Result<SessionView, AppError> {
        self.read(id, |s| Ok(s.view()))
    }

    pub fn read<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&Session) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let session = self.sessions.get(&id).ok_or_else(|| not_found(id))?;
        f(&session)
    }

    /// Runs `f` on the session and marks it active.
    pub fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut session = self.sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        session.touch();
        f(&mut session)
    }

    pub fn remove(&self, id: Uuid) -> Result<(), AppError> {
        self.sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    /// Drops sessions idle for longer than the TTL. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.last_active_at >= cutoff);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Background task that evicts idle sessions until the runtime shuts down.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle();
                if evicted > 0 {
                    info!(
                        "Evicted {evicted} idle sessions ({} remaining)",
                        store.len()
                    );
                }
            }
        })
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Session {id} not found"))
}
