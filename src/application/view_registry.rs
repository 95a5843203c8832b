// View registry - Explicit handles to built views, one live view per session
use crate::domain::channel::Trace;
use crate::domain::table::MergedTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Opaque token for a built view; decimation requests refer to the view through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewHandle(pub u64);

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A merged table plus what was asked for when building it. Immutable once registered.
#[derive(Debug)]
pub struct View {
    pub handle: ViewHandle,
    pub session: String,
    pub files: Vec<String>,
    pub traces: Vec<Trace>,
    /// Selected channels that no file contained.
    pub missing_channels: Vec<String>,
    pub table: MergedTable,
}

/// Proof that a build was started; only the session's latest ticket may commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTicket {
    session: String,
    generation: u64,
}

#[derive(Debug, Default)]
struct SessionSlot {
    generation: u64,
    view: Option<ViewHandle>,
    /// Registry tick of the last build or view lookup; the lowest is evicted first.
    last_used: AtomicU64,
}

pub const DEFAULT_MAX_SESSIONS: usize = 64;

#[derive(Debug)]
pub struct ViewRegistry {
    next_handle: AtomicU64,
    next_generation: AtomicU64,
    clock: AtomicU64,
    max_sessions: usize,
    sessions: RwLock<HashMap<String, SessionSlot>>,
    views: RwLock<HashMap<ViewHandle, Arc<View>>>,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::with_max_sessions(DEFAULT_MAX_SESSIONS)
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_sessions` sessions; starting a build for a new session beyond
    /// that drops the least recently used one together with its view.
    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            next_handle: AtomicU64::new(0),
            next_generation: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            max_sessions: max_sessions.max(1),
            sessions: RwLock::new(HashMap::new()),
            views: RwLock::new(HashMap::new()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Start a build for `session`, superseding any build already in flight there.
    pub async fn begin_build(&self, session: &str) -> BuildTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(session) && sessions.len() >= self.max_sessions {
            self.evict_least_recent(&mut sessions).await;
        }
        let slot = sessions.entry(session.to_string()).or_default();
        slot.generation = generation;
        slot.last_used.store(self.tick(), Ordering::Relaxed);

        BuildTicket {
            session: session.to_string(),
            generation,
        }
    }

    pub async fn is_current(&self, ticket: &BuildTicket) -> bool {
        self.sessions
            .read()
            .await
            .get(&ticket.session)
            .is_some_and(|slot| slot.generation == ticket.generation)
    }

    /// Install the result of a build and drop the session's previous view.
    /// Returns `None` when a newer build has started since `ticket` was issued.
    pub async fn commit(
        &self,
        ticket: BuildTicket,
        files: Vec<String>,
        traces: Vec<Trace>,
        missing_channels: Vec<String>,
        table: MergedTable,
    ) -> Option<Arc<View>> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(&ticket.session)
            .filter(|slot| slot.generation == ticket.generation)?;

        let handle = ViewHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        let view = Arc::new(View {
            handle,
            session: ticket.session,
            files,
            traces,
            missing_channels,
            table,
        });

        let mut views = self.views.write().await;
        if let Some(previous) = slot.view.replace(handle) {
            views.remove(&previous);
        }
        views.insert(handle, view.clone());

        Some(view)
    }

    pub async fn get(&self, handle: ViewHandle) -> Option<Arc<View>> {
        let view = self.views.read().await.get(&handle).cloned()?;
        if let Some(slot) = self.sessions.read().await.get(&view.session) {
            slot.last_used.store(self.tick(), Ordering::Relaxed);
        }
        Some(view)
    }

    /// Forget a session, its view and any build still running for it.
    pub async fn close_session(&self, session: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(slot) = sessions.remove(session) else {
            return false;
        };
        if let Some(handle) = slot.view {
            self.views.write().await.remove(&handle);
        }
        true
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn evict_least_recent(&self, sessions: &mut HashMap<String, SessionSlot>) {
        let Some(oldest) = sessions
            .iter()
            .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
            .map(|(name, _)| name.clone())
        else {
            return;
        };

        if let Some(slot) = sessions.remove(&oldest) {
            if let Some(handle) = slot.view {
                self.views.write().await.remove(&handle);
            }
            tracing::info!("Evicted idle session {}", oldest);
        }
    }
}
