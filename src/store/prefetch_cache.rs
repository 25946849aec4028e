use crate::config::PrefetchConfig;
use crate::model::{Id, WorkflowSnapshot};
use crate::store::traits::RemoteWorkflowService;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache entry for a prefetched board
#[derive(Clone, Debug)]
struct CacheEntry {
    snapshot: WorkflowSnapshot,
    fetched_at: Instant,
}

/// Marks a board as being prefetched; released on drop.
struct InFlight {
    boards: Arc<parking_lot::Mutex<HashSet<Id>>>,
    board_id: Id,
}

impl InFlight {
    fn claim(boards: &Arc<parking_lot::Mutex<HashSet<Id>>>, board_id: &Id) -> Option<Self> {
        if !boards.lock().insert(board_id.clone()) {
            return None;
        }
        Some(Self {
            boards: Arc::clone(boards),
            board_id: board_id.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.boards.lock().remove(&self.board_id);
    }
}

/// Time-bounded cache of complete board snapshots, keyed by board id
#[derive(Debug)]
pub struct PrefetchCache {
    entries: Arc<RwLock<HashMap<Id, CacheEntry>>>,
    in_flight: Arc<parking_lot::Mutex<HashSet<Id>>>,
    refresh_after: Duration,
    valid_for: Duration,
}

impl PrefetchCache {
    pub fn new(config: &PrefetchConfig) -> Self {
        Self::with_windows(config.refresh_after(), config.valid_for())
    }

    pub fn with_windows(refresh_after: Duration, valid_for: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(parking_lot::Mutex::new(HashSet::new())),
            refresh_after,
            valid_for,
        }
    }

    /// Fetch and store a board unless a copy younger than the refresh window
    /// is already cached or another prefetch of it is running. Failures are
    /// logged and swallowed. Returns whether a new snapshot was stored.
    pub async fn prefetch<R>(&self, remote: &R, board_id: &Id) -> bool
    where
        R: RemoteWorkflowService + ?Sized,
    {
        if let Some(age) = self.age(board_id).await {
            if age < self.refresh_after {
                debug!("Prefetch of board {} skipped, cached copy is {:?} old", board_id, age);
                return false;
            }
        }

        let Some(_flight) = InFlight::claim(&self.in_flight, board_id) else {
            debug!("Prefetch of board {} already running", board_id);
            return false;
        };

        match remote.fetch_workflow_snapshot(board_id).await {
            Ok(snapshot) => {
                self.put(board_id, snapshot).await;
                true
            }
            Err(err) => {
                warn!("Prefetch of board {} failed: {:#}", board_id, err);
                false
            }
        }
    }

    /// Get a cached snapshot if it is still inside the validity window.
    /// Expired entries are dropped.
    pub async fn consume(&self, board_id: &Id) -> Option<WorkflowSnapshot> {
        let mut entries = self.entries.write().await;

        let entry = entries.get(board_id)?;
        if entry.fetched_at.elapsed() >= self.valid_for {
            entries.remove(board_id);
            return None;
        }
        Some(entry.snapshot.clone())
    }

    /// Put a snapshot into the cache, stamped with the current time
    pub async fn put(&self, board_id: &Id, snapshot: WorkflowSnapshot) {
        let mut entries = self.entries.write().await;
        entries.insert(
            board_id.clone(),
            CacheEntry {
                snapshot: snapshot.normalized(),
                fetched_at: Instant::now(),
            },
        );
    }

    pub async fn age(&self, board_id: &Id) -> Option<Duration> {
        let entries = self.entries.read().await;
        entries.get(board_id).map(|entry| entry.fetched_at.elapsed())
    }

    pub async fn contains(&self, board_id: &Id) -> bool {
        self.entries.read().await.contains_key(board_id)
    }

    /// Drop a board whose cached copy no longer reflects local edits
    pub async fn invalidate(&self, board_id: &Id) {
        self.entries.write().await.remove(board_id);
    }

    /// Clear all entries past the validity window
    pub async fn clear_expired(&self) {
        let valid_for = self.valid_for;
        self.entries
            .write()
            .await
            .retain(|_, entry| entry.fetched_at.elapsed() < valid_for);
    }

    /// Clear the entire cache
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for PrefetchCache {
    fn default() -> Self {
        Self::new(&PrefetchConfig::default())
    }
}
