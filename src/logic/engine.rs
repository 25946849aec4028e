use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::logic::generation::RequestGenerationGuard;
use crate::logic::mutator::OptimisticMutator;
use crate::logic::reconcile::hydrate_snapshot;
use crate::logic::state::{StateStore, WorkflowState};
use crate::logic::undo::UndoRecord;
use crate::model::{Board, Card, CardPatch, Id, ListPatch, WorkflowList};
use crate::store::{PrefetchCache, RemoteWorkflowService};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// How a call to [`WorkflowEngine::load_workflow`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fresh data from the remote service was installed.
    Fetched,
    /// A prefetched snapshot was installed without a network round trip.
    FromCache,
    /// A later load was issued before this one finished; its result was
    /// dropped.
    Superseded,
}

/// The mirrored board as the presentation layer sees it: read accessors,
/// loads and the optimistic actions.
pub struct WorkflowEngine<R: ?Sized> {
    remote: Arc<R>,
    state: Arc<StateStore>,
    guard: RequestGenerationGuard,
    cache: Arc<PrefetchCache>,
    mutator: OptimisticMutator<R>,
}

impl<R> WorkflowEngine<R>
where
    R: RemoteWorkflowService + ?Sized,
{
    pub fn new(remote: Arc<R>, config: &SyncConfig) -> Self {
        let state = Arc::new(StateStore::new());
        let cache = Arc::new(PrefetchCache::new(&config.prefetch));
        let mutator = OptimisticMutator::new(state.clone(), remote.clone(), cache.clone());
        Self {
            remote,
            state,
            guard: RequestGenerationGuard::new(),
            cache,
            mutator,
        }
    }

    // ---- Loading ----

    /// Load a board into the store.
    ///
    /// Reloading the board that is already on screen is a silent refresh: the
    /// visible data stays put and no loading state is shown. Otherwise the
    /// store is cleared first, and a fresh prefetched snapshot is used when
    /// one exists.
    pub async fn load_workflow(&self, board_id: &Id) -> SyncResult<LoadOutcome> {
        let token = self.guard.begin_load();
        let silent = self.state.is_showing(board_id);
        self.state.begin_load(board_id, silent);
        debug!(
            "Loading board {} (generation {}, silent: {})",
            board_id,
            token.generation(),
            silent
        );

        if !silent {
            if let Some(snapshot) = self.cache.consume(board_id).await {
                let snapshot = hydrate_snapshot(snapshot);
                if self
                    .state
                    .commit_snapshot(snapshot, || self.guard.is_current(token))
                {
                    info!("Loaded board {} from prefetch cache", board_id);
                    return Ok(LoadOutcome::FromCache);
                }
                return Ok(LoadOutcome::Superseded);
            }
        }

        let result = self.remote.fetch_workflow_snapshot(board_id).await;

        match result {
            Ok(snapshot) => {
                let snapshot = hydrate_snapshot(snapshot.normalized());
                if !self
                    .state
                    .commit_snapshot(snapshot.clone(), || self.guard.is_current(token))
                {
                    debug!(
                        "Discarding superseded load of board {} (generation {})",
                        board_id,
                        token.generation()
                    );
                    return Ok(LoadOutcome::Superseded);
                }
                info!(
                    "Loaded board {}: {} lists, {} cards",
                    board_id,
                    snapshot.lists.len(),
                    snapshot.card_count()
                );
                self.cache.put(board_id, snapshot).await;
                Ok(LoadOutcome::Fetched)
            }
            Err(err) => {
                let message = format!("{:#}", err);
                if !self
                    .state
                    .fail_load(message, silent, || self.guard.is_current(token))
                {
                    debug!("Ignoring failure of superseded load of board {}", board_id);
                    return Ok(LoadOutcome::Superseded);
                }
                warn!("Failed to load board {}: {:#}", board_id, err);
                Err(SyncError::Load {
                    board_id: board_id.clone(),
                    source: err,
                })
            }
        }
    }

    /// Silently reload the active board.
    pub async fn refresh(&self) -> SyncResult<LoadOutcome> {
        let board_id = self.board_id().ok_or(SyncError::NoActiveBoard)?;
        self.load_workflow(&board_id).await
    }

    /// Reset to the empty state, e.g. when navigating away. Any load still in
    /// flight is superseded.
    pub fn clear_workflow(&self) {
        self.guard.supersede();
        self.state.clear();
    }

    /// Warm the cache for a board the user is likely to open next.
    pub async fn prefetch(&self, board_id: &Id) -> bool {
        self.cache.prefetch(&*self.remote, board_id).await
    }

    pub fn cache(&self) -> &PrefetchCache {
        &self.cache
    }

    // ---- Reads ----

    pub fn board(&self) -> Option<Board> {
        self.state.read(|s| s.board.clone())
    }

    pub fn lists(&self) -> Vec<WorkflowList> {
        self.state.read(|s| s.lists.clone())
    }

    pub fn cards_by_list(&self) -> HashMap<Id, Vec<Card>> {
        self.state.read(|s| s.cards_by_list.clone())
    }

    pub fn cards_in(&self, list_id: &str) -> Vec<Card> {
        self.state
            .read(|s| s.cards_by_list.get(list_id).cloned().unwrap_or_default())
    }

    pub fn loading(&self) -> bool {
        self.state.read(|s| s.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.state.read(|s| s.error.clone())
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.read(|s| s.last_updated)
    }

    pub fn board_id(&self) -> Option<Id> {
        self.state.read(|s| s.board_id.clone())
    }

    pub fn get_card(&self, card_id: &str) -> Option<Card> {
        self.state.get_card(card_id)
    }

    pub fn get_list(&self, list_id: &str) -> Option<WorkflowList> {
        self.state.get_list(list_id)
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.snapshot()
    }

    pub fn pending_mutations(&self) -> usize {
        self.state.pending_mutations()
    }

    pub fn mutation_history(&self) -> Vec<UndoRecord> {
        self.state.mutation_history()
    }

    // ---- Actions ----

    pub async fn add_list(&self, board_id: &Id, title: &str) -> SyncResult<WorkflowList> {
        self.mutator.add_list(board_id, title).await
    }

    pub async fn update_list(&self, list_id: &Id, fields: &ListPatch) -> SyncResult<WorkflowList> {
        self.mutator.update_list(list_id, fields).await
    }

    pub async fn delete_list(&self, list_id: &Id) -> SyncResult<()> {
        self.mutator.delete_list(list_id).await
    }

    pub async fn move_list(&self, list_id: &Id, new_position: usize) -> SyncResult<()> {
        self.mutator.move_list(list_id, new_position).await
    }

    pub async fn add_card(&self, list_id: &Id, title: &str, board_id: &Id) -> SyncResult<Card> {
        self.mutator.add_card(list_id, title, board_id).await
    }

    pub async fn update_card(&self, card_id: &Id, fields: &CardPatch) -> SyncResult<Card> {
        self.mutator.update_card(card_id, fields).await
    }

    pub async fn delete_card(&self, card_id: &Id) -> SyncResult<()> {
        self.mutator.delete_card(card_id).await
    }

    pub async fn move_card(
        &self,
        card_id: &Id,
        dest_list_id: &Id,
        dest_position: usize,
        new_status: Option<&str>,
    ) -> SyncResult<Card> {
        self.mutator
            .move_card(card_id, dest_list_id, dest_position, new_status)
            .await
    }

    pub fn patch_card_locally(&self, card_id: &Id, fields: &CardPatch) -> SyncResult<Card> {
        self.mutator.patch_card_locally(card_id, fields)
    }

    pub fn patch_list_locally(&self, list_id: &Id, fields: &ListPatch) -> SyncResult<WorkflowList> {
        self.mutator.patch_list_locally(list_id, fields)
    }
}

impl<R> WorkflowEngine<R>
where
    R: RemoteWorkflowService + ?Sized + 'static,
{
    /// Prefetch on the runtime without blocking the caller.
    pub fn spawn_prefetch(self: &Arc<Self>, board_id: Id) -> JoinHandle<bool> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.prefetch(&board_id).await })
    }
}
