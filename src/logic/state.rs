use crate::error::{Operation, SyncResult};
use crate::logic::undo::{Change, MutationPhase, Ticket, UndoLog, UndoRecord};
use crate::model::{is_temp_id, Board, Card, Id, WorkflowList, WorkflowSnapshot};
use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// The board currently mirrored in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub board: Option<Board>,
    pub lists: Vec<WorkflowList>,
    pub cards_by_list: HashMap<Id, Vec<Card>>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Board the data (or the pending load) belongs to.
    pub board_id: Option<Id>,
}

impl WorkflowState {
    pub fn get_card(&self, card_id: &str) -> Option<&Card> {
        self.cards_by_list
            .values()
            .flat_map(|cards| cards.iter())
            .find(|card| card.id == card_id)
    }

    pub fn get_list(&self, list_id: &str) -> Option<&WorkflowList> {
        self.lists.iter().find(|list| list.id == list_id)
    }

    /// Bucket and index of a card.
    pub fn locate_card(&self, card_id: &str) -> Option<(Id, usize)> {
        self.cards_by_list.iter().find_map(|(list_id, cards)| {
            cards
                .iter()
                .position(|card| card.id == card_id)
                .map(|index| (list_id.clone(), index))
        })
    }

    /// Every bucket currently holding a card with this id.
    pub fn buckets_holding(&self, card_id: &str) -> Vec<Id> {
        self.cards_by_list
            .iter()
            .filter(|(_, cards)| cards.iter().any(|card| card.id == card_id))
            .map(|(list_id, _)| list_id.clone())
            .collect()
    }

    pub fn has_data(&self) -> bool {
        self.board.is_some()
    }

    pub(crate) fn renumber_cards(&mut self, list_id: &str) {
        if let Some(cards) = self.cards_by_list.get_mut(list_id) {
            for (position, card) in cards.iter_mut().enumerate() {
                card.position = position;
                card.list_id = list_id.to_string();
            }
        }
    }

    pub(crate) fn renumber_lists(&mut self) {
        for (position, list) in self.lists.iter_mut().enumerate() {
            list.position = position;
        }
    }

    /// Swap a card for the server's version, keeping the local placement.
    /// Applies to every bucket holding `local_id`.
    pub(crate) fn commit_card(&mut self, local_id: &str, canonical: &Card) -> Option<Card> {
        let mut committed = None;
        for cards in self.cards_by_list.values_mut() {
            for card in cards.iter_mut().filter(|card| card.id == local_id) {
                let mut next = canonical.clone();
                next.list_id = card.list_id.clone();
                next.position = card.position;
                next.pending = false;
                *card = next.clone();
                committed = Some(next);
            }
        }
        committed
    }

    /// Swap a list for the server's version, keeping its local position and
    /// moving any cards filed under the old id.
    pub(crate) fn commit_list(&mut self, local_id: &str, canonical: &WorkflowList) -> Option<WorkflowList> {
        let list = self.lists.iter_mut().find(|list| list.id == local_id)?;
        let mut next = canonical.clone();
        next.position = list.position;
        next.pending = false;
        *list = next.clone();

        if local_id != next.id {
            let cards = self.cards_by_list.remove(local_id).unwrap_or_default();
            let bucket = self.cards_by_list.entry(next.id.clone()).or_default();
            bucket.extend(cards);
            self.renumber_cards(&next.id);
        }
        Some(next)
    }

    fn install(&mut self, snapshot: WorkflowSnapshot) {
        let snapshot = snapshot.normalized();
        self.board_id = Some(snapshot.board.id.clone());
        self.board = Some(snapshot.board);
        self.lists = snapshot.lists;
        self.cards_by_list = snapshot.cards_by_list;
        self.loading = false;
        self.error = None;
        self.last_updated = Some(Utc::now());
    }

    fn clear_data(&mut self) {
        self.board = None;
        self.lists.clear();
        self.cards_by_list.clear();
    }

    /// Verify the ordering and membership invariants of the mirrored board.
    pub fn check_invariants(&self) -> Result<()> {
        for (index, list) in self.lists.iter().enumerate() {
            ensure!(
                list.position == index,
                "list {} has position {} at index {}",
                list.id,
                list.position,
                index
            );
            ensure!(
                self.cards_by_list.contains_key(&list.id),
                "list {} has no card bucket",
                list.id
            );
            ensure!(
                list.pending == is_temp_id(&list.id),
                "list {} pending marker does not match its identity",
                list.id
            );
        }

        let list_ids: HashSet<&str> = self.lists.iter().map(|list| list.id.as_str()).collect();
        ensure!(list_ids.len() == self.lists.len(), "duplicate list ids");

        let mut seen = HashSet::new();
        for (list_id, cards) in &self.cards_by_list {
            ensure!(
                list_ids.contains(list_id.as_str()),
                "bucket {} has no matching list",
                list_id
            );
            for (index, card) in cards.iter().enumerate() {
                ensure!(
                    card.position == index,
                    "card {} has position {} at index {} of list {}",
                    card.id,
                    card.position,
                    index,
                    list_id
                );
                ensure!(
                    card.list_id == *list_id,
                    "card {} references list {} but sits in {}",
                    card.id,
                    card.list_id,
                    list_id
                );
                ensure!(seen.insert(card.id.as_str()), "card {} appears twice", card.id);
                ensure!(
                    card.pending == is_temp_id(&card.id),
                    "card {} pending marker does not match its identity",
                    card.id
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    state: WorkflowState,
    undo: UndoLog,
}

/// Single owner of the mirrored board. Every method takes the lock for the
/// duration of one synchronous step; no lock is held across an await.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<StoreInner>,
}

impl StoreInner {
    /// The mirrored data was replaced; staged mutations no longer apply to it.
    fn replace_epoch(&mut self) {
        let retired = self.undo.advance_epoch();
        if retired > 0 {
            debug!("Discarded {} pending mutation(s) staged against replaced data", retired);
        }
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<T>(&self, f: impl FnOnce(&WorkflowState) -> T) -> T {
        f(&self.inner.read().state)
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.inner.read().state.clone()
    }

    pub fn get_card(&self, card_id: &str) -> Option<Card> {
        self.read(|state| state.get_card(card_id).cloned())
    }

    pub fn get_list(&self, list_id: &str) -> Option<WorkflowList> {
        self.read(|state| state.get_list(list_id).cloned())
    }

    /// Whether `board_id` is the active board and its data is on screen.
    pub fn is_showing(&self, board_id: &str) -> bool {
        self.read(|state| state.board_id.as_deref() == Some(board_id) && state.has_data())
    }

    /// Enter the loading state for `board_id`. A silent load leaves the
    /// visible data alone.
    pub fn begin_load(&self, board_id: &Id, silent: bool) {
        let mut inner = self.inner.write();
        inner.state.error = None;
        if silent {
            return;
        }
        inner.state.clear_data();
        inner.state.board_id = Some(board_id.clone());
        inner.state.loading = true;
        inner.replace_epoch();
    }

    /// Install a fetched snapshot if `still_current` holds at commit time.
    pub fn commit_snapshot(&self, snapshot: WorkflowSnapshot, still_current: impl FnOnce() -> bool) -> bool {
        let mut inner = self.inner.write();
        if !still_current() {
            return false;
        }
        inner.state.install(snapshot);
        inner.replace_epoch();
        true
    }

    /// Record a failed load. A failed first load shows nothing; a failed
    /// silent refresh keeps the complete data that was already visible.
    pub fn fail_load(&self, message: String, silent: bool, still_current: impl FnOnce() -> bool) -> bool {
        let mut inner = self.inner.write();
        if !still_current() {
            return false;
        }
        if !silent {
            inner.state.clear_data();
            inner.replace_epoch();
        }
        inner.state.loading = false;
        inner.state.error = Some(message);
        true
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.state = WorkflowState::default();
        inner.replace_epoch();
    }

    /// Plan a change against the current state, record its inverse and apply
    /// it, all in one step.
    pub fn stage_with<T>(
        &self,
        operation: Operation,
        plan: impl FnOnce(&WorkflowState) -> SyncResult<(Change, Change, T)>,
    ) -> SyncResult<(Ticket, T)> {
        let mut inner = self.inner.write();
        let (forward, inverse, value) = plan(&inner.state)?;
        let board_id = inner.state.board_id.clone();
        let ticket = inner.undo.push(operation, inverse, board_id);
        forward.apply(&mut inner.state);
        debug!("Applied optimistic {} as {:?}", operation, ticket);
        Ok((ticket, value))
    }

    /// Mark a staged change as acknowledged and run `commit` against the
    /// state. Returns `None` when the change no longer belongs to the mirrored
    /// data (a load or clear replaced it in the meantime), in which case
    /// `commit` is not run.
    pub fn settle<T>(&self, ticket: &Ticket, commit: impl FnOnce(&mut WorkflowState) -> T) -> Option<T> {
        let mut inner = self.inner.write();
        let record = inner.undo.take(ticket)?;
        let value = commit(&mut inner.state);
        inner.state.last_updated = Some(Utc::now());
        debug!("Committed {} ({:?})", record.operation, record.ticket);
        inner.undo.finish(record, MutationPhase::Committed);
        Some(value)
    }

    /// Undo a staged change. Returns false when there was nothing to undo,
    /// including when the data it was staged against has been replaced.
    pub fn revert(&self, ticket: &Ticket) -> bool {
        let mut inner = self.inner.write();
        let Some(record) = inner.undo.take(ticket) else {
            return false;
        };
        record.inverse.apply(&mut inner.state);
        debug!("Rolled back {} ({:?})", record.operation, record.ticket);
        inner.undo.finish(record, MutationPhase::RolledBack);
        true
    }

    /// Mutate the state directly, without an undo record.
    pub fn update<T>(&self, f: impl FnOnce(&mut WorkflowState) -> T) -> T {
        f(&mut self.inner.write().state)
    }

    pub fn pending_mutations(&self) -> usize {
        self.inner.read().undo.pending()
    }

    /// Recently finished mutations, oldest first.
    pub fn mutation_history(&self) -> Vec<UndoRecord> {
        self.inner.read().undo.history().cloned().collect()
    }
}
