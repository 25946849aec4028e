//! Structural edits to the mirrored board and the log of their inverses.
//!
//! Every optimistic mutation is staged as a forward [`Change`] together with
//! the [`Change`] that undoes it. Rollback is applying the stored inverse.

use crate::error::Operation;
use crate::logic::state::WorkflowState;
use crate::model::{Card, Id, WorkflowList};
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};

/// Finished records kept around for inspection.
const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Append a list (and its card bucket) at the end of the board.
    AppendList { list: WorkflowList, cards: Vec<Card> },
    /// Remove a list together with its card bucket.
    RemoveList { list_id: Id },
    /// Replace a list in place, keeping its position.
    ReplaceList { list: WorkflowList },
    /// Reorder lists to follow `order`; lists missing from it go last.
    RestoreListOrder { order: Vec<Id> },
    MoveList { list_id: Id, index: usize },
    /// Append a card at the end of the bucket named by its `list_id`.
    AppendCard { card: Card },
    RemoveCard { card_id: Id },
    /// Replace a card in each of `buckets` where it is present.
    ReplaceCard { card: Card, buckets: Vec<Id> },
    MoveCard {
        card_id: Id,
        dest_list_id: Id,
        index: usize,
        status: Option<String>,
    },
    /// Put back a whole card mapping captured earlier.
    RestoreCards { cards_by_list: HashMap<Id, Vec<Card>> },
}

impl Change {
    /// Apply the change. Every collection it touches ends up numbered 0..n-1.
    pub fn apply(&self, state: &mut WorkflowState) {
        match self {
            Change::AppendList { list, cards } => {
                if state.get_list(&list.id).is_some() {
                    debug!("List {} is already on the board", list.id);
                    return;
                }
                state.lists.push(list.clone());
                state.cards_by_list.insert(list.id.clone(), cards.clone());
                state.renumber_lists();
                state.renumber_cards(&list.id);
            }
            Change::RemoveList { list_id } => {
                state.lists.retain(|list| list.id != *list_id);
                state.cards_by_list.remove(list_id);
                state.renumber_lists();
            }
            Change::ReplaceList { list } => {
                if let Some(slot) = state.lists.iter_mut().find(|l| l.id == list.id) {
                    let position = slot.position;
                    *slot = list.clone();
                    slot.position = position;
                }
            }
            Change::RestoreListOrder { order } => {
                let rank: HashMap<&str, usize> = order
                    .iter()
                    .enumerate()
                    .map(|(index, id)| (id.as_str(), index))
                    .collect();
                state
                    .lists
                    .sort_by_key(|list| rank.get(list.id.as_str()).copied().unwrap_or(usize::MAX));
                state.renumber_lists();
            }
            Change::MoveList { list_id, index } => {
                let Some(from) = state.lists.iter().position(|l| l.id == *list_id) else {
                    warn!("Cannot move list {}: not on the board", list_id);
                    return;
                };
                let list = state.lists.remove(from);
                let index = (*index).min(state.lists.len());
                state.lists.insert(index, list);
                state.renumber_lists();
            }
            Change::AppendCard { card } => {
                if state.get_card(&card.id).is_some() {
                    debug!("Card {} is already on the board", card.id);
                    return;
                }
                let Some(cards) = state.cards_by_list.get_mut(&card.list_id) else {
                    warn!(
                        "Cannot put card {} back: list {} is gone",
                        card.id, card.list_id
                    );
                    return;
                };
                cards.push(card.clone());
                state.renumber_cards(&card.list_id);
            }
            Change::RemoveCard { card_id } => {
                let Some((list_id, index)) = state.locate_card(card_id) else {
                    return;
                };
                if let Some(cards) = state.cards_by_list.get_mut(&list_id) {
                    cards.remove(index);
                }
                state.renumber_cards(&list_id);
            }
            Change::ReplaceCard { card, buckets } => {
                for list_id in buckets {
                    let Some(cards) = state.cards_by_list.get_mut(list_id) else {
                        continue;
                    };
                    if let Some(slot) = cards.iter_mut().find(|c| c.id == card.id) {
                        let position = slot.position;
                        *slot = card.clone();
                        slot.position = position;
                        slot.list_id = list_id.clone();
                    }
                }
            }
            Change::MoveCard {
                card_id,
                dest_list_id,
                index,
                status,
            } => {
                if !state.cards_by_list.contains_key(dest_list_id) {
                    warn!("Cannot move card {}: list {} is gone", card_id, dest_list_id);
                    return;
                }
                let Some((source_list_id, from)) = state.locate_card(card_id) else {
                    warn!("Cannot move card {}: not on the board", card_id);
                    return;
                };
                let Some(mut card) = state
                    .cards_by_list
                    .get_mut(&source_list_id)
                    .map(|cards| cards.remove(from))
                else {
                    return;
                };
                card.list_id = dest_list_id.clone();
                if let Some(status) = status {
                    card.status = Some(status.clone());
                }
                if let Some(dest) = state.cards_by_list.get_mut(dest_list_id) {
                    let index = (*index).min(dest.len());
                    dest.insert(index, card);
                }
                state.renumber_cards(&source_list_id);
                state.renumber_cards(dest_list_id);
            }
            Change::RestoreCards { cards_by_list } => {
                state.cards_by_list = cards_by_list.clone();
                // Lists created or removed since the capture keep their own buckets.
                let live: Vec<Id> = state.lists.iter().map(|l| l.id.clone()).collect();
                state.cards_by_list.retain(|list_id, _| live.contains(list_id));
                for list_id in live {
                    state.cards_by_list.entry(list_id).or_default();
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    OptimisticPending,
    Committed,
    RolledBack,
    /// Staged against data that a later load or clear replaced. Neither the
    /// commit nor the inverse ran.
    Discarded,
}

/// Handle for one staged mutation, tagged with the board it was staged
/// against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    seq: u64,
    board_id: Option<Id>,
}

impl Ticket {
    pub fn board_id(&self) -> Option<&Id> {
        self.board_id.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub ticket: Ticket,
    pub operation: Operation,
    pub inverse: Change,
    pub phase: MutationPhase,
    /// Epoch of the mirrored data the change was applied to.
    pub epoch: u64,
}

/// Inverses of the optimistic changes still waiting for the server, plus a
/// short history of finished ones.
///
/// Every load that replaces the mirrored data starts a new epoch. Records
/// from an older epoch are retired as [`MutationPhase::Discarded`], so a late
/// response can neither commit into nor roll back over data it never saw.
#[derive(Debug, Default)]
pub struct UndoLog {
    next: u64,
    epoch: u64,
    pending: Vec<UndoRecord>,
    history: VecDeque<UndoRecord>,
}

impl UndoLog {
    pub fn push(&mut self, operation: Operation, inverse: Change, board_id: Option<Id>) -> Ticket {
        self.next += 1;
        let ticket = Ticket {
            seq: self.next,
            board_id,
        };
        self.pending.push(UndoRecord {
            ticket: ticket.clone(),
            operation,
            inverse,
            phase: MutationPhase::OptimisticPending,
            epoch: self.epoch,
        });
        ticket
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Take the pending record for `ticket` if it belongs to the current
    /// epoch.
    pub fn take(&mut self, ticket: &Ticket) -> Option<UndoRecord> {
        let epoch = self.epoch;
        let index = self
            .pending
            .iter()
            .position(|r| r.ticket == *ticket && r.epoch == epoch)?;
        Some(self.pending.remove(index))
    }

    /// Move a taken record into the history with its final phase.
    pub fn finish(&mut self, mut record: UndoRecord, phase: MutationPhase) {
        record.phase = phase;
        self.history.push_back(record);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Start a new epoch, retiring every pending record. Returns how many
    /// were retired.
    pub fn advance_epoch(&mut self) -> usize {
        self.epoch += 1;
        let retired: Vec<UndoRecord> = self.pending.drain(..).collect();
        let count = retired.len();
        for record in retired {
            self.finish(record, MutationPhase::Discarded);
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn records(&self) -> &[UndoRecord] {
        &self.pending
    }

    /// Finished records, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &UndoRecord> {
        self.history.iter()
    }
}
