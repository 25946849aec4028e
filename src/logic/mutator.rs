use crate::error::{Operation, SyncError, SyncResult};
use crate::logic::reconcile::{reconcile_card, reconcile_patch};
use crate::logic::state::StateStore;
use crate::logic::undo::{Change, Ticket};
use crate::model::{Card, CardPatch, Id, ListPatch, WorkflowList};
use crate::store::{PrefetchCache, RemoteWorkflowService};
use log::{debug, warn};
use std::sync::Arc;

/// Optimistic add/update/delete/move for lists and cards.
///
/// Each operation applies its change to the [`StateStore`] before the remote
/// call is issued. A successful response is folded into the state; a failure
/// applies the recorded inverse and is returned to the caller.
///
/// Operations on the same entity are not sequenced against each other: if two
/// are in flight at once, whichever response lands last wins.
pub struct OptimisticMutator<R: ?Sized> {
    state: Arc<StateStore>,
    remote: Arc<R>,
    cache: Arc<PrefetchCache>,
}

impl<R> OptimisticMutator<R>
where
    R: RemoteWorkflowService + ?Sized,
{
    pub fn new(state: Arc<StateStore>, remote: Arc<R>, cache: Arc<PrefetchCache>) -> Self {
        Self {
            state,
            remote,
            cache,
        }
    }

    pub async fn add_list(&self, board_id: &Id, title: &str) -> SyncResult<WorkflowList> {
        let (ticket, temp) = self.state.stage_with(Operation::CreateList, |state| {
            if state.board_id.as_ref() != Some(board_id) || !state.has_data() {
                return Err(SyncError::NoActiveBoard);
            }
            let temp = WorkflowList::optimistic(board_id, title, state.lists.len());
            Ok((
                Change::AppendList {
                    list: temp.clone(),
                    cards: Vec::new(),
                },
                Change::RemoveList {
                    list_id: temp.id.clone(),
                },
                temp,
            ))
        })?;

        match self.remote.create_list(board_id, title).await {
            Ok(list) => {
                let committed = self
                    .state
                    .settle(&ticket, |state| state.commit_list(&temp.id, &list))
                    .flatten();
                self.after_commit(&ticket).await;
                Ok(committed.unwrap_or(list))
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::CreateList, err)),
        }
    }

    pub async fn update_list(&self, list_id: &Id, fields: &ListPatch) -> SyncResult<WorkflowList> {
        let (ticket, ()) = self.state.stage_with(Operation::UpdateList, |state| {
            let prior = state
                .get_list(list_id)
                .cloned()
                .ok_or_else(|| SyncError::ListNotFound(list_id.clone()))?;
            let mut updated = prior.clone();
            updated.apply(fields);
            Ok((
                Change::ReplaceList { list: updated },
                Change::ReplaceList { list: prior },
                (),
            ))
        })?;

        match self.remote.update_list(list_id, fields).await {
            Ok(list) => {
                let committed = self
                    .state
                    .settle(&ticket, |state| {
                        let mut next = list.clone();
                        next.pending = false;
                        Change::ReplaceList { list: next }.apply(state);
                        state.get_list(list_id).cloned()
                    })
                    .flatten();
                self.after_commit(&ticket).await;
                Ok(committed.unwrap_or(list))
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::UpdateList, err)),
        }
    }

    /// Delete a list and its cards. On failure the list comes back at the end
    /// of the board, not at its old index.
    pub async fn delete_list(&self, list_id: &Id) -> SyncResult<()> {
        let (ticket, ()) = self.state.stage_with(Operation::DeleteList, |state| {
            let list = state
                .get_list(list_id)
                .cloned()
                .ok_or_else(|| SyncError::ListNotFound(list_id.clone()))?;
            let cards = state.cards_by_list.get(list_id).cloned().unwrap_or_default();
            Ok((
                Change::RemoveList {
                    list_id: list_id.clone(),
                },
                Change::AppendList { list, cards },
                (),
            ))
        })?;

        match self.remote.delete_list(list_id).await {
            Ok(()) => {
                self.state.settle(&ticket, |_| ());
                self.after_commit(&ticket).await;
                Ok(())
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::DeleteList, err)),
        }
    }

    pub async fn move_list(&self, list_id: &Id, new_position: usize) -> SyncResult<()> {
        let (ticket, ()) = self.state.stage_with(Operation::MoveList, |state| {
            if state.get_list(list_id).is_none() {
                return Err(SyncError::ListNotFound(list_id.clone()));
            }
            let order = state.lists.iter().map(|list| list.id.clone()).collect();
            Ok((
                Change::MoveList {
                    list_id: list_id.clone(),
                    index: new_position,
                },
                Change::RestoreListOrder { order },
                (),
            ))
        })?;

        match self.remote.move_list(list_id, new_position).await {
            Ok(()) => {
                self.state.settle(&ticket, |_| ());
                self.after_commit(&ticket).await;
                Ok(())
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::MoveList, err)),
        }
    }

    pub async fn add_card(&self, list_id: &Id, title: &str, board_id: &Id) -> SyncResult<Card> {
        let (ticket, temp) = self.state.stage_with(Operation::CreateCard, |state| {
            let cards = state
                .cards_by_list
                .get(list_id)
                .ok_or_else(|| SyncError::ListNotFound(list_id.clone()))?;
            let temp = Card::optimistic(list_id, board_id, title, cards.len());
            Ok((
                Change::AppendCard { card: temp.clone() },
                Change::RemoveCard {
                    card_id: temp.id.clone(),
                },
                temp,
            ))
        })?;

        match self.remote.create_card(list_id, title, board_id).await {
            Ok(card) => {
                let committed = self
                    .state
                    .settle(&ticket, |state| {
                        let local = state.get_card(&temp.id).cloned()?;
                        let canonical = reconcile_card(card.clone(), &local, state.board.as_ref());
                        state.commit_card(&temp.id, &canonical)
                    })
                    .flatten();
                self.after_commit(&ticket).await;
                Ok(committed.unwrap_or(card))
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::CreateCard, err)),
        }
    }

    /// Apply a partial update to a card.
    ///
    /// The card is patched in every bucket that currently holds it. Relation
    /// fields are reconciled first so display data already in memory is
    /// reused.
    pub async fn update_card(&self, card_id: &Id, fields: &CardPatch) -> SyncResult<Card> {
        let (ticket, ()) = self.state.stage_with(Operation::UpdateCard, |state| {
            let buckets = state.buckets_holding(card_id);
            let prior = state
                .get_card(card_id)
                .cloned()
                .ok_or_else(|| SyncError::CardNotFound(card_id.clone()))?;
            let patch = reconcile_patch(fields, &prior, state.board.as_ref());
            let mut updated = prior.clone();
            updated.apply(&patch);
            Ok((
                Change::ReplaceCard {
                    card: updated,
                    buckets: buckets.clone(),
                },
                Change::ReplaceCard {
                    card: prior,
                    buckets,
                },
                (),
            ))
        })?;

        match self.remote.update_card(card_id, fields).await {
            Ok(card) => {
                let committed = self.commit_card(&ticket, card_id, &card);
                self.after_commit(&ticket).await;
                Ok(committed.unwrap_or(card))
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::UpdateCard, err)),
        }
    }

    /// Delete a card. On failure it is put back at the end of the list it was
    /// taken from, not at its old index.
    pub async fn delete_card(&self, card_id: &Id) -> SyncResult<()> {
        let (ticket, ()) = self.state.stage_with(Operation::DeleteCard, |state| {
            let card = state
                .get_card(card_id)
                .cloned()
                .ok_or_else(|| SyncError::CardNotFound(card_id.clone()))?;
            Ok((
                Change::RemoveCard {
                    card_id: card_id.clone(),
                },
                Change::AppendCard { card },
                (),
            ))
        })?;

        match self.remote.delete_card(card_id).await {
            Ok(()) => {
                self.state.settle(&ticket, |_| ());
                self.after_commit(&ticket).await;
                Ok(())
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::DeleteCard, err)),
        }
    }

    /// Move a card to `dest_position` in `dest_list_id`, optionally setting a
    /// new status. On failure the whole card mapping is restored to what it
    /// was before the move.
    pub async fn move_card(
        &self,
        card_id: &Id,
        dest_list_id: &Id,
        dest_position: usize,
        new_status: Option<&str>,
    ) -> SyncResult<Card> {
        let (ticket, ()) = self.state.stage_with(Operation::MoveCard, |state| {
            if state.get_card(card_id).is_none() {
                return Err(SyncError::CardNotFound(card_id.clone()));
            }
            if !state.cards_by_list.contains_key(dest_list_id) {
                return Err(SyncError::ListNotFound(dest_list_id.clone()));
            }
            Ok((
                Change::MoveCard {
                    card_id: card_id.clone(),
                    dest_list_id: dest_list_id.clone(),
                    index: dest_position,
                    status: new_status.map(str::to_string),
                },
                Change::RestoreCards {
                    cards_by_list: state.cards_by_list.clone(),
                },
                (),
            ))
        })?;

        match self
            .remote
            .move_card(card_id, dest_list_id, dest_position, new_status)
            .await
        {
            Ok(card) => {
                let committed = self.commit_card(&ticket, card_id, &card);
                self.after_commit(&ticket).await;
                Ok(committed.unwrap_or(card))
            }
            Err(err) => Err(self.roll_back(&ticket, Operation::MoveCard, err)),
        }
    }

    /// Patch a card whose remote side was already written by someone else.
    /// No network call and no rollback.
    pub fn patch_card_locally(&self, card_id: &Id, fields: &CardPatch) -> SyncResult<Card> {
        self.state.update(|state| {
            let current = state
                .get_card(card_id)
                .cloned()
                .ok_or_else(|| SyncError::CardNotFound(card_id.clone()))?;
            let patch = reconcile_patch(fields, &current, state.board.as_ref());
            let mut updated = current;
            updated.apply(&patch);
            Change::ReplaceCard {
                card: updated,
                buckets: state.buckets_holding(card_id),
            }
            .apply(state);
            state
                .get_card(card_id)
                .cloned()
                .ok_or_else(|| SyncError::CardNotFound(card_id.clone()))
        })
    }

    pub fn patch_list_locally(&self, list_id: &Id, fields: &ListPatch) -> SyncResult<WorkflowList> {
        self.state.update(|state| {
            let list = state
                .lists
                .iter_mut()
                .find(|list| list.id == *list_id)
                .ok_or_else(|| SyncError::ListNotFound(list_id.clone()))?;
            list.apply(fields);
            Ok(list.clone())
        })
    }

    fn commit_card(&self, ticket: &Ticket, card_id: &Id, card: &Card) -> Option<Card> {
        self.state
            .settle(ticket, |state| {
                let local = state.get_card(card_id).cloned()?;
                let canonical = reconcile_card(card.clone(), &local, state.board.as_ref());
                state.commit_card(card_id, &canonical)
            })
            .flatten()
    }

    fn roll_back(&self, ticket: &Ticket, operation: Operation, err: anyhow::Error) -> SyncError {
        if self.state.revert(ticket) {
            warn!("Rolled back {} after failure: {:#}", operation, err);
        } else {
            debug!("{} failed after the board was replaced: {:#}", operation, err);
        }
        SyncError::Mutation {
            operation,
            source: err,
        }
    }

    /// A cached copy of the board the change was made on no longer reflects
    /// it, even if another board is showing by now.
    async fn after_commit(&self, ticket: &Ticket) {
        if let Some(board_id) = ticket.board_id() {
            self.cache.invalidate(board_id).await;
        }
    }
}
