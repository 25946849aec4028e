//! In-process stand-in for the remote workflow service.
//!
//! Behaves like the authoritative server: it assigns canonical ids, keeps
//! positions contiguous and answers with bare references for assignees and
//! labels. Failures can be injected per operation and responses can be held
//! back until released, which lets callers script any completion order.

use crate::error::Operation;
use crate::model::{
    generate_id, Board, Card, CardPatch, Id, ListPatch, Relation, WorkflowList, WorkflowSnapshot,
};
use crate::store::traits::RemoteWorkflowService;
use anyhow::{anyhow, Result};
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct ServerState {
    boards: HashMap<Id, Board>,
    lists: HashMap<Id, WorkflowList>,
    cards: HashMap<Id, Card>,
}

impl ServerState {
    fn lists_of(&self, board_id: &str) -> Vec<WorkflowList> {
        self.lists
            .values()
            .filter(|list| list.board_id == board_id)
            .sorted_by_key(|list| list.position)
            .cloned()
            .collect()
    }

    fn card_ids_of(&self, list_id: &str) -> Vec<Id> {
        self.cards
            .values()
            .filter(|card| card.list_id == list_id)
            .sorted_by_key(|card| card.position)
            .map(|card| card.id.clone())
            .collect()
    }

    fn renumber_lists(&mut self, board_id: &str, order: &[Id]) {
        for (position, id) in order.iter().enumerate() {
            if let Some(list) = self.lists.get_mut(id) {
                if list.board_id == board_id {
                    list.position = position;
                }
            }
        }
    }

    fn renumber_cards(&mut self, order: &[Id]) {
        for (position, id) in order.iter().enumerate() {
            if let Some(card) = self.cards.get_mut(id) {
                card.position = position;
            }
        }
    }
}

/// Handle that lets a held response through.
#[derive(Debug)]
pub struct ResponseGate(oneshot::Sender<()>);

impl ResponseGate {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWorkflowService {
    state: RwLock<ServerState>,
    /// Remaining injected failures per operation; `usize::MAX` never runs out.
    failures: Mutex<HashMap<Operation, usize>>,
    gates: Mutex<HashMap<Operation, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<Vec<Operation>>,
}

impl InMemoryWorkflowService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a complete board, replacing whatever was stored under its id.
    pub fn insert_snapshot(&self, snapshot: WorkflowSnapshot) {
        let snapshot = snapshot.normalized();
        let mut state = self.state.write();
        let board_id = snapshot.board.id.clone();

        let stale_lists: Vec<Id> = state
            .lists
            .values()
            .filter(|list| list.board_id == board_id)
            .map(|list| list.id.clone())
            .collect();
        for list_id in stale_lists {
            state.lists.remove(&list_id);
        }
        state.cards.retain(|_, card| card.board_id != board_id);

        for list in snapshot.lists {
            state.lists.insert(list.id.clone(), list);
        }
        for card in snapshot.cards_by_list.into_values().flatten() {
            state.cards.insert(card.id.clone(), dehydrate(card));
        }
        state.boards.insert(board_id, snapshot.board);
    }

    /// Make the next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: Operation, times: usize) {
        self.failures.lock().insert(operation, times);
    }

    pub fn fail_always(&self, operation: Operation) {
        self.failures.lock().insert(operation, usize::MAX);
    }

    pub fn recover(&self, operation: Operation) {
        self.failures.lock().remove(&operation);
    }

    /// Hold the response of the next not-yet-held call of `operation` until
    /// the returned gate is released (or dropped). Gates are consumed in call
    /// order.
    pub fn hold(&self, operation: Operation) -> ResponseGate {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().entry(operation).or_default().push_back(rx);
        ResponseGate(tx)
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls.lock().iter().filter(|op| **op == operation).count()
    }

    /// Server-side view of a card, for assertions.
    pub fn stored_card(&self, card_id: &str) -> Option<Card> {
        self.state.read().cards.get(card_id).cloned()
    }

    pub fn stored_lists(&self, board_id: &str) -> Vec<WorkflowList> {
        self.state.read().lists_of(board_id)
    }

    async fn enter(&self, operation: Operation) -> Result<()> {
        self.calls.lock().push(operation);

        let gate = self
            .gates
            .lock()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            // A dropped gate releases the response as well.
            let _ = gate.await;
        }

        let mut failures = self.failures.lock();
        if let Some(remaining) = failures.get_mut(&operation) {
            if *remaining != usize::MAX {
                *remaining -= 1;
            }
            if *remaining == 0 {
                failures.remove(&operation);
            }
            return Err(anyhow!("injected failure for {}", operation));
        }
        Ok(())
    }
}

/// Relations are stored and returned as bare references, the way the server
/// persists them.
fn dehydrate(mut card: Card) -> Card {
    card.assignees = card
        .assignees
        .into_iter()
        .map(|relation| Relation::Reference(relation.id().to_string()))
        .collect();
    card.labels = card
        .labels
        .into_iter()
        .map(|relation| Relation::Reference(relation.id().to_string()))
        .collect();
    card.pending = false;
    card
}

#[async_trait::async_trait]
impl RemoteWorkflowService for InMemoryWorkflowService {
    async fn fetch_workflow_snapshot(&self, board_id: &Id) -> Result<WorkflowSnapshot> {
        self.enter(Operation::FetchSnapshot).await?;
        let state = self.state.read();

        let board = state
            .boards
            .get(board_id)
            .cloned()
            .ok_or_else(|| anyhow!("Board '{}' not found", board_id))?;
        let lists = state.lists_of(board_id);
        let cards_by_list = lists
            .iter()
            .map(|list| {
                let cards = state
                    .card_ids_of(&list.id)
                    .iter()
                    .filter_map(|id| state.cards.get(id).cloned())
                    .collect();
                (list.id.clone(), cards)
            })
            .collect();

        Ok(WorkflowSnapshot {
            board,
            lists,
            cards_by_list,
        })
    }

    async fn create_list(&self, board_id: &Id, title: &str) -> Result<WorkflowList> {
        self.enter(Operation::CreateList).await?;
        let mut state = self.state.write();

        if !state.boards.contains_key(board_id) {
            return Err(anyhow!("Board '{}' not found", board_id));
        }
        let list = WorkflowList {
            id: generate_id(),
            board_id: board_id.clone(),
            title: title.to_string(),
            color: None,
            position: state.lists_of(board_id).len(),
            pending: false,
        };
        state.lists.insert(list.id.clone(), list.clone());
        Ok(list)
    }

    async fn update_list(&self, list_id: &Id, fields: &ListPatch) -> Result<WorkflowList> {
        self.enter(Operation::UpdateList).await?;
        let mut state = self.state.write();

        let list = state
            .lists
            .get_mut(list_id)
            .ok_or_else(|| anyhow!("List '{}' not found", list_id))?;
        list.apply(fields);
        Ok(list.clone())
    }

    async fn delete_list(&self, list_id: &Id) -> Result<()> {
        self.enter(Operation::DeleteList).await?;
        let mut state = self.state.write();

        let list = state
            .lists
            .remove(list_id)
            .ok_or_else(|| anyhow!("List '{}' not found", list_id))?;
        state.cards.retain(|_, card| card.list_id != *list_id);
        let order: Vec<Id> = state
            .lists_of(&list.board_id)
            .into_iter()
            .map(|l| l.id)
            .collect();
        state.renumber_lists(&list.board_id, &order);
        Ok(())
    }

    async fn move_list(&self, list_id: &Id, new_position: usize) -> Result<()> {
        self.enter(Operation::MoveList).await?;
        let mut state = self.state.write();

        let board_id = state
            .lists
            .get(list_id)
            .map(|list| list.board_id.clone())
            .ok_or_else(|| anyhow!("List '{}' not found", list_id))?;
        let mut order: Vec<Id> = state
            .lists_of(&board_id)
            .into_iter()
            .map(|l| l.id)
            .filter(|id| id != list_id)
            .collect();
        order.insert(new_position.min(order.len()), list_id.clone());
        state.renumber_lists(&board_id, &order);
        Ok(())
    }

    async fn create_card(&self, list_id: &Id, title: &str, board_id: &Id) -> Result<Card> {
        self.enter(Operation::CreateCard).await?;
        let mut state = self.state.write();

        if !state.lists.contains_key(list_id) {
            return Err(anyhow!("List '{}' not found", list_id));
        }
        let mut card = Card::optimistic(list_id, board_id, title, state.card_ids_of(list_id).len());
        card.id = generate_id();
        card.pending = false;
        state.cards.insert(card.id.clone(), card.clone());
        Ok(card)
    }

    async fn update_card(&self, card_id: &Id, fields: &CardPatch) -> Result<Card> {
        self.enter(Operation::UpdateCard).await?;
        let mut state = self.state.write();

        let mut card = state
            .cards
            .remove(card_id)
            .ok_or_else(|| anyhow!("Card '{}' not found", card_id))?;
        card.apply(fields);
        let card = dehydrate(card);
        state.cards.insert(card.id.clone(), card.clone());
        Ok(card)
    }

    async fn delete_card(&self, card_id: &Id) -> Result<()> {
        self.enter(Operation::DeleteCard).await?;
        let mut state = self.state.write();

        let card = state
            .cards
            .remove(card_id)
            .ok_or_else(|| anyhow!("Card '{}' not found", card_id))?;
        let order = state.card_ids_of(&card.list_id);
        state.renumber_cards(&order);
        Ok(())
    }

    async fn move_card(
        &self,
        card_id: &Id,
        dest_list_id: &Id,
        dest_position: usize,
        new_status: Option<&str>,
    ) -> Result<Card> {
        self.enter(Operation::MoveCard).await?;
        let mut state = self.state.write();

        if !state.lists.contains_key(dest_list_id) {
            return Err(anyhow!("List '{}' not found", dest_list_id));
        }
        let source_list_id = state
            .cards
            .get(card_id)
            .map(|card| card.list_id.clone())
            .ok_or_else(|| anyhow!("Card '{}' not found", card_id))?;

        if let Some(card) = state.cards.get_mut(card_id) {
            card.list_id = dest_list_id.clone();
            if let Some(status) = new_status {
                card.status = Some(status.to_string());
            }
        }

        let source_order: Vec<Id> = state
            .card_ids_of(&source_list_id)
            .into_iter()
            .filter(|id| id != card_id)
            .collect();
        state.renumber_cards(&source_order);

        let mut dest_order: Vec<Id> = state
            .card_ids_of(dest_list_id)
            .into_iter()
            .filter(|id| id != card_id)
            .collect();
        dest_order.insert(dest_position.min(dest_order.len()), card_id.clone());
        state.renumber_cards(&dest_order);

        state
            .cards
            .get(card_id)
            .cloned()
            .ok_or_else(|| anyhow!("Card '{}' not found", card_id))
    }
}
