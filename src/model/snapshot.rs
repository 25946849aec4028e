use crate::model::{Board, Card, Id, WorkflowList};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything needed to render one board, as returned by a bulk fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub board: Board,
    pub lists: Vec<WorkflowList>,
    pub cards_by_list: HashMap<Id, Vec<Card>>,
}

impl WorkflowSnapshot {
    /// Sort lists and cards by their server positions and renumber them to
    /// 0..n-1. Every list gets a bucket even when it holds no cards.
    pub fn normalized(mut self) -> Self {
        self.lists = self
            .lists
            .into_iter()
            .sorted_by_key(|list| list.position)
            .enumerate()
            .map(|(index, mut list)| {
                list.position = index;
                list.pending = false;
                list
            })
            .collect();

        for list in &self.lists {
            self.cards_by_list.entry(list.id.clone()).or_default();
        }

        for (list_id, cards) in self.cards_by_list.iter_mut() {
            cards.sort_by_key(|card| card.position);
            for (index, card) in cards.iter_mut().enumerate() {
                card.position = index;
                card.list_id = list_id.clone();
                card.pending = false;
            }
        }

        self
    }

    pub fn card_count(&self) -> usize {
        self.cards_by_list.values().map(Vec::len).sum()
    }
}
