#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use workflow_mirror::config::SyncConfig;
use workflow_mirror::seed::demo_snapshot;
use workflow_mirror::{
    Board, Card, InMemoryWorkflowService, WorkflowEngine, WorkflowList, WorkflowSnapshot,
};

pub const BOARD_A: &str = "board-a";
pub const BOARD_B: &str = "board-b";
pub const TODO: &str = "list-todo";
pub const DOING: &str = "list-doing";
pub const DONE: &str = "list-done";

pub type Engine = WorkflowEngine<InMemoryWorkflowService>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn id(value: &str) -> String {
    value.to_string()
}

/// The demo board with a third card in "To Do", so that list reads
/// `[card-login, card-export, card-docs]`.
pub fn board_a() -> WorkflowSnapshot {
    let mut snapshot = demo_snapshot(&id(BOARD_A));
    let mut docs = Card::optimistic(TODO, BOARD_A, "Write docs", 2);
    docs.id = id("card-docs");
    docs.pending = false;
    docs.status = Some("todo".to_string());
    if let Some(cards) = snapshot.cards_by_list.get_mut(TODO) {
        cards.push(docs);
    }
    snapshot
}

pub fn board_b() -> WorkflowSnapshot {
    let list = WorkflowList {
        id: id("ops-inbox"),
        board_id: id(BOARD_B),
        title: "Inbox".to_string(),
        color: None,
        position: 0,
        pending: false,
    };
    let mut card = Card::optimistic("ops-inbox", BOARD_B, "Rotate certificates", 0);
    card.id = id("ops-certs");
    card.pending = false;
    WorkflowSnapshot {
        board: Board::new(BOARD_B, "Operations"),
        lists: vec![list],
        cards_by_list: HashMap::from([(id("ops-inbox"), vec![card])]),
    }
}

/// A service holding both boards and an engine that has loaded nothing yet.
pub fn setup() -> (Arc<InMemoryWorkflowService>, Engine) {
    init_logging();
    let service = Arc::new(InMemoryWorkflowService::new());
    service.insert_snapshot(board_a());
    service.insert_snapshot(board_b());
    let engine = WorkflowEngine::new(service.clone(), &SyncConfig::default());
    (service, engine)
}

/// Like [`setup`], with board A already loaded.
pub async fn loaded() -> (Arc<InMemoryWorkflowService>, Engine) {
    let (service, engine) = setup();
    engine
        .load_workflow(&id(BOARD_A))
        .await
        .expect("board A loads");
    (service, engine)
}

pub fn card_ids(cards: &[Card]) -> Vec<String> {
    cards.iter().map(|card| card.id.clone()).collect()
}

pub fn positions(cards: &[Card]) -> Vec<usize> {
    cards.iter().map(|card| card.position).collect()
}

pub fn assert_invariants(engine: &Engine) {
    if let Err(err) = engine.snapshot().check_invariants() {
        panic!("invariant violated: {:#}", err);
    }
}

/// Yield until `condition` holds, letting sibling futures in a `join!` run.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
