use crate::model::{
    Board, Card, Department, Id, Label, Member, Relation, WorkflowList, WorkflowSnapshot,
};
use crate::store::InMemoryWorkflowService;
use serde_json::json;
use std::collections::HashMap;

/// Helper function to create a list owned by the demo board
fn create_list(board_id: &str, id: &str, title: &str, color: &str, position: usize) -> WorkflowList {
    WorkflowList {
        id: id.to_string(),
        board_id: board_id.to_string(),
        title: title.to_string(),
        color: Some(color.to_string()),
        position,
        pending: false,
    }
}

/// Helper function to create a committed card
fn create_card(board_id: &str, list_id: &str, id: &str, title: &str, position: usize) -> Card {
    let mut card = Card::optimistic(list_id, board_id, title, position);
    card.id = id.to_string();
    card.pending = false;
    card
}

fn members() -> Vec<Member> {
    vec![
        Member {
            id: "u-ada".to_string(),
            name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
        },
        Member {
            id: "u-grace".to_string(),
            name: "Grace Hopper".to_string(),
            email: Some("grace@example.com".to_string()),
        },
    ]
}

fn labels() -> Vec<Label> {
    vec![
        Label {
            id: "l-bug".to_string(),
            name: "Bug".to_string(),
            color: Some("#d73a4a".to_string()),
        },
        Label {
            id: "l-feature".to_string(),
            name: "Feature".to_string(),
            color: Some("#0e8a16".to_string()),
        },
    ]
}

/// A small product board with three lists and a handful of cards
pub fn demo_snapshot(board_id: &Id) -> WorkflowSnapshot {
    let mut board = Board::new(board_id.clone(), "Product Roadmap");
    board.description = Some("Quarterly delivery plan".to_string());
    board.members = members();
    board.labels = labels();
    board.department = Some(Department {
        id: "dept-eng".to_string(),
        name: "Engineering".to_string(),
    });

    let lists = vec![
        create_list(board_id, "list-todo", "To Do", "#f4f5f7", 0),
        create_list(board_id, "list-doing", "In Progress", "#fff0b3", 1),
        create_list(board_id, "list-done", "Done", "#e3fcef", 2),
    ];

    let mut login = create_card(board_id, "list-todo", "card-login", "Fix login redirect", 0);
    login.status = Some("todo".to_string());
    login.labels = vec![Relation::Reference("l-bug".to_string())];
    login.assignees = vec![Relation::Reference("u-ada".to_string())];
    login.metadata.insert("priority".to_string(), json!("high"));

    let mut export = create_card(board_id, "list-todo", "card-export", "CSV export", 1);
    export.status = Some("todo".to_string());
    export.labels = vec![Relation::Reference("l-feature".to_string())];

    let mut search = create_card(board_id, "list-doing", "card-search", "Full-text search", 0);
    search.status = Some("in-progress".to_string());
    search.assignees = vec![Relation::Reference("u-grace".to_string())];
    search.metadata.insert("dueDate".to_string(), json!("2026-11-30"));

    let mut onboarding = create_card(board_id, "list-done", "card-onboarding", "Onboarding flow", 0);
    onboarding.status = Some("done".to_string());

    let cards_by_list = HashMap::from([
        ("list-todo".to_string(), vec![login, export]),
        ("list-doing".to_string(), vec![search]),
        ("list-done".to_string(), vec![onboarding]),
    ]);

    WorkflowSnapshot {
        board,
        lists,
        cards_by_list,
    }
}

/// Load the demo board into an in-memory service
pub fn load_seed_data(service: &InMemoryWorkflowService, board_id: &Id) {
    service.insert_snapshot(demo_snapshot(board_id));
}
