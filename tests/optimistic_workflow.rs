mod common;

use common::*;
use serde_json::json;
use workflow_mirror::logic::MutationPhase;
use workflow_mirror::{
    is_temp_id, CardPatch, ListPatch, Member, Operation, Relation, SyncError,
};

#[tokio::test]
async fn test_add_card_shows_temporary_card_until_acknowledged() {
    let (service, engine) = loaded().await;
    let gate = service.hold(Operation::CreateCard);
    let (todo, board) = (id(TODO), id(BOARD_A));

    let (result, ()) = tokio::join!(
        engine.add_card(&todo, "Task A", &board),
        async {
            let cards = engine.cards_in(TODO);
            assert_eq!(cards.len(), 4);
            let temp = &cards[3];
            assert!(is_temp_id(&temp.id));
            assert!(temp.pending);
            assert_eq!(temp.position, 3);
            assert_eq!(engine.get_card(&temp.id).unwrap().title, "Task A");
            assert_eq!(engine.pending_mutations(), 1);
            assert_invariants(&engine);
            gate.release();
        }
    );

    let created = result.unwrap();
    let cards = engine.cards_in(TODO);
    let slot = &cards[3];
    assert_eq!(slot, &created);
    assert!(!is_temp_id(&slot.id));
    assert!(!slot.pending);
    assert_eq!(engine.get_card(&created.id).unwrap().position, 3);
    assert!(service.stored_card(&created.id).is_some());
    assert_eq!(engine.pending_mutations(), 0);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_add_card_rollback_removes_temporary_card() {
    let (service, engine) = loaded().await;
    let before = engine.cards_in(TODO);
    service.fail_next(Operation::CreateCard, 1);

    let err = engine
        .add_card(&id(TODO), "Doomed", &id(BOARD_A))
        .await
        .unwrap_err();

    assert!(err.is_rolled_back());
    assert_eq!(engine.cards_in(TODO), before);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_add_card_to_unknown_list_never_reaches_the_server() {
    let (service, engine) = loaded().await;

    let err = engine
        .add_card(&id("nope"), "Lost", &id(BOARD_A))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ListNotFound(ref list) if list == "nope"));
    assert_eq!(service.call_count(Operation::CreateCard), 0);
}

#[tokio::test]
async fn test_add_list_rollback_restores_list_sequence() {
    let (service, engine) = loaded().await;
    let before = engine.lists();
    service.fail_next(Operation::CreateList, 1);

    let result = engine.add_list(&id(BOARD_A), "New List").await;

    assert!(matches!(
        result,
        Err(SyncError::Mutation {
            operation: Operation::CreateList,
            ..
        })
    ));
    let after = engine.lists();
    assert_eq!(after.len(), before.len());
    assert!(after.iter().all(|list| !list.pending));
    assert_eq!(after, before);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_add_list_commit_migrates_optimistic_cards() {
    let (service, engine) = loaded().await;
    let list_gate = service.hold(Operation::CreateList);
    let card_gate = service.hold(Operation::CreateCard);
    let board = id(BOARD_A);

    let (list, card, ()) = tokio::join!(
        engine.add_list(&board, "Backlog"),
        async {
            let temp = engine.lists().last().cloned().unwrap();
            assert!(temp.pending);
            engine.add_card(&temp.id, "Early card", &board).await
        },
        async {
            let temp = engine.lists().last().cloned().unwrap();
            wait_until(|| engine.cards_in(&temp.id).len() == 1).await;

            list_gate.release();
            wait_until(|| engine.lists().last().map_or(false, |l| !l.pending)).await;

            let committed = engine.lists().last().cloned().unwrap();
            assert!(engine.cards_in(&temp.id).is_empty());
            let moved = engine.cards_in(&committed.id);
            assert_eq!(moved.len(), 1);
            assert_eq!(moved[0].list_id, committed.id);
            assert_invariants(&engine);

            card_gate.release();
        }
    );

    let list = list.unwrap();
    assert_eq!(list.title, "Backlog");
    assert_eq!(list.position, 3);
    // The server never knew the temporary list id, so the card create fails
    // and its optimistic copy is removed from the migrated bucket.
    assert!(card.unwrap_err().is_rolled_back());
    assert!(engine.cards_in(&list.id).is_empty());
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_delete_card_rollback_appends_card_to_its_list() {
    let (service, engine) = loaded().await;
    service.fail_next(Operation::DeleteCard, 1);
    let login = engine.get_card("card-login").unwrap();

    let err = engine.delete_card(&id("card-login")).await.unwrap_err();

    assert!(err.is_rolled_back());
    let cards = engine.cards_in(TODO);
    assert_eq!(card_ids(&cards), vec!["card-export", "card-docs", "card-login"]);
    assert_eq!(positions(&cards), vec![0, 1, 2]);
    let restored = &cards[2];
    assert_eq!(restored.title, login.title);
    assert_eq!(restored.assignees, login.assignees);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_delete_card_commit_closes_the_gap() {
    let (service, engine) = loaded().await;

    engine.delete_card(&id("card-export")).await.unwrap();

    let cards = engine.cards_in(TODO);
    assert_eq!(card_ids(&cards), vec!["card-login", "card-docs"]);
    assert_eq!(positions(&cards), vec![0, 1]);
    assert!(service.stored_card("card-export").is_none());
    assert_eq!(service.stored_card("card-docs").unwrap().position, 1);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_move_card_rollback_restores_both_lists_exactly() {
    let (service, engine) = loaded().await;
    let todo_before = engine.cards_in(TODO);
    let doing_before = engine.cards_in(DOING);
    assert_eq!(todo_before[2].id, "card-docs");

    let gate = service.hold(Operation::MoveCard);
    service.fail_next(Operation::MoveCard, 1);
    let (docs, doing) = (id("card-docs"), id(DOING));

    let (result, ()) = tokio::join!(
        engine.move_card(&docs, &doing, 0, Some("done")),
        async {
            let doing = engine.cards_in(DOING);
            assert_eq!(card_ids(&doing), vec!["card-docs", "card-search"]);
            assert_eq!(positions(&doing), vec![0, 1]);
            assert_eq!(doing[0].list_id, DOING);
            assert_eq!(doing[0].status.as_deref(), Some("done"));
            assert_eq!(engine.cards_in(TODO).len(), 2);
            assert_invariants(&engine);
            gate.release();
        }
    );

    assert!(result.unwrap_err().is_rolled_back());
    assert_eq!(engine.cards_in(TODO), todo_before);
    assert_eq!(engine.cards_in(DOING), doing_before);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_move_card_commit_matches_server_order() {
    let (service, engine) = loaded().await;

    let moved = engine
        .move_card(&id("card-login"), &id(DONE), 1, Some("done"))
        .await
        .unwrap();

    assert_eq!(moved.list_id, DONE);
    assert_eq!(moved.position, 1);
    assert_eq!(moved.status.as_deref(), Some("done"));
    // Display data survives the server's bare references.
    assert!(moved.assignees.iter().all(Relation::is_populated));

    assert_eq!(card_ids(&engine.cards_in(TODO)), vec!["card-export", "card-docs"]);
    assert_eq!(card_ids(&engine.cards_in(DONE)), vec!["card-onboarding", "card-login"]);
    let stored = service.stored_card("card-login").unwrap();
    assert_eq!(stored.list_id, DONE);
    assert_eq!(stored.position, 1);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_move_card_within_list() {
    let (_service, engine) = loaded().await;

    engine
        .move_card(&id("card-login"), &id(TODO), 2, None)
        .await
        .unwrap();

    let cards = engine.cards_in(TODO);
    assert_eq!(card_ids(&cards), vec!["card-export", "card-docs", "card-login"]);
    assert_eq!(cards[2].status.as_deref(), Some("todo"));
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_empty_update_leaves_card_unchanged() {
    let (service, engine) = loaded().await;
    let before = engine.get_card("card-login").unwrap();
    let gate = service.hold(Operation::UpdateCard);
    let (login, empty) = (id("card-login"), CardPatch::default());

    let (result, ()) = tokio::join!(
        engine.update_card(&login, &empty),
        async {
            assert_eq!(engine.get_card("card-login").unwrap(), before);
            gate.release();
        }
    );

    assert_eq!(result.unwrap(), before);
    assert_eq!(engine.get_card("card-login").unwrap(), before);
}

#[tokio::test]
async fn test_update_card_rollback_restores_prior_entity() {
    let (service, engine) = loaded().await;
    let before = engine.get_card("card-search").unwrap();
    service.fail_next(Operation::UpdateCard, 1);

    let mut metadata = serde_json::Map::new();
    metadata.insert("priority".to_string(), json!("urgent"));
    let patch = CardPatch {
        title: Some("Renamed".to_string()),
        metadata: Some(metadata),
        ..CardPatch::default()
    };
    let err = engine.update_card(&id("card-search"), &patch).await.unwrap_err();

    assert!(err.is_rolled_back());
    assert_eq!(engine.get_card("card-search").unwrap(), before);
}

#[tokio::test]
async fn test_update_prefers_populated_relation_without_extra_fetch() {
    let (service, engine) = loaded().await;
    let inline = Member {
        id: "u-grace".to_string(),
        name: "Grace (inline)".to_string(),
        email: None,
    };
    let patch = CardPatch {
        assignees: Some(vec![
            Relation::Reference("u-grace".to_string()),
            Relation::Populated(inline.clone()),
            Relation::Reference("u-ada".to_string()),
        ]),
        ..CardPatch::default()
    };

    let updated = engine.update_card(&id("card-export"), &patch).await.unwrap();

    assert_eq!(updated.assignees.len(), 2);
    assert_eq!(updated.assignees[0], Relation::Populated(inline));
    // u-ada is upgraded from the board's member directory.
    assert_eq!(
        updated.assignees[1].populated().map(|m| m.name.as_str()),
        Some("Ada Lovelace")
    );
    assert_eq!(service.call_count(Operation::FetchSnapshot), 1);
}

#[tokio::test]
async fn test_overlapping_updates_last_response_wins() {
    let (service, engine) = loaded().await;
    let first_gate = service.hold(Operation::UpdateCard);
    let second_gate = service.hold(Operation::UpdateCard);
    let export = id("card-export");
    let (first_patch, second_patch) = (CardPatch::title("First"), CardPatch::title("Second"));

    let (first, second, ()) = tokio::join!(
        engine.update_card(&export, &first_patch),
        engine.update_card(&export, &second_patch),
        async {
            assert_eq!(engine.get_card("card-export").unwrap().title, "Second");
            second_gate.release();
            wait_until(|| engine.pending_mutations() == 1).await;
            first_gate.release();
        }
    );

    first.unwrap();
    second.unwrap();
    // No conflict detection between entity mutations: the first request's
    // response arrived last and its server state is what remains.
    assert_eq!(engine.get_card("card-export").unwrap().title, "First");
}

#[tokio::test]
async fn test_list_update_commit_and_rollback() {
    let (service, engine) = loaded().await;

    let renamed = engine
        .update_list(&id(DOING), &ListPatch::title("Doing"))
        .await
        .unwrap();
    assert_eq!(renamed.title, "Doing");
    assert_eq!(renamed.position, 1);

    service.fail_next(Operation::UpdateList, 1);
    let patch = ListPatch {
        color: Some(None),
        ..ListPatch::default()
    };
    assert!(engine.update_list(&id(DOING), &patch).await.is_err());
    let list = engine.get_list(DOING).unwrap();
    assert_eq!(list.title, "Doing");
    assert_eq!(list.color.as_deref(), Some("#fff0b3"));
}

#[tokio::test]
async fn test_delete_list_rollback_appends_list_with_its_cards() {
    let (service, engine) = loaded().await;
    let cards_before = engine.cards_in(TODO);
    service.fail_next(Operation::DeleteList, 1);

    assert!(engine.delete_list(&id(TODO)).await.is_err());

    let lists = engine.lists();
    let ids: Vec<&str> = lists.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec![DOING, DONE, TODO]);
    assert_eq!(engine.cards_in(TODO), cards_before);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_delete_list_commit_drops_cards() {
    let (_service, engine) = loaded().await;

    engine.delete_list(&id(DOING)).await.unwrap();

    assert!(engine.get_list(DOING).is_none());
    assert!(engine.get_card("card-search").is_none());
    assert_eq!(engine.get_list(DONE).unwrap().position, 1);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_move_list_commit_and_rollback() {
    let (service, engine) = loaded().await;

    engine.move_list(&id(DONE), 0).await.unwrap();
    let order: Vec<String> = engine.lists().into_iter().map(|l| l.id).collect();
    assert_eq!(order, vec![DONE, TODO, DOING]);
    assert_eq!(service.stored_lists(BOARD_A)[0].id, DONE);

    service.fail_next(Operation::MoveList, 1);
    assert!(engine.move_list(&id(DOING), 0).await.is_err());
    let order: Vec<String> = engine.lists().into_iter().map(|l| l.id).collect();
    assert_eq!(order, vec![DONE, TODO, DOING]);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_local_patch_skips_the_network() {
    let (service, engine) = loaded().await;
    let calls_before = service.calls();
    let patch = CardPatch {
        cover_image: Some(Some(Relation::Populated(workflow_mirror::CoverImage {
            id: "img-1".to_string(),
            url: "https://cdn.example.com/img-1.png".to_string(),
            thumbnail_url: None,
        }))),
        ..CardPatch::default()
    };

    let card = engine.patch_card_locally(&id("card-search"), &patch).unwrap();
    let list = engine
        .patch_list_locally(&id(DONE), &ListPatch::title("Shipped"))
        .unwrap();

    assert_eq!(card.cover_image.unwrap().id(), "img-1");
    assert_eq!(list.title, "Shipped");
    assert_eq!(service.calls(), calls_before);
    assert_eq!(engine.pending_mutations(), 0);
    assert!(matches!(
        engine.patch_card_locally(&id("ghost"), &patch),
        Err(SyncError::CardNotFound(_))
    ));
}

#[tokio::test]
async fn test_mixed_operations_keep_positions_contiguous() {
    let (service, engine) = loaded().await;
    let board = id(BOARD_A);

    let backlog = engine.add_list(&board, "Backlog").await.unwrap();
    let first = engine.add_card(&backlog.id, "one", &board).await.unwrap();
    engine.add_card(&backlog.id, "two", &board).await.unwrap();
    engine.move_card(&first.id, &id(TODO), 1, None).await.unwrap();
    service.fail_next(Operation::MoveCard, 1);
    let _ = engine.move_card(&id("card-docs"), &backlog.id, 0, None).await;
    engine.delete_card(&id("card-login")).await.unwrap();
    engine.move_list(&backlog.id, 0).await.unwrap();
    service.fail_next(Operation::DeleteList, 1);
    let _ = engine.delete_list(&id(DOING)).await;

    assert_invariants(&engine);
    assert_eq!(engine.pending_mutations(), 0);
    assert_eq!(engine.lists()[0].id, backlog.id);
    assert_eq!(card_ids(&engine.cards_in(TODO)), vec![first.id.clone(), id("card-export"), id("card-docs")]);
}

#[tokio::test]
async fn test_mutations_require_a_loaded_board() {
    let (service, engine) = setup();

    assert!(matches!(
        engine.add_list(&id(BOARD_A), "Nowhere").await,
        Err(SyncError::NoActiveBoard)
    ));
    assert!(matches!(
        engine.update_card(&id("card-login"), &CardPatch::title("x")).await,
        Err(SyncError::CardNotFound(_))
    ));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_rollback_after_board_switch_leaves_new_board_alone() {
    let (service, engine) = loaded().await;
    let gate = service.hold(Operation::MoveCard);
    service.fail_next(Operation::MoveCard, 1);
    let (docs, doing, board_b) = (id("card-docs"), id(DOING), id(BOARD_B));

    let (result, ()) = tokio::join!(engine.move_card(&docs, &doing, 0, Some("done")), async {
        engine.load_workflow(&board_b).await.unwrap();
        assert_eq!(engine.cards_in("ops-inbox").len(), 1);
        assert_eq!(engine.pending_mutations(), 0);
        gate.release();
    });

    assert!(result.is_err());
    assert_eq!(engine.board_id().as_deref(), Some(BOARD_B));
    assert_eq!(card_ids(&engine.cards_in("ops-inbox")), vec!["ops-certs"]);
    assert!(engine.get_list(TODO).is_none());
    assert_eq!(
        engine.mutation_history().last().map(|r| r.phase),
        Some(MutationPhase::Discarded)
    );
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_late_commit_invalidates_the_board_it_was_made_on() {
    let (service, engine) = loaded().await;
    let (export, board_a, board_b) = (id("card-export"), id(BOARD_A), id(BOARD_B));
    assert!(engine.prefetch(&board_b).await);
    let gate = service.hold(Operation::UpdateCard);
    let patch = CardPatch::title("CSV export v2");

    let (result, ()) = tokio::join!(engine.update_card(&export, &patch), async {
        engine.load_workflow(&board_b).await.unwrap();
        gate.release();
    });

    assert_eq!(result.unwrap().title, "CSV export v2");
    assert!(engine.get_card("card-export").is_none());
    assert!(!engine.cache().contains(&board_a).await);
    assert!(engine.cache().contains(&board_b).await);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_rollback_after_silent_refresh_does_not_duplicate() {
    let (service, engine) = loaded().await;
    let gate = service.hold(Operation::DeleteCard);
    service.fail_next(Operation::DeleteCard, 1);
    let login = id("card-login");

    let (result, ()) = tokio::join!(engine.delete_card(&login), async {
        assert!(engine.get_card("card-login").is_none());
        engine.refresh().await.unwrap();
        // The server never deleted it, so the refresh brings it back.
        assert!(engine.get_card("card-login").is_some());
        gate.release();
    });

    assert!(result.is_err());
    assert_eq!(
        card_ids(&engine.cards_in(TODO)),
        vec!["card-login", "card-export", "card-docs"]
    );
    assert_eq!(engine.pending_mutations(), 0);
    assert_invariants(&engine);
}

#[tokio::test]
async fn test_commit_after_silent_refresh_keeps_invariants() {
    let (service, engine) = loaded().await;
    let gate = service.hold(Operation::CreateCard);
    let (todo, board) = (id(TODO), id(BOARD_A));

    let (result, ()) = tokio::join!(engine.add_card(&todo, "Task B", &board), async {
        assert_eq!(engine.cards_in(TODO).len(), 4);
        engine.refresh().await.unwrap();
        // The refresh replaced the optimistic copy with server data.
        assert_eq!(engine.cards_in(TODO).len(), 3);
        gate.release();
    });

    let created = result.unwrap();
    assert!(!is_temp_id(&created.id));
    assert!(engine.cards_in(TODO).iter().all(|card| !card.pending));
    assert_eq!(engine.pending_mutations(), 0);
    assert_invariants(&engine);

    engine.refresh().await.unwrap();
    let cards = engine.cards_in(TODO);
    assert_eq!(cards.len(), 4);
    assert_eq!(cards[3].id, created.id);
    assert_invariants(&engine);
}
