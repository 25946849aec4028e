pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export engine types
pub use error::{Operation, SyncError, SyncResult};
pub use logic::{
    LoadOutcome, OptimisticMutator, RequestGenerationGuard, StateStore, WorkflowEngine,
    WorkflowState,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{InMemoryWorkflowService, PrefetchCache, RemoteWorkflowService};

/// Scripted session against the in-memory service: load the demo board,
/// add and move a card, then watch a failing delete roll back.
pub async fn run_demo(config: &config::SyncConfig) -> anyhow::Result<WorkflowState> {
    use std::sync::Arc;

    let board_id = config.demo.board_id.clone();
    let service = Arc::new(InMemoryWorkflowService::new());
    seed::load_seed_data(&service, &board_id);

    let engine = WorkflowEngine::new(service.clone(), config);
    let outcome = engine.load_workflow(&board_id).await?;
    log::info!("Initial load: {:?}", outcome);

    let todo = "list-todo".to_string();
    let done = "list-done".to_string();
    let card = engine.add_card(&todo, "Write release notes", &board_id).await?;
    engine.move_card(&card.id, &done, 0, Some("done")).await?;

    service.fail_next(Operation::DeleteCard, 1);
    let victim = "card-login".to_string();
    if let Err(err) = engine.delete_card(&victim).await {
        log::info!("Delete rolled back as expected: {}", err);
    }

    let state = engine.snapshot();
    state.check_invariants()?;
    Ok(state)
}
