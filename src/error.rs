use crate::model::Id;
use std::fmt;

/// Remote operations issued by the engine. Used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchSnapshot,
    CreateList,
    UpdateList,
    DeleteList,
    MoveList,
    CreateCard,
    UpdateCard,
    DeleteCard,
    MoveCard,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchSnapshot => "fetch workflow snapshot",
            Operation::CreateList => "create list",
            Operation::UpdateList => "update list",
            Operation::DeleteList => "delete list",
            Operation::MoveList => "move list",
            Operation::CreateCard => "create card",
            Operation::UpdateCard => "update card",
            Operation::DeleteCard => "delete card",
            Operation::MoveCard => "move card",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to load workflow {board_id}: {source}")]
    Load {
        board_id: Id,
        #[source]
        source: anyhow::Error,
    },

    /// The optimistic change has already been rolled back when this is
    /// returned.
    #[error("Failed to {operation}: {source}")]
    Mutation {
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },

    #[error("Card not found: {0}")]
    CardNotFound(Id),

    #[error("List not found: {0}")]
    ListNotFound(Id),

    #[error("No workflow is loaded")]
    NoActiveBoard,
}

impl SyncError {
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, SyncError::Mutation { .. })
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
