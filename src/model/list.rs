use crate::model::{generate_temp_id, Id};
use serde::{Deserialize, Serialize};

/// An ordered column within a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowList {
    pub id: Id,
    pub board_id: Id,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub position: usize,
    /// Set while the list exists only locally and the server has not
    /// acknowledged it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl WorkflowList {
    /// Build the placeholder shown while a create request is in flight.
    pub fn optimistic(board_id: &str, title: &str, position: usize) -> Self {
        Self {
            id: generate_temp_id(),
            board_id: board_id.to_string(),
            title: title.to_string(),
            color: None,
            position,
            pending: true,
        }
    }

    pub fn apply(&mut self, patch: &ListPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
    }
}

/// Partial update for a list. `None` leaves a field untouched; for `color`,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
}

impl ListPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.color.is_none()
    }
}
