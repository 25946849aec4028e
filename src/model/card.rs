use crate::model::{generate_temp_id, CoverImage, Id, Label, Member, Relation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Id,
    pub list_id: Id,
    pub board_id: Id,
    pub title: String,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub assignees: Vec<Relation<Member>>,
    #[serde(default)]
    pub labels: Vec<Relation<Label>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<Relation<CoverImage>>,
    /// Free-form fields such as due dates and priority.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl Card {
    /// Build the placeholder shown while a create request is in flight.
    pub fn optimistic(list_id: &str, board_id: &str, title: &str, position: usize) -> Self {
        Self {
            id: generate_temp_id(),
            list_id: list_id.to_string(),
            board_id: board_id.to_string(),
            title: title.to_string(),
            position,
            status: None,
            assignees: Vec::new(),
            labels: Vec::new(),
            cover_image: None,
            metadata: Map::new(),
            pending: true,
        }
    }

    /// Apply a patch verbatim. Relation fields should already be reconciled.
    pub fn apply(&mut self, patch: &CardPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(status) = &patch.status {
            self.status = status.clone();
        }
        if let Some(assignees) = &patch.assignees {
            self.assignees = assignees.clone();
        }
        if let Some(labels) = &patch.labels {
            self.labels = labels.clone();
        }
        if let Some(cover_image) = &patch.cover_image {
            self.cover_image = cover_image.clone();
        }
        if let Some(metadata) = &patch.metadata {
            for (key, value) in metadata {
                if value.is_null() {
                    self.metadata.remove(key);
                } else {
                    self.metadata.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Partial update for a card.
///
/// Outer `None` leaves a field untouched. For optional fields `Some(None)`
/// clears the value. Metadata is merged key by key and a `null` value removes
/// the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<Relation<Member>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Relation<Label>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<Option<Relation<CoverImage>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl CardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(Some(status.into())),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.assignees.is_none()
            && self.labels.is_none()
            && self.cover_image.is_none()
            && self.metadata.is_none()
    }
}
