use crate::model::Id;
use serde::{Deserialize, Serialize};

/// Anything that can sit on the populated side of a [`Relation`].
pub trait Identified {
    fn id(&self) -> &str;
}

/// A relation field (assignee, label, cover image) as the server sends it:
/// either a bare reference id or an object that already carries its display
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relation<T> {
    Populated(T),
    Reference(Id),
}

impl<T: Identified> Relation<T> {
    pub fn id(&self) -> &str {
        match self {
            Relation::Populated(value) => value.id(),
            Relation::Reference(id) => id,
        }
    }

    pub fn is_populated(&self) -> bool {
        matches!(self, Relation::Populated(_))
    }

    pub fn populated(&self) -> Option<&T> {
        match self {
            Relation::Populated(value) => Some(value),
            Relation::Reference(_) => None,
        }
    }
}

impl<T> From<T> for Relation<T>
where
    T: Identified,
{
    fn from(value: T) -> Self {
        Relation::Populated(value)
    }
}
