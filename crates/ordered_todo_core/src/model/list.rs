//! List domain model.
//!
//! # Responsibility
//! - Define the single record shape persisted by the list store.
//!
//! # Invariants
//! - `id` is `None` until the store assigns one, then stable forever.
//! - Values handed to callers are owned copies; mutating them never
//!   touches storage.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-assigned row identifier (`list_model.id`).
pub type ListId = i64;

/// One named to-do list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecord {
    /// `None` before insert.
    pub id: Option<ListId>,
    pub name: String,
    /// Whether items in this list carry dates. Schema default is `false`.
    #[serde(default)]
    pub is_dated: bool,
}

impl ListRecord {
    /// Creates an unsaved list.
    pub fn new(name: impl Into<String>, is_dated: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            is_dated,
        }
    }

    /// Creates an unsaved list using the schema default for `is_dated`.
    pub fn undated(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Returns a copy carrying the storage-assigned id.
    pub(crate) fn with_id(&self, id: ListId) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }
}

/// Row label shown by the list screen: `name (id)`.
impl Display for ListRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({id})", self.name),
            None => write!(f, "{} (unsaved)", self.name),
        }
    }
}
