use crate::types::NodeId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author or target of a post, comment or share (`from` / `to` objects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Pagination block attached to any list payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

/// A list payload (`{"data": [...], "paging": {...}}`) whose items have not
/// been decoded yet.
///
/// Items stay as raw JSON until the owning job knows which entity they are,
/// so one malformed item can be skipped without losing the rest of the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Why one item of a list could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub index: usize,
    pub cause: String,
}

impl ItemList {
    /// Continuation link for the next page, if the API offered one.
    pub fn next_page(&self) -> Option<&str> {
        self.paging.as_ref().and_then(|p| p.next.as_deref())
    }

    /// Decodes every item as `T`, collecting the ones that fail instead of
    /// aborting on the first.
    pub fn decode<T: DeserializeOwned>(&self) -> (Vec<T>, Vec<SkippedItem>) {
        let mut items = Vec::with_capacity(self.data.len());
        let mut skipped = Vec::new();
        for (index, raw) in self.data.iter().enumerate() {
            match T::deserialize(raw) {
                Ok(item) => items.push(item),
                Err(e) => skipped.push(SkippedItem {
                    index,
                    cause: e.to_string(),
                }),
            }
        }
        (items, skipped)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
