//! Remote graph entities, decoded once at the API boundary.
//!
//! Every field the API may omit is an `Option`; fields a row cannot exist
//! without (ids, reaction types, share authors) are required, so a payload
//! item missing them fails to decode and is skipped by the job.

pub mod common;

pub use common::*;

use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Share counter attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shares {
    #[serde(default)]
    pub count: u64,
}

/// A post from a feed, or a single post fetched directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: NodeId,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub updated_time: Option<String>,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub from: Option<Actor>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
    /// Post this one was shared from (`<page>_<post>`).
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status_type: Option<String>,
    #[serde(default, rename = "type")]
    pub post_type: Option<String>,
    #[serde(default)]
    pub shares: Option<Shares>,
    #[serde(default)]
    pub comments: Option<ItemList>,
    #[serde(default)]
    pub reactions: Option<ItemList>,
    #[serde(default)]
    pub attachments: Option<ItemList>,
    #[serde(default)]
    pub sharedposts: Option<ItemList>,
}

/// A comment on a post, or a reply to another comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: NodeId,
    #[serde(default)]
    pub from: Option<Actor>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
    #[serde(default)]
    pub attachment: Option<Value>,
    #[serde(default)]
    pub comments: Option<ItemList>,
    #[serde(default)]
    pub reactions: Option<ItemList>,
}

/// A reaction (like, love, ...) left by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Id of the reacting user.
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub reaction_type: String,
}

/// Media or link attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_tags: Option<Value>,
    #[serde(default)]
    pub media: Option<Value>,
    #[serde(default)]
    pub target: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub attachment_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Recipient list of a share (`{"data": [{"id", "name"}]}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    #[serde(default)]
    pub data: Vec<Actor>,
}

/// A re-share of a post into another node's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPost {
    pub id: NodeId,
    /// Node that re-shared the post; discovery follows it.
    pub from: Actor,
    #[serde(default)]
    pub to: Option<Recipients>,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub updated_time: Option<String>,
}

impl SharedPost {
    /// First recipient of the share, which is the only one the API has been
    /// seen to return.
    pub fn first_recipient(&self) -> Option<&Actor> {
        self.to.as_ref().and_then(|to| to.data.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_decodes_nested_edges_as_raw_lists() {
        let post: Post = serde_json::from_value(json!({
            "id": "P1_1",
            "from": {"id": "U1", "name": "Someone"},
            "type": "status",
            "shares": {"count": 3},
            "comments": {"data": [{"id": "C1"}]}
        }))
        .unwrap();

        assert_eq!(post.post_type.as_deref(), Some("status"));
        assert_eq!(post.shares.map(|s| s.count), Some(3));
        assert_eq!(post.comments.map(|c| c.len()), Some(1));
        assert!(post.reactions.is_none());
    }

    #[test]
    fn reaction_requires_type() {
        assert!(serde_json::from_value::<Reaction>(json!({"id": "U1"})).is_err());
        let reaction: Reaction =
            serde_json::from_value(json!({"id": "U1", "type": "LIKE"})).unwrap();
        assert_eq!(reaction.reaction_type, "LIKE");
    }

    #[test]
    fn shared_post_exposes_first_recipient() {
        let share: SharedPost = serde_json::from_value(json!({
            "id": "S1",
            "from": {"id": "PAGE2", "name": "Other page"},
            "to": {"data": [{"id": "PAGE3", "name": "Target"}]}
        }))
        .unwrap();
        assert_eq!(share.first_recipient().map(|a| a.id.as_str()), Some("PAGE3"));
    }
}
