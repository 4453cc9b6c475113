// src/output/types.rs
//! Type definitions for output rows.
//!
//! Each row kind has a fixed column set; rows are produced as ordered
//! string fields so sinks stay agnostic of the entities behind them.

use crate::constants::NOT_AVAILABLE;
use crate::model::{Attachment, Comment, Post, Reaction, SharedPost};
use crate::types::{NodeId, NODE_SEPARATOR};
use serde_json::Value;
use std::fmt;

const POST_COLUMNS: &[&str] = &[
    "id",
    "story",
    "created_time",
    "message",
    "picture",
    "caption",
    "description",
    "from_id",
    "from_name",
    "name",
    "object_id",
    "parent_id",
    "source",
    "status_type",
    "type",
    "updated_time",
    "share_count",
];

const COMMENT_COLUMNS: &[&str] = &[
    "to_id",
    "message",
    "comment_id",
    "user_id",
    "user_name",
    "created_time",
    "like_count",
    "comment_count",
    "comm_type",
];

const REACTION_COLUMNS: &[&str] = &["to_id", "reaction_type", "user_id", "user_name"];

const ATTACHMENT_COLUMNS: &[&str] = &[
    "to_id",
    "description",
    "description_tags",
    "media",
    "target",
    "title",
    "type",
    "url",
];

const SHARED_POST_COLUMNS: &[&str] = &[
    "to_id",
    "id",
    "story",
    "from_id",
    "from_name",
    "share_to_id",
    "share_to_name",
    "created_time",
    "updated_time",
];

/// The kinds of rows a crawl produces, one output stream each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKind {
    Post,
    Comment,
    Reaction,
    Attachment,
    SharedPost,
}

impl RowKind {
    pub const ALL: [RowKind; 5] = [
        RowKind::Post,
        RowKind::Comment,
        RowKind::Reaction,
        RowKind::Attachment,
        RowKind::SharedPost,
    ];

    /// Column names, in row order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            RowKind::Post => POST_COLUMNS,
            RowKind::Comment => COMMENT_COLUMNS,
            RowKind::Reaction => REACTION_COLUMNS,
            RowKind::Attachment => ATTACHMENT_COLUMNS,
            RowKind::SharedPost => SHARED_POST_COLUMNS,
        }
    }

    /// Plural name used for counters and file names.
    pub fn plural(&self) -> &'static str {
        match self {
            RowKind::Post => "posts",
            RowKind::Comment => "comments",
            RowKind::Reaction => "reactions",
            RowKind::Attachment => "attachments",
            RowKind::SharedPost => "sharedposts",
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Whether a comment sits directly on a post or replies to another comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentClass {
    TopLevel,
    Reply,
}

impl CommentClass {
    /// Post ids are compound (`<page>_<post>`), comment ids are not, so the
    /// shape of the id a comment is attached to tells the two apart.
    pub fn of(attached_to: &str) -> Self {
        if attached_to.contains(NODE_SEPARATOR) {
            CommentClass::TopLevel
        } else {
            CommentClass::Reply
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentClass::TopLevel => "comm",
            CommentClass::Reply => "sub_comm",
        }
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub kind: RowKind,
    pub fields: Vec<String>,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn json(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |n| n.to_string())
}

impl Row {
    pub fn post(post: &Post) -> Self {
        let (from_id, from_name) = match &post.from {
            Some(actor) => (actor.id.to_string(), text(&actor.name)),
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };
        Self {
            kind: RowKind::Post,
            fields: vec![
                post.id.to_string(),
                text(&post.story),
                text(&post.created_time),
                text(&post.message),
                text(&post.picture),
                text(&post.caption),
                text(&post.description),
                from_id,
                from_name,
                text(&post.name),
                text(&post.object_id),
                post.parent_id
                    .as_ref()
                    .map_or_else(|| NOT_AVAILABLE.to_string(), NodeId::to_string),
                text(&post.source),
                text(&post.status_type),
                text(&post.post_type),
                text(&post.updated_time),
                post.shares.map_or(0, |s| s.count).to_string(),
            ],
        }
    }

    pub fn comment(comment: &Comment, owner: &NodeId, class: CommentClass) -> Self {
        let (user_id, user_name) = match &comment.from {
            Some(actor) => (actor.id.to_string(), text(&actor.name)),
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };
        Self {
            kind: RowKind::Comment,
            fields: vec![
                owner.to_string(),
                text(&comment.message),
                comment.id.to_string(),
                user_id,
                user_name,
                text(&comment.created_time),
                count(comment.like_count),
                count(comment.comment_count),
                class.as_str().to_string(),
            ],
        }
    }

    pub fn reaction(reaction: &Reaction, owner: &NodeId) -> Self {
        Self {
            kind: RowKind::Reaction,
            fields: vec![
                owner.to_string(),
                reaction.reaction_type.clone(),
                reaction.id.to_string(),
                text(&reaction.name),
            ],
        }
    }

    pub fn attachment(attachment: &Attachment, owner: &NodeId) -> Self {
        Self {
            kind: RowKind::Attachment,
            fields: vec![
                owner.to_string(),
                text(&attachment.description),
                json(&attachment.description_tags),
                json(&attachment.media),
                json(&attachment.target),
                text(&attachment.title),
                text(&attachment.attachment_type),
                text(&attachment.url),
            ],
        }
    }

    pub fn shared_post(share: &SharedPost, owner: &NodeId) -> Self {
        let (to_id, to_name) = match share.first_recipient() {
            Some(actor) => (actor.id.to_string(), text(&actor.name)),
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };
        Self {
            kind: RowKind::SharedPost,
            fields: vec![
                owner.to_string(),
                share.id.to_string(),
                text(&share.story),
                share.from.id.to_string(),
                text(&share.from.name),
                to_id,
                to_name,
                text(&share.created_time),
                text(&share.updated_time),
            ],
        }
    }

    /// Value of the named column, if the column exists for this kind.
    pub fn field(&self, column: &str) -> Option<&str> {
        self.kind
            .columns()
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classification_depends_only_on_separator() {
        assert_eq!(CommentClass::of("1234_5678"), CommentClass::TopLevel);
        assert_eq!(CommentClass::of("998877"), CommentClass::Reply);
        assert_eq!(CommentClass::of("_"), CommentClass::TopLevel);
        assert_eq!(CommentClass::of(""), CommentClass::Reply);
        assert_eq!(CommentClass::of("abc_"), CommentClass::TopLevel);
    }

    #[test]
    fn every_row_matches_its_column_count() {
        let post: Post = serde_json::from_value(json!({"id": "P1_1"})).unwrap();
        let comment: Comment = serde_json::from_value(json!({"id": "C1"})).unwrap();
        let reaction: Reaction =
            serde_json::from_value(json!({"id": "U1", "type": "LIKE"})).unwrap();
        let share: SharedPost =
            serde_json::from_value(json!({"id": "S1", "from": {"id": "X"}})).unwrap();
        let owner = NodeId::parse("P1_1").unwrap();

        let rows = [
            Row::post(&post),
            Row::comment(&comment, &owner, CommentClass::TopLevel),
            Row::reaction(&reaction, &owner),
            Row::attachment(&Attachment::default(), &owner),
            Row::shared_post(&share, &owner),
        ];
        for row in rows {
            assert_eq!(row.fields.len(), row.kind.columns().len(), "{}", row.kind);
        }
    }

    #[test]
    fn missing_values_render_as_not_available() {
        let post: Post = serde_json::from_value(json!({"id": "P1_1"})).unwrap();
        let row = Row::post(&post);
        assert_eq!(row.field("message"), Some("n/a"));
        assert_eq!(row.field("share_count"), Some("0"));
        assert_eq!(row.field("nonexistent"), None);
    }
}
