// src/api/fields.rs
//! Declarative field specifications for Graph API requests.
//!
//! A request's `fields=` parameter is a small tree: plain attributes, and
//! edges that carry their own modifiers and sub-fields. The tree is built
//! once per job kind and rendered by a single recursive function.

use crate::constants::{COMMENT_LIMIT, REACTION_LIMIT};
use std::fmt;

const POST_ATTRIBUTES: &[&str] = &[
    "id",
    "created_time",
    "picture",
    "caption",
    "description",
    "from",
    "message",
    "message_tags",
    "name",
    "object_id",
    "parent_id",
    "shares",
    "source",
    "status_type",
    "story",
    "type",
    "updated_time",
    "with_tags",
];

const COMMENT_ATTRIBUTES: &[&str] = &[
    "id",
    "from",
    "message",
    "created_time",
    "like_count",
    "comment_count",
    "attachment",
];

const REACTION_ATTRIBUTES: &[&str] = &["id", "name", "type"];

const ATTACHMENT_ATTRIBUTES: &[&str] = &[
    "description",
    "description_tags",
    "media",
    "target",
    "title",
    "type",
    "url",
];

const SHARED_POST_ATTRIBUTES: &[&str] =
    &["id", "from", "to", "story", "created_time", "updated_time"];

const DISCOVERY_POST_ATTRIBUTES: &[&str] = &["id", "from", "parent_id", "created_time"];

/// One node of a field specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// A plain attribute such as `id` or `message`.
    Attribute(String),
    /// A nested edge with optional modifiers and its own sub-fields.
    Edge {
        name: String,
        summary: bool,
        limit: Option<u32>,
        fields: Vec<FieldSpec>,
    },
}

impl FieldSpec {
    pub fn attribute(name: impl Into<String>) -> Self {
        FieldSpec::Attribute(name.into())
    }

    /// Starts an edge with no modifiers and no sub-fields.
    pub fn edge(name: impl Into<String>) -> Self {
        FieldSpec::Edge {
            name: name.into(),
            summary: false,
            limit: None,
            fields: Vec::new(),
        }
    }

    /// Requests the edge's `summary(true)` block.
    pub fn with_summary(self) -> Self {
        match self {
            FieldSpec::Edge {
                name, limit, fields, ..
            } => FieldSpec::Edge {
                name,
                summary: true,
                limit,
                fields,
            },
            attribute => attribute,
        }
    }

    /// Caps the number of rows the edge returns per page.
    pub fn with_limit(self, limit: u32) -> Self {
        match self {
            FieldSpec::Edge {
                name,
                summary,
                fields,
                ..
            } => FieldSpec::Edge {
                name,
                summary,
                limit: Some(limit),
                fields,
            },
            attribute => attribute,
        }
    }

    /// Appends sub-fields to an edge.
    pub fn with_fields(self, extra: impl IntoIterator<Item = FieldSpec>) -> Self {
        match self {
            FieldSpec::Edge {
                name,
                summary,
                limit,
                mut fields,
            } => {
                fields.extend(extra);
                FieldSpec::Edge {
                    name,
                    summary,
                    limit,
                    fields,
                }
            }
            attribute => attribute,
        }
    }

    fn render_into(&self, out: &mut String) {
        match self {
            FieldSpec::Attribute(name) => out.push_str(name),
            FieldSpec::Edge {
                name,
                summary,
                limit,
                fields,
            } => {
                out.push_str(name);
                if *summary {
                    out.push_str(".summary(true)");
                }
                if let Some(limit) = limit {
                    out.push_str(&format!(".limit({})", limit));
                }
                if !fields.is_empty() {
                    out.push('{');
                    render_list(fields, out);
                    out.push('}');
                }
            }
        }
    }
}

fn render_list(fields: &[FieldSpec], out: &mut String) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        field.render_into(out);
    }
}

fn attributes<'a>(names: &'a [&'a str]) -> impl Iterator<Item = FieldSpec> + 'a {
    names.iter().map(|name| FieldSpec::attribute(*name))
}

/// The full `fields=` value of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<FieldSpec>,
}

impl FieldSet {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Renders the set to the wire format, e.g. `id,comments.limit(50){id}`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_list(&self.fields, &mut out);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Posts with every edge a feed crawl follows: comments (with their
    /// reactions and replies), reactions, attachments and shares.
    pub fn feed() -> Self {
        let mut fields: Vec<FieldSpec> = attributes(POST_ATTRIBUTES).collect();
        fields.extend([
            comments_edge(true),
            reactions_edge(),
            FieldSpec::edge("attachments").with_fields(attributes(ATTACHMENT_ATTRIBUTES)),
            shared_posts_edge(),
        ]);
        Self::new(fields)
    }

    /// Only what discovery needs: authorship, the parent reference and shares.
    pub fn discovery() -> Self {
        let mut fields: Vec<FieldSpec> = attributes(DISCOVERY_POST_ATTRIBUTES).collect();
        fields.push(shared_posts_edge());
        Self::new(fields)
    }
}

impl fmt::Display for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn reactions_edge() -> FieldSpec {
    FieldSpec::edge("reactions")
        .with_summary()
        .with_limit(REACTION_LIMIT)
        .with_fields(attributes(REACTION_ATTRIBUTES))
}

fn shared_posts_edge() -> FieldSpec {
    FieldSpec::edge("sharedposts").with_fields(attributes(SHARED_POST_ATTRIBUTES))
}

/// Comments edge; top-level comments also request one level of replies.
fn comments_edge(with_replies: bool) -> FieldSpec {
    let mut edge = FieldSpec::edge("comments")
        .with_summary()
        .with_limit(COMMENT_LIMIT)
        .with_fields(attributes(COMMENT_ATTRIBUTES))
        .with_fields([reactions_edge()]);
    if with_replies {
        edge = edge.with_fields([comments_edge(false)]);
    }
    edge
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_nested_edges_with_modifiers() {
        let set = FieldSet::new(vec![
            FieldSpec::attribute("id"),
            FieldSpec::edge("comments")
                .with_summary()
                .with_limit(50)
                .with_fields([
                    FieldSpec::attribute("id"),
                    FieldSpec::edge("reactions").with_limit(10).with_fields([
                        FieldSpec::attribute("id"),
                        FieldSpec::attribute("type"),
                    ]),
                ]),
            FieldSpec::edge("attachments").with_fields([FieldSpec::attribute("url")]),
        ]);

        assert_eq!(
            set.render(),
            "id,comments.summary(true).limit(50){id,reactions.limit(10){id,type}},attachments{url}"
        );
    }

    #[test]
    fn modifiers_on_attributes_are_ignored() {
        let spec = FieldSpec::attribute("id").with_limit(5).with_summary();
        assert_eq!(spec, FieldSpec::attribute("id"));
    }

    #[test]
    fn feed_preset_requests_replies_once() {
        let rendered = FieldSet::feed().render();
        assert!(rendered.starts_with("id,created_time,"));
        assert_eq!(rendered.matches("comments.summary(true).limit(50)").count(), 2);
        assert!(rendered.contains("sharedposts{id,from,to,story,created_time,updated_time}"));
        assert!(rendered.contains("attachments{description,"));
    }

    #[test]
    fn discovery_preset_is_minimal() {
        assert_eq!(
            FieldSet::discovery().render(),
            "id,from,parent_id,created_time,sharedposts{id,from,to,story,created_time,updated_time}"
        );
    }
}
