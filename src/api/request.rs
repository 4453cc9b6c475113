// src/api/request.rs
//! Immutable descriptions of single Graph API queries.
//!
//! A `CrawlRequest` carries both what to ask the API and the routing
//! metadata needed to hand the answer back to the right job handler. Every
//! change (following a cursor, shrinking a limit) produces a new request.

use super::fields::FieldSet;
use crate::constants::{LIMIT_FLOOR, LIMIT_SHRINK_FACTOR};
use crate::types::{JobId, NodeId, TimeWindow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use url::Url;

static LIMIT_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?&]limit=)(\d+)").expect("limit pattern is valid"));

static API_VERSION_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v\d+(\.\d+)?$").expect("version pattern is valid"));

/// What a request fetches, and therefore which job handler reads its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    /// A page or group feed.
    RootFeed,
    /// A single post.
    Post,
    /// Comments on a post.
    Comments,
    /// Replies to a comment.
    SubComments,
    Reactions,
    Attachments,
    SharedPosts,
    /// A feed fetched while discovering connected pages.
    PageDiscovery,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::RootFeed => "root_feed",
            RequestKind::Post => "post",
            RequestKind::Comments => "comments",
            RequestKind::SubComments => "sub_comments",
            RequestKind::Reactions => "reactions",
            RequestKind::Attachments => "attachments",
            RequestKind::SharedPosts => "sharedposts",
            RequestKind::PageDiscovery => "page_discovery",
        }
    }

    /// Kinds whose pages produce new posts; their pagination stops once a
    /// job hits its post ceiling.
    pub fn is_root_level(&self) -> bool {
        matches!(self, RequestKind::RootFeed | RequestKind::PageDiscovery)
    }

    /// Name of the edge this kind reads, for kinds that are nested edges.
    pub fn edge_name(&self) -> Option<&'static str> {
        match self {
            RequestKind::Comments | RequestKind::SubComments => Some("comments"),
            RequestKind::Reactions => Some("reactions"),
            RequestKind::Attachments => Some("attachments"),
            RequestKind::SharedPosts => Some("sharedposts"),
            RequestKind::RootFeed | RequestKind::Post | RequestKind::PageDiscovery => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote query a request performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `<node>/feed?limit=..&since=..&until=..&fields=..`
    Feed {
        node: NodeId,
        fields: Arc<FieldSet>,
        window: TimeWindow,
    },
    /// `<node>?fields=..`
    Node { node: NodeId, fields: Arc<FieldSet> },
    /// `<owner>/<edge>`; usually resolved from the payload the edge was
    /// embedded in rather than dispatched.
    Edge { owner: NodeId, edge: &'static str },
    /// A literal relative path taken from a `paging.next` link.
    Continuation { path: String },
}

/// A single remote query plus the metadata that routes its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub kind: RequestKind,
    /// Node the query is about.
    pub target: NodeId,
    /// Node the response's rows attach to; `None` for root requests.
    pub owner: Option<NodeId>,
    pub job_id: JobId,
    /// Discovery level, 0 for the root.
    pub depth: u8,
    pub row_limit: Option<u32>,
    pub query: Query,
}

impl CrawlRequest {
    /// A feed request for `node` returning up to `limit` posts.
    pub fn feed(
        kind: RequestKind,
        job_id: JobId,
        node: NodeId,
        fields: Arc<FieldSet>,
        window: TimeWindow,
        limit: u32,
        depth: u8,
    ) -> Self {
        Self {
            kind,
            target: node.clone(),
            owner: None,
            job_id,
            depth,
            row_limit: Some(limit),
            query: Query::Feed {
                node,
                fields,
                window,
            },
        }
    }

    /// A request for a single node with the given fields.
    pub fn node(kind: RequestKind, job_id: JobId, node: NodeId, fields: Arc<FieldSet>) -> Self {
        Self {
            kind,
            target: node.clone(),
            owner: None,
            job_id,
            depth: 0,
            row_limit: None,
            query: Query::Node { node, fields },
        }
    }

    /// A nested edge of `owner`, inheriting job and depth from this request.
    pub fn child(&self, kind: RequestKind, owner: NodeId) -> Self {
        let edge = kind.edge_name().unwrap_or("feed");
        Self {
            kind,
            target: owner.clone(),
            owner: Some(owner.clone()),
            job_id: self.job_id.clone(),
            depth: self.depth,
            row_limit: None,
            query: Query::Edge { owner, edge },
        }
    }

    /// Follow-up request for the next page of this request's results.
    ///
    /// Keeps kind, owner, job and depth; the query becomes the cursor's
    /// relative path. Returns `None` when the cursor is not a usable link.
    pub fn build_continuation(&self, cursor: &str) -> Option<Self> {
        let path = relative_continuation(cursor)?;
        Some(Self {
            kind: self.kind,
            target: self.target.clone(),
            owner: self.owner.clone(),
            job_id: self.job_id.clone(),
            depth: self.depth,
            row_limit: limit_param(&path),
            query: Query::Continuation { path },
        })
    }

    /// Returns a copy asking for fewer rows:
    /// `max(floor, floor(limit * factor))`. Requests without a limit are
    /// returned unchanged.
    pub fn shrink_limit(&self, factor: f64, floor: u32) -> Self {
        let Some(limit) = self.row_limit else {
            return self.clone();
        };
        let shrunk = ((limit as f64 * factor).floor() as u32).max(floor);
        let query = match &self.query {
            Query::Continuation { path } => Query::Continuation {
                path: LIMIT_PARAM
                    .replace(path, |caps: &regex::Captures| format!("{}{}", &caps[1], shrunk))
                    .into_owned(),
            },
            other => other.clone(),
        };
        Self {
            row_limit: Some(shrunk),
            query,
            ..self.clone()
        }
    }

    /// `shrink_limit` with the crawler's standard factor and floor.
    pub fn halved(&self) -> Self {
        self.shrink_limit(LIMIT_SHRINK_FACTOR, LIMIT_FLOOR)
    }

    /// Whether shrinking would change the row limit.
    pub fn is_shrinkable(&self) -> bool {
        self.row_limit.is_some_and(|limit| limit > LIMIT_FLOOR)
    }

    /// The path sent to the batch endpoint, relative to the versioned API root.
    pub fn relative_path(&self) -> String {
        match &self.query {
            Query::Feed {
                node,
                fields,
                window,
            } => format!(
                "{}/feed?limit={}{}&fields={}",
                node,
                self.row_limit.unwrap_or(crate::constants::FEED_LIMIT),
                window.query_suffix(),
                fields.render()
            ),
            Query::Node { node, fields } => format!("{}?fields={}", node, fields.render()),
            Query::Edge { owner, edge } => format!("{}/{}", owner, edge),
            Query::Continuation { path } => path.clone(),
        }
    }
}

impl fmt::Display for CrawlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.kind, self.target)?;
        if let Some(limit) = self.row_limit {
            write!(f, " (limit {})", limit)?;
        }
        Ok(())
    }
}

/// Turns a `paging.next` link into a path relative to the versioned API root.
///
/// Absolute links lose their host and leading version segment; relative
/// links are used as they are.
pub fn relative_continuation(next: &str) -> Option<String> {
    let next = next.trim();
    if next.is_empty() {
        return None;
    }
    match Url::parse(next) {
        Ok(url) => {
            let path = url.path().trim_start_matches('/');
            let path = match path.split_once('/') {
                Some((first, rest)) if API_VERSION_SEGMENT.is_match(first) => rest,
                _ => path,
            };
            if path.is_empty() {
                return None;
            }
            Some(match url.query() {
                Some(query) => format!("{}?{}", path, query),
                None => path.to_string(),
            })
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Some(next.trim_start_matches('/').to_string())
        }
        Err(e) => {
            log::warn!("Ignoring unusable pagination link {}: {}", next, e);
            None
        }
    }
}

fn limit_param(path: &str) -> Option<u32> {
    LIMIT_PARAM
        .captures(path)
        .and_then(|caps| caps[2].parse().ok())
}
