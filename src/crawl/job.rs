// src/crawl/job.rs
//! The traversal state machine for one crawl root.
//!
//! A job never performs I/O. `act` takes one response and returns the rows
//! it produced plus the requests it wants sent; the consumer loop does the
//! rest. Edges that arrive embedded in a payload are resolved in the same
//! call through an explicit work list, so only pagination links, retries
//! and discovery hops ever leave the job.

use crate::api::fields::FieldSet;
use crate::api::request::{CrawlRequest, RequestKind};
use crate::api::responses::{CrawlResponse, ResponseBody};
use crate::constants::{DEFAULT_MAX_POSTS, FEED_LIMIT};
use crate::error::ItemFailure;
use crate::model::{Attachment, Comment, ItemList, Post, Reaction, SharedPost, SkippedItem};
use crate::output::{CommentClass, Row, RowKind};
use crate::types::{JobId, NodeId, TimeWindow};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// What a job crawls, starting from its root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    PageFeed,
    GroupFeed,
    Post,
    /// Follows shared posts and parent references from page to page.
    Discovery,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::PageFeed => "page_feed",
            JobKind::GroupFeed => "group_feed",
            JobKind::Post => "post",
            JobKind::Discovery => "graph_from_page",
        }
    }

    /// Row kinds this job writes; one sink is opened for each.
    pub fn row_kinds(&self) -> &'static [RowKind] {
        match self {
            JobKind::Discovery => &[RowKind::Post, RowKind::SharedPost],
            JobKind::PageFeed | JobKind::GroupFeed | JobKind::Post => &RowKind::ALL,
        }
    }

    /// Whether responses of `kind` belong to this job's traversal.
    pub fn handles(&self, kind: RequestKind) -> bool {
        match self {
            JobKind::PageFeed | JobKind::GroupFeed => {
                kind != RequestKind::Post && kind != RequestKind::PageDiscovery
            }
            JobKind::Post => kind != RequestKind::RootFeed && kind != RequestKind::PageDiscovery,
            JobKind::Discovery => {
                matches!(kind, RequestKind::PageDiscovery | RequestKind::SharedPosts)
            }
        }
    }

    fn field_set(&self) -> FieldSet {
        match self {
            JobKind::Discovery => FieldSet::discovery(),
            _ => FieldSet::feed(),
        }
    }

    /// Counter that the max-posts ceiling applies to.
    fn ceiling_tally(&self) -> &'static str {
        match self {
            JobKind::Discovery => "all_posts",
            _ => "posts",
        }
    }

    fn tallies(&self) -> &'static [&'static str] {
        match self {
            JobKind::Discovery => &[
                "all_posts",
                "relevant_posts",
                "parent_id",
                "sharedposts",
                "retries",
                "failures",
                "skipped",
            ],
            _ => &[
                "posts",
                "comments",
                "comm",
                "sub_comm",
                "reactions",
                "attachments",
                "sharedposts",
                "retries",
                "failures",
                "skipped",
            ],
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    /// Posts after which root-level pagination stops.
    pub max_posts: u64,
    /// Discovery levels to traverse away from the root.
    pub max_depth: u8,
    pub window: TimeWindow,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_posts: DEFAULT_MAX_POSTS,
            max_depth: 1,
            window: TimeWindow::default(),
        }
    }
}

/// Completion counters of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStats {
    pub requests: u64,
    pub responses: u64,
    tallies: IndexMap<&'static str, u64>,
    changed: bool,
}

impl JobStats {
    fn new(names: &[&'static str]) -> Self {
        Self {
            requests: 0,
            responses: 0,
            tallies: names.iter().map(|name| (*name, 0)).collect(),
            changed: false,
        }
    }

    fn add(&mut self, name: &'static str, n: u64) {
        *self.tallies.entry(name).or_insert(0) += n;
        self.changed = true;
    }

    fn bump(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    /// Value of a named tally; zero for tallies never touched.
    pub fn get(&self, name: &str) -> u64 {
        self.tallies.get(name).copied().unwrap_or(0)
    }

    pub fn tallies(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.tallies.iter().map(|(name, n)| (*name, *n))
    }

    /// Whether anything changed since the last call.
    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }
}

impl fmt::Display for JobStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requests, {} responses", self.requests, self.responses)?;
        for (name, n) in self.tallies().filter(|(_, n)| *n > 0) {
            write!(f, ", {} {}", n, name)?;
        }
        Ok(())
    }
}

/// What one call to `Job::act` produced.
#[derive(Debug, Default)]
pub struct JobOutcome {
    pub rows: Vec<Row>,
    pub requests: Vec<CrawlRequest>,
}

/// A page of items waiting to be processed within the current `act` call.
struct Frame {
    request: CrawlRequest,
    page: ItemList,
}

/// One crawl root and everything discovered from it.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    kind: JobKind,
    root: NodeId,
    settings: JobSettings,
    fields: Arc<FieldSet>,
    stats: JobStats,
    abrupt: bool,
    visited: HashSet<NodeId>,
}

impl Job {
    pub fn new(kind: JobKind, root: NodeId, settings: JobSettings) -> Self {
        let id = JobId::new(chrono::Utc::now(), kind.as_str(), &root);
        Self::with_id(id, kind, root, settings)
    }

    pub fn with_id(id: JobId, kind: JobKind, root: NodeId, settings: JobSettings) -> Self {
        Self {
            id,
            kind,
            root,
            settings,
            fields: Arc::new(kind.field_set()),
            stats: JobStats::new(kind.tallies()),
            abrupt: false,
            visited: HashSet::new(),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn stats(&self) -> &JobStats {
        &self.stats
    }

    /// Whether the counters moved since the last call.
    pub fn take_progress(&mut self) -> bool {
        self.stats.take_changed()
    }

    /// Whether the post ceiling was reached.
    pub fn is_abrupt(&self) -> bool {
        self.abrupt
    }

    /// Ceiling reached, outstanding responses still expected.
    pub fn is_draining(&self) -> bool {
        self.abrupt && !self.finished()
    }

    /// Every issued request has been answered.
    pub fn finished(&self) -> bool {
        self.stats.responses == self.stats.requests
    }

    /// The request(s) that start the job.
    pub fn seed(&mut self) -> Vec<CrawlRequest> {
        let request = match self.kind {
            JobKind::PageFeed | JobKind::GroupFeed => CrawlRequest::feed(
                RequestKind::RootFeed,
                self.id.clone(),
                self.root.clone(),
                Arc::clone(&self.fields),
                self.settings.window.clone(),
                FEED_LIMIT,
                0,
            ),
            JobKind::Post => CrawlRequest::node(
                RequestKind::Post,
                self.id.clone(),
                self.root.clone(),
                Arc::clone(&self.fields),
            ),
            JobKind::Discovery => {
                self.visited.insert(self.root.clone());
                self.discovery_request(self.root.clone(), 0)
            }
        };
        let mut outcome = JobOutcome::default();
        self.stage(request, &mut outcome);
        outcome.requests
    }

    /// Processes one response of this job.
    pub fn act(&mut self, response: CrawlResponse) -> JobOutcome {
        let mut outcome = JobOutcome::default();
        let CrawlResponse { request, body } = response;
        self.stats.responses += 1;
        self.stats.changed = true;

        if !self.kind.handles(request.kind) {
            log::error!(
                "Job {} received a response of unexpected type {} for {}",
                self.id,
                request.kind,
                request.target
            );
            return outcome;
        }

        match body {
            ResponseBody::Failed(failure) => self.on_failure(request, failure, &mut outcome),
            ResponseBody::Payload(payload) => self.on_payload(request, payload, &mut outcome),
        }
        outcome
    }

    fn stage(&mut self, request: CrawlRequest, outcome: &mut JobOutcome) {
        self.stats.requests += 1;
        self.stats.changed = true;
        outcome.requests.push(request);
    }

    fn discovery_request(&self, node: NodeId, depth: u8) -> CrawlRequest {
        CrawlRequest::feed(
            RequestKind::PageDiscovery,
            self.id.clone(),
            node,
            Arc::clone(&self.fields),
            self.settings.window.clone(),
            FEED_LIMIT,
            depth,
        )
    }

    fn on_failure(&mut self, request: CrawlRequest, failure: ItemFailure, outcome: &mut JobOutcome) {
        if failure.is_request_too_large() && request.kind.is_root_level() {
            if request.is_shrinkable() {
                let retry = request.halved();
                log::warn!(
                    "{} asked for too much data, retrying with limit {}",
                    request,
                    retry.row_limit.unwrap_or_default()
                );
                self.stats.bump("retries");
                self.stage(retry, outcome);
                return;
            }
            log::error!(
                "{} still too large at the smallest limit, giving up (job {})",
                request,
                self.id
            );
        } else {
            log::error!("{} failed (job {}): {}", request, self.id, failure);
        }
        self.stats.bump("failures");
    }

    fn on_payload(&mut self, request: CrawlRequest, payload: Value, outcome: &mut JobOutcome) {
        let mut work = VecDeque::new();

        if request.kind == RequestKind::Post {
            match serde_json::from_value::<Post>(payload) {
                Ok(post) => {
                    outcome.rows.push(Row::post(&post));
                    self.stats.bump("posts");
                    self.expand_post(&request, post, &mut work);
                }
                Err(e) => {
                    log::warn!("Skipping undecodable post {} (job {}): {}", request.target, self.id, e);
                    self.stats.bump("skipped");
                }
            }
        } else {
            if payload.get("data").is_none() {
                log::warn!("Response to {} has no data list (job {})", request, self.id);
                self.stats.bump("skipped");
                return;
            }
            match serde_json::from_value::<ItemList>(payload) {
                Ok(page) => work.push_back(Frame { request, page }),
                Err(e) => {
                    log::warn!("Skipping unreadable list for {} (job {}): {}", request, self.id, e);
                    self.stats.bump("skipped");
                }
            }
        }

        while let Some(frame) = work.pop_front() {
            self.process_frame(frame, &mut work, outcome);
        }
    }

    fn process_frame(&mut self, frame: Frame, work: &mut VecDeque<Frame>, outcome: &mut JobOutcome) {
        let Frame { request, page } = frame;
        match request.kind {
            RequestKind::RootFeed | RequestKind::PageDiscovery => {
                self.on_feed_page(&request, &page, work, outcome)
            }
            RequestKind::Comments | RequestKind::SubComments => {
                self.on_comments(&request, &page, work, outcome)
            }
            RequestKind::Reactions => {
                let owner = owner_of(&request);
                let reactions: Vec<Reaction> = self.decode(&request, &page);
                for reaction in &reactions {
                    outcome.rows.push(Row::reaction(reaction, &owner));
                }
                self.stats.add("reactions", reactions.len() as u64);
            }
            RequestKind::Attachments => {
                let owner = owner_of(&request);
                let attachments: Vec<Attachment> = self.decode(&request, &page);
                for attachment in &attachments {
                    outcome.rows.push(Row::attachment(attachment, &owner));
                }
                self.stats.add("attachments", attachments.len() as u64);
            }
            RequestKind::SharedPosts => self.on_shared_posts(&request, &page, outcome),
            RequestKind::Post => {
                log::error!("Job {} got a list where a single post was expected", self.id);
                return;
            }
        }
        self.follow_next_page(&request, &page, outcome);
    }

    fn decode<T: serde::de::DeserializeOwned>(&mut self, request: &CrawlRequest, page: &ItemList) -> Vec<T> {
        let (items, skipped) = page.decode::<T>();
        self.note_skipped(request, &skipped);
        items
    }

    fn note_skipped(&mut self, request: &CrawlRequest, skipped: &[SkippedItem]) {
        for item in skipped {
            log::warn!(
                "Skipping item {} of {} (job {}): {}",
                item.index,
                request,
                self.id,
                item.cause
            );
        }
        if !skipped.is_empty() {
            self.stats.add("skipped", skipped.len() as u64);
        }
    }

    fn follow_next_page(&mut self, request: &CrawlRequest, page: &ItemList, outcome: &mut JobOutcome) {
        let Some(next) = page.next_page() else {
            return;
        };
        if self.abrupt && request.kind.is_root_level() {
            log::debug!("Job {} not following {} past its post ceiling", self.id, request);
            return;
        }
        match request.build_continuation(next) {
            Some(continuation) => self.stage(continuation, outcome),
            None => log::warn!("Unusable next page link for {}: {}", request, next),
        }
    }

    fn on_feed_page(
        &mut self,
        request: &CrawlRequest,
        page: &ItemList,
        work: &mut VecDeque<Frame>,
        outcome: &mut JobOutcome,
    ) {
        if self.abrupt {
            log::debug!(
                "Job {} ignoring {} posts of {} past its post ceiling",
                self.id,
                page.len(),
                request
            );
            return;
        }
        let posts: Vec<Post> = self.decode(request, page);
        let ceiling = self.kind.ceiling_tally();
        for post in posts {
            if self.kind == JobKind::Discovery {
                self.discover_from_post(request, post, work, outcome);
            } else {
                outcome.rows.push(Row::post(&post));
                self.expand_post(request, post, work);
            }
            self.stats.bump(ceiling);
            if self.stats.get(ceiling) >= self.settings.max_posts {
                log::info!(
                    "Job {} reached {} {}, stopping its feed",
                    self.id,
                    self.settings.max_posts,
                    ceiling
                );
                self.abrupt = true;
                break;
            }
        }
    }

    /// Queues the edges embedded in a post.
    fn expand_post(&mut self, request: &CrawlRequest, post: Post, work: &mut VecDeque<Frame>) {
        let Post {
            id,
            comments,
            reactions,
            attachments,
            sharedposts,
            ..
        } = post;
        let edges = [
            (RequestKind::Comments, comments),
            (RequestKind::Reactions, reactions),
            (RequestKind::Attachments, attachments),
            (RequestKind::SharedPosts, sharedposts),
        ];
        for (kind, edge) in edges {
            if let Some(page) = edge {
                work.push_back(Frame {
                    request: request.child(kind, id.clone()),
                    page,
                });
            }
        }
    }

    fn on_comments(
        &mut self,
        request: &CrawlRequest,
        page: &ItemList,
        work: &mut VecDeque<Frame>,
        outcome: &mut JobOutcome,
    ) {
        let owner = owner_of(request);
        let class = CommentClass::of(owner.as_str());
        let comments: Vec<Comment> = self.decode(request, page);
        for comment in comments {
            outcome.rows.push(Row::comment(&comment, &owner, class));
            self.stats.bump("comments");
            self.stats.bump(class.as_str());

            let Comment {
                id,
                comments,
                reactions,
                ..
            } = comment;
            if let Some(replies) = comments {
                work.push_back(Frame {
                    request: request.child(RequestKind::SubComments, id.clone()),
                    page: replies,
                });
            }
            if let Some(reactions) = reactions {
                work.push_back(Frame {
                    request: request.child(RequestKind::Reactions, id),
                    page: reactions,
                });
            }
        }
    }

    fn on_shared_posts(&mut self, request: &CrawlRequest, page: &ItemList, outcome: &mut JobOutcome) {
        let owner = owner_of(request);
        let shares: Vec<SharedPost> = self.decode(request, page);
        for share in shares {
            outcome.rows.push(Row::shared_post(&share, &owner));
            self.stats.bump("sharedposts");
            if self.kind == JobKind::Discovery {
                if let Some(next) = self.visit(request, share.from.id.clone()) {
                    log::info!(
                        "sharedposts: {} from post {} in job {} (level {})",
                        next.target,
                        owner,
                        self.id,
                        next.depth
                    );
                    self.stage(next, outcome);
                }
            }
        }
    }

    /// Discovery keeps only posts that point elsewhere: shares and parents.
    fn discover_from_post(
        &mut self,
        request: &CrawlRequest,
        post: Post,
        work: &mut VecDeque<Frame>,
        outcome: &mut JobOutcome,
    ) {
        if post.sharedposts.is_none() && post.parent_id.is_none() {
            return;
        }
        outcome.rows.push(Row::post(&post));
        self.stats.bump("relevant_posts");

        if let Some(parent) = &post.parent_id {
            if let Some(next) = self.visit(request, parent.page_component()) {
                self.stats.bump("parent_id");
                log::info!(
                    "found parent: {} from post {} in job {} (level {})",
                    next.target,
                    post.id,
                    self.id,
                    next.depth
                );
                self.stage(next, outcome);
            }
        }
        if let Some(page) = post.sharedposts {
            work.push_back(Frame {
                request: request.child(RequestKind::SharedPosts, post.id),
                page,
            });
        }
    }

    /// Discovery request one level below `request` for an unvisited node.
    fn visit(&mut self, request: &CrawlRequest, node: NodeId) -> Option<CrawlRequest> {
        if request.depth >= self.settings.max_depth {
            return None;
        }
        if !self.visited.insert(node.clone()) {
            return None;
        }
        Some(self.discovery_request(node, request.depth + 1))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job {}_{}, total: {}", self.kind, self.root, self.stats)
    }
}

fn owner_of(request: &CrawlRequest) -> NodeId {
    request.owner.clone().unwrap_or_else(|| request.target.clone())
}
