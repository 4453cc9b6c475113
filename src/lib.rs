// src/lib.rs
//! graphcrawl library: crawls a batched, paginated social graph API into
//! flat rows.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling**: `AppError`, `ItemFailure`, `ValidationError`
//! - **Configuration**: `CommandLineInput`, `CrawlConfig`
//! - **Domain types**: `NodeId`, `JobId`, `AccessToken`, `TimeWindow`
//! - **API**: `CrawlRequest`, `Batch`, `GraphTransport`, `GraphHttpClient`
//! - **Crawl engine**: `Crawler`, `Job`, `JobRegistry`, `CrawlReport`
//! - **Output**: `RowSink`, `SinkFactory`, JSON-lines and in-memory sinks

pub mod api;
pub mod config;
pub mod constants;
pub mod crawl;
pub mod error;
pub mod model;
pub mod output;
pub mod types;

// --- Error Handling ---
pub use crate::error::{AppError, ItemFailure, Result};
pub use crate::types::ValidationError;

// --- Configuration ---
pub use crate::config::{CommandLineInput, CrawlConfig, TargetKind};

// --- Domain Types ---
pub use crate::types::{AccessToken, JobId, NodeId, TimeWindow};

// --- Domain Model ---
pub use crate::model::{
    Actor, Attachment, Comment, ItemList, Paging, Post, Reaction, SharedPost,
};

// --- API ---
pub use crate::api::{
    batch::BatchEntry, responses::RawItem, Batch, CrawlRequest, CrawlResponse, FieldSet,
    FieldSpec, GraphHttpClient, GraphTransport, Query, RequestKind, ResponseBody,
};

// --- Crawl Engine ---
pub use crate::crawl::{
    job::{Job, JobKind, JobOutcome, JobSettings, JobStats},
    registry::{JobRegistry, JobSummary},
    CrawlReport, CrawlSettings, Crawler,
};

// --- Output ---
pub use crate::output::{
    CommentClass, JsonLinesSinkFactory, MemorySinkFactory, MemoryTable, Row, RowKind, RowSink,
    SinkFactory,
};
