// src/api/mod.rs
//! Graph API interaction: describing queries, batching them, and sending
//! them over the wire.
//!
//! Requests and responses are plain values; the only I/O lives behind the
//! `GraphTransport` trait so the crawl engine can be driven without a
//! network.

pub mod batch;
pub mod client;
pub mod fields;
pub mod request;
pub mod responses;

use crate::error::AppError;
use batch::BatchEntry;
use responses::RawItem;

/// The ability to submit one batch of sub-requests to the Graph API.
///
/// Implementations return either a transport-level failure or the ordered
/// per-item results, one slot per submitted entry (`None` where the API
/// returned `null`).
#[async_trait::async_trait]
pub trait GraphTransport: Send + Sync {
    async fn execute_batch(&self, entries: &[BatchEntry]) -> Result<Vec<Option<RawItem>>, AppError>;
}

// Re-export the public interface
pub use batch::Batch;
pub use client::GraphHttpClient;
pub use fields::{FieldSet, FieldSpec};
pub use request::{CrawlRequest, Query, RequestKind};
pub use responses::{CrawlResponse, ResponseBody};
