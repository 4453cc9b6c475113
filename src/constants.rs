// src/constants.rs
//! Domain constants that define the operational boundaries of the crawler.
//!
//! Each constant is named for the domain concept it constrains. Reading
//! them tells the story of how a crawl runs: how many sub-requests travel
//! in one call, how many rows each edge asks for, how much work may queue
//! up before producers have to wait.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Graph API boundaries
// ---------------------------------------------------------------------------

/// Host every relative request path is resolved against.
pub const GRAPH_API_HOST: &str = "https://graph.facebook.com";

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "v2.9";

/// Maximum number of sub-requests the batch endpoint accepts in one call.
pub const BATCH_LIMIT: usize = 50;

/// Posts requested per feed page before any shrinking.
pub const FEED_LIMIT: u32 = 100;

/// Comments requested per nested comments edge.
pub const COMMENT_LIMIT: u32 = 50;

/// Reactions requested per nested reactions edge.
pub const REACTION_LIMIT: u32 = 50;

/// Smallest row limit a shrunk request may carry.
pub const LIMIT_FLOOR: u32 = 1;

/// Factor applied to a row limit each time the API rejects it as too large.
pub const LIMIT_SHRINK_FACTOR: f64 = 0.5;

// ---------------------------------------------------------------------------
// Crawl boundaries
// ---------------------------------------------------------------------------

/// Capacity of the pending-request and response queues.
pub const QUEUE_CAPACITY: usize = 5000;

/// Ceiling on posts per job when none is configured.
pub const DEFAULT_MAX_POSTS: u64 = 100_000_000;

/// Deepest discovery level accepted from configuration.
pub const MAX_DISCOVERY_DEPTH: u8 = 10;

/// Upper bound on concurrent dispatch workers.
pub const MAX_DISPATCH_WORKERS: usize = 16;

/// How long an idle worker sleeps before polling its queue again.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(25);

/// Timeout for a single batch call.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Placeholder written for optional fields the API did not return.
pub const NOT_AVAILABLE: &str = "n/a";
