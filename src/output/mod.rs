// src/output/mod.rs
//! Row output, kept behind a small sink interface.
//!
//! The crawl engine only ever calls `write_header` once and `write_row` per
//! produced row; where rows end up (files, memory) is decided by the
//! `SinkFactory` handed to the crawler.

mod memory;
mod types;
mod writer;

use crate::error::AppError;
use crate::types::JobId;

/// Destination for the rows of one kind produced by one job.
pub trait RowSink: Send {
    fn write_header(&mut self, columns: &[&str]) -> Result<(), AppError>;

    fn write_row(&mut self, fields: &[String]) -> Result<(), AppError>;

    /// Called once when the job is retired.
    fn finish(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Opens one sink per (job, row kind).
pub trait SinkFactory: Send + Sync {
    fn open(&self, job_id: &JobId, kind: RowKind) -> Result<Box<dyn RowSink>, AppError>;
}

// Re-export the public interface
pub use memory::{MemorySinkFactory, MemoryTable};
pub use types::{CommentClass, Row, RowKind};
pub use writer::{JsonLinesSink, JsonLinesSinkFactory};
