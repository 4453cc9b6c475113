// src/output/memory.rs
//! In-memory sinks, for embedding the crawler and for tests.

use super::types::RowKind;
use super::{RowSink, SinkFactory};
use crate::error::AppError;
use crate::types::JobId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Header and rows collected for one (job, kind).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub finished: bool,
}

type Tables = Arc<Mutex<HashMap<(JobId, RowKind), MemoryTable>>>;

/// Collects every row in shared tables; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySinkFactory {
    tables: Tables,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one table, if the job opened it.
    pub fn table(&self, job_id: &JobId, kind: RowKind) -> Option<MemoryTable> {
        self.tables.lock().get(&(job_id.clone(), kind)).cloned()
    }

    /// Rows of `kind` across every job, in no particular job order.
    pub fn rows(&self, kind: RowKind) -> Vec<Vec<String>> {
        self.tables
            .lock()
            .iter()
            .filter(|((_, k), _)| *k == kind)
            .flat_map(|(_, table)| table.rows.clone())
            .collect()
    }

    /// Jobs that opened at least one table.
    pub fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .tables
            .lock()
            .keys()
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        ids
    }
}

impl SinkFactory for MemorySinkFactory {
    fn open(&self, job_id: &JobId, kind: RowKind) -> Result<Box<dyn RowSink>, AppError> {
        let key = (job_id.clone(), kind);
        self.tables.lock().insert(key.clone(), MemoryTable::default());
        Ok(Box::new(MemorySink {
            key,
            tables: Arc::clone(&self.tables),
        }))
    }
}

struct MemorySink {
    key: (JobId, RowKind),
    tables: Tables,
}

impl MemorySink {
    fn with_table(&self, f: impl FnOnce(&mut MemoryTable)) {
        let mut tables = self.tables.lock();
        f(tables.entry(self.key.clone()).or_default());
    }
}

impl RowSink for MemorySink {
    fn write_header(&mut self, columns: &[&str]) -> Result<(), AppError> {
        self.with_table(|table| table.header = columns.iter().map(|c| c.to_string()).collect());
        Ok(())
    }

    fn write_row(&mut self, fields: &[String]) -> Result<(), AppError> {
        self.with_table(|table| table.rows.push(fields.to_vec()));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AppError> {
        self.with_table(|table| table.finished = true);
        Ok(())
    }
}
