// src/crawl/registry.rs
//! Owns the active jobs and their sinks.
//!
//! Only the consumer loop touches the registry, so jobs are mutated by a
//! single task and need no locking.

use super::job::{Job, JobKind, JobStats};
use crate::api::request::CrawlRequest;
use crate::api::responses::CrawlResponse;
use crate::error::{AppError, Result};
use crate::output::{RowKind, RowSink, SinkFactory};
use crate::types::{JobId, NodeId};
use indexmap::IndexMap;
use std::sync::Arc;

/// Final state of a job, reported when it leaves the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: JobId,
    pub kind: JobKind,
    pub root: NodeId,
    pub stats: JobStats,
    pub abrupt: bool,
}

impl JobSummary {
    fn of(job: &Job) -> Self {
        Self {
            id: job.id().clone(),
            kind: job.kind(),
            root: job.root().clone(),
            stats: job.stats().clone(),
            abrupt: job.is_abrupt(),
        }
    }
}

struct ActiveJob {
    job: Job,
    sinks: IndexMap<RowKind, Box<dyn RowSink>>,
}

impl ActiveJob {
    fn finish_sinks(&mut self) {
        for (kind, sink) in self.sinks.iter_mut() {
            if let Err(e) = sink.finish() {
                log::error!("Failed to close {} output of job {}: {}", kind, self.job.id(), e);
            }
        }
    }
}

/// The set of jobs a crawl is working on.
pub struct JobRegistry {
    jobs: IndexMap<JobId, ActiveJob>,
    sinks: Arc<dyn SinkFactory>,
}

impl JobRegistry {
    pub fn new(sinks: Arc<dyn SinkFactory>) -> Self {
        Self {
            jobs: IndexMap::new(),
            sinks,
        }
    }

    /// Registers a job, opens its sinks and returns its seed requests.
    pub fn add_job(&mut self, mut job: Job) -> Result<Vec<CrawlRequest>> {
        if self.jobs.contains_key(job.id()) {
            return Err(AppError::InternalError {
                message: format!("job {} is already registered", job.id()),
                source: None,
            });
        }

        let mut sinks = IndexMap::new();
        for kind in job.kind().row_kinds() {
            let mut sink = self.sinks.open(job.id(), *kind)?;
            sink.write_header(kind.columns())?;
            sinks.insert(*kind, sink);
        }

        let seeds = job.seed();
        log::info!(
            "Started job {} ({} on {}, {} seed request(s))",
            job.id(),
            job.kind(),
            job.root(),
            seeds.len()
        );
        self.jobs.insert(job.id().clone(), ActiveJob { job, sinks });
        Ok(seeds)
    }

    /// Hands a response to its job, writes the rows it produced and returns
    /// the requests it staged.
    ///
    /// Staged requests are always returned: the job already counts them as
    /// issued. A row that cannot be written is logged and dropped.
    pub fn route(&mut self, response: CrawlResponse) -> Result<Vec<CrawlRequest>> {
        let active = self
            .jobs
            .get_mut(response.job_id())
            .ok_or_else(|| AppError::UnknownJob(response.job_id().to_string()))?;

        let outcome = active.job.act(response);
        if active.job.take_progress() {
            log::info!("{}", active.job);
        }

        for row in &outcome.rows {
            let Some(sink) = active.sinks.get_mut(&row.kind) else {
                log::warn!("Job {} has no {} output, row dropped", active.job.id(), row.kind);
                continue;
            };
            if let Err(e) = sink.write_row(&row.fields) {
                log::error!(
                    "Failed to write {} row of job {}: {}",
                    row.kind,
                    active.job.id(),
                    e
                );
            }
        }
        Ok(outcome.requests)
    }

    /// Retires every finished job.
    pub fn sweep(&mut self) -> Vec<JobSummary> {
        let finished: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, active)| active.job.finished())
            .map(|(id, _)| id.clone())
            .collect();

        let mut retired = Vec::with_capacity(finished.len());
        for id in finished {
            if let Some(mut active) = self.jobs.shift_remove(&id) {
                active.finish_sinks();
                log::info!("Finished {}", active.job);
                retired.push(JobSummary::of(&active.job));
            }
        }
        retired
    }

    /// Closes the outputs of jobs that never finished and reports them.
    pub fn close(mut self) -> Vec<JobSummary> {
        self.jobs
            .drain(..)
            .map(|(_, mut active)| {
                active.finish_sinks();
                log::warn!("Stopped before finishing: {}", active.job);
                JobSummary::of(&active.job)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id).map(|active| &active.job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::responses::ResponseBody;
    use crate::crawl::job::JobSettings;
    use crate::output::MemorySinkFactory;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn job(kind: JobKind, root: &str) -> Job {
        let at = chrono::Utc.with_ymd_and_hms(2017, 6, 1, 0, 0, 0).unwrap();
        let root = NodeId::parse(root).unwrap();
        Job::with_id(
            JobId::new(at, kind.as_str(), &root),
            kind,
            root,
            JobSettings::default(),
        )
    }

    #[test]
    fn add_job_writes_headers_and_returns_seeds() {
        let memory = MemorySinkFactory::new();
        let mut registry = JobRegistry::new(Arc::new(memory.clone()));
        let job = job(JobKind::Discovery, "PAGE1");
        let id = job.id().clone();

        let seeds = registry.add_job(job).unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(registry.len(), 1);

        let header = memory.table(&id, RowKind::SharedPost).unwrap().header;
        assert_eq!(header.first().map(String::as_str), Some("to_id"));
        assert!(memory.table(&id, RowKind::Comment).is_none());
    }

    #[test]
    fn duplicate_jobs_are_refused() {
        let mut registry = JobRegistry::new(Arc::new(MemorySinkFactory::new()));
        registry.add_job(job(JobKind::PageFeed, "G1")).unwrap();
        assert!(registry.add_job(job(JobKind::PageFeed, "G1")).is_err());
    }

    #[test]
    fn route_writes_rows_and_sweep_retires_finished_jobs() {
        let memory = MemorySinkFactory::new();
        let mut registry = JobRegistry::new(Arc::new(memory.clone()));
        let seed = registry.add_job(job(JobKind::Post, "P1_1")).unwrap().remove(0);
        let id = seed.job_id.clone();

        assert!(registry.sweep().is_empty());
        let staged = registry
            .route(CrawlResponse::new(
                seed,
                ResponseBody::Payload(json!({
                    "id": "P1_1",
                    "attachments": {"data": [{"title": "A picture", "type": "photo"}]}
                })),
            ))
            .unwrap();
        assert!(staged.is_empty());

        let retired = registry.sweep();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].stats.get("attachments"), 1);
        assert!(registry.is_empty());

        let table = memory.table(&id, RowKind::Attachment).unwrap();
        assert!(table.finished);
        assert_eq!(table.rows[0][0], "P1_1");
        assert_eq!(table.rows[0][5], "A picture");
    }

    struct RejectingRows;

    impl RowSink for RejectingRows {
        fn write_header(&mut self, _columns: &[&str]) -> Result<()> {
            Ok(())
        }

        fn write_row(&mut self, _fields: &[String]) -> Result<()> {
            Err(AppError::Io(std::io::Error::other("disk full")))
        }
    }

    struct RejectingFactory;

    impl SinkFactory for RejectingFactory {
        fn open(&self, _job_id: &JobId, _kind: RowKind) -> Result<Box<dyn RowSink>> {
            Ok(Box::new(RejectingRows))
        }
    }

    #[test]
    fn failed_row_writes_keep_the_staged_requests() {
        let mut registry = JobRegistry::new(Arc::new(RejectingFactory));
        let seed = registry.add_job(job(JobKind::PageFeed, "G1")).unwrap().remove(0);
        let id = seed.job_id.clone();

        let staged = registry
            .route(CrawlResponse::new(
                seed,
                ResponseBody::Payload(json!({
                    "data": [{"id": "G1_1"}],
                    "paging": {"next": "https://graph.facebook.com/v2.9/G1/feed?limit=100&after=XYZ"}
                })),
            ))
            .unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].relative_path(), "G1/feed?limit=100&after=XYZ");

        let next = staged[0].clone();
        registry
            .route(CrawlResponse::new(next, ResponseBody::Payload(json!({"data": []}))))
            .unwrap();
        assert!(registry.job(&id).unwrap().finished());
        assert_eq!(registry.sweep().len(), 1);
    }

    #[test]
    fn responses_for_unknown_jobs_are_errors() {
        let mut registry = JobRegistry::new(Arc::new(MemorySinkFactory::new()));
        let stray = job(JobKind::Post, "P9_9").seed().remove(0);
        let result = registry.route(CrawlResponse::new(
            stray,
            ResponseBody::Payload(json!({"id": "P9_9"})),
        ));
        assert!(matches!(result, Err(AppError::UnknownJob(_))));
    }
}
